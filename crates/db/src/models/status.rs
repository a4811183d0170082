//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use reconcile_core::jobs::JobStatus;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Import job lifecycle status (`import_job_statuses`).
    ImportJobStatus {
        Queued = 1,
        Processing = 2,
        Succeeded = 3,
        Failed = 4,
    }
}

impl From<JobStatus> for ImportJobStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => Self::Queued,
            JobStatus::Processing => Self::Processing,
            JobStatus::Succeeded => Self::Succeeded,
            JobStatus::Failed => Self::Failed,
        }
    }
}

impl From<ImportJobStatus> for JobStatus {
    fn from(status: ImportJobStatus) -> Self {
        match status {
            ImportJobStatus::Queued => Self::Queued,
            ImportJobStatus::Processing => Self::Processing,
            ImportJobStatus::Succeeded => Self::Succeeded,
            ImportJobStatus::Failed => Self::Failed,
        }
    }
}

/// Terminal statuses: succeeded, failed.
pub const TERMINAL_STATUSES: [StatusId; 2] = [
    ImportJobStatus::Succeeded as StatusId,
    ImportJobStatus::Failed as StatusId,
];
