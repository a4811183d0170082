/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier handed back to the caller on upload and used for polling.
pub type ImportId = uuid::Uuid;

/// Breeding programs are identified by UUID.
pub type ProgramId = uuid::Uuid;
