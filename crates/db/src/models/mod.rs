pub mod import_job;
pub mod status;
