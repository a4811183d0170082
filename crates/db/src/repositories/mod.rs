pub mod import_job_repo;

pub use import_job_repo::{CreateImportJob, ImportJobRepo};
