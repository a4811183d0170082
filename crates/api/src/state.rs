use std::sync::Arc;

use reconcile_core::jobs::ImportTracker;
use reconcile_core::registry::MappingRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs uploads through the import pipeline and records their progress.
    pub tracker: ImportTracker,
    /// Mapping templates offered to uploads.
    pub registry: Arc<dyn MappingRegistry>,
    /// Database connection pool, present when jobs are stored in Postgres.
    pub pool: Option<reconcile_db::DbPool>,
}
