//! Route definitions for program imports.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::imports;
use crate::state::AppState;

/// Routes scoped to a breeding program.
///
/// ```text
/// POST   /programs/{program_id}/imports                -> upload_import (multipart)
/// GET    /programs/{program_id}/imports/{import_id}    -> get_import
/// PUT    /programs/{program_id}/imports/{import_id}    -> process_import
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/programs/{program_id}/imports",
            post(imports::upload_import),
        )
        .route(
            "/programs/{program_id}/imports/{import_id}",
            get(imports::get_import).put(imports::process_import),
        )
}
