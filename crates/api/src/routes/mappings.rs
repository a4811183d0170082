//! Route definitions for the mapping catalogue.

use axum::routing::get;
use axum::Router;

use crate::handlers::mappings;
use crate::state::AppState;

/// ```text
/// GET    /mappings                -> list_mappings
/// GET    /mappings/{mapping_id}   -> get_mapping
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mappings", get(mappings::list_mappings))
        .route("/mappings/{mapping_id}", get(mappings::get_mapping))
}
