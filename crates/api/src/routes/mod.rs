pub mod health;
pub mod imports;
pub mod mappings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /mappings                                        list templates
/// /mappings/{mapping_id}                           one template
///
/// /programs/{program_id}/imports                   upload (POST, multipart)
/// /programs/{program_id}/imports/{import_id}       poll (GET), process (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(mappings::router())
        .merge(imports::router())
}
