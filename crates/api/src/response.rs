//! Shared response envelope types for API handlers.
//!
//! Catalogue endpoints use a `{ "data": ... }` envelope. Import endpoints
//! answer with the bare polling shapes (`{importId}`, `{progress, preview}`)
//! that upload clients expect.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
