//! Handlers for the mapping catalogue.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use reconcile_core::mapping::MappingDefinition;
use reconcile_core::registry::MappingSummary;

use crate::error::AppResult;
use crate::handlers::imports::parse_workflow;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MappingParams {
    pub workflow: Option<String>,
}

/// GET /api/v1/mappings
pub async fn list_mappings(State(state): State<AppState>) -> Json<DataResponse<Vec<MappingSummary>>> {
    Json(DataResponse {
        data: state.registry.list(),
    })
}

/// GET /api/v1/mappings/{mapping_id}
///
/// Column layout of one template. `?workflow=` selects between workflows
/// sharing a template.
pub async fn get_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<String>,
    Query(params): Query<MappingParams>,
) -> AppResult<Json<DataResponse<MappingDefinition>>> {
    let workflow = parse_workflow(params.workflow.as_deref())?;
    let definition = state.registry.get_mapping(&mapping_id, workflow)?;
    Ok(Json(DataResponse { data: definition }))
}
