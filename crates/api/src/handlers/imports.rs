//! Handlers for program imports: upload, status polling and processing.
//!
//! An upload is parsed inline and queued for a preview run; the caller then
//! polls until the job reaches a terminal status. A terminal job can be
//! re-processed as another preview or as a commit.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use reconcile_core::error::ImportError;
use reconcile_core::jobs::{ImportJob, ImportProgress, JobStatus, NewImportJob, ProcessOptions};
use reconcile_core::parser::{parse_format, FileFormat, ParsedTable};
use reconcile_core::preview::ImportPreview;
use reconcile_core::types::{ImportId, ProgramId};
use reconcile_core::workflow::WorkflowKind;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart part carrying the spreadsheet.
pub const FILE_FIELD: &str = "file";

/// Multipart part naming the uploading user. Every other text part is kept
/// as a user field (list name, submission name, ...).
pub const CREATED_BY_FIELD: &str = "createdBy";

/// Parse an optional `?workflow=` value.
pub fn parse_workflow(value: Option<&str>) -> AppResult<Option<WorkflowKind>> {
    value
        .map(|w| {
            WorkflowKind::from_str(w)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown workflow '{w}'")))
        })
        .transpose()
}

// ── Upload ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub mapping: String,
    pub workflow: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub import_id: ImportId,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

/// POST /api/v1/programs/{program_id}/imports?mapping={id}
///
/// Accept a multipart upload and queue a preview run. A file that cannot be
/// read still gets an import id; its job is failed immediately and the
/// reason is reported when polled.
pub async fn upload_import(
    State(state): State<AppState>,
    Path(program_id): Path<ProgramId>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResult>)> {
    let workflow = parse_workflow(params.workflow.as_deref())?;
    let definition = state.registry.get_mapping(&params.mapping, workflow)?;

    let mut upload: Option<UploadedFile> = None;
    let mut user_fields = BTreeMap::new();
    let mut created_by = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            upload = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else if name == CREATED_BY_FIELD {
            created_by = Some(field.text().await?).filter(|v| !v.trim().is_empty());
        } else if !name.is_empty() {
            let value = field.text().await?;
            user_fields.insert(name, value);
        }
    }

    let Some(upload) = upload else {
        return Err(AppError::BadRequest(format!(
            "No '{FILE_FIELD}' part received in multipart upload"
        )));
    };
    let file_name = upload.file_name.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_upload(upload))
        .await
        .map_err(|e| AppError::InternalError(format!("Upload parser task failed: {e}")))?;

    let mut input = NewImportJob {
        program_id,
        mapping_id: definition.id,
        workflow: definition.workflow,
        file_name,
        user_fields,
        created_by,
        table: ParsedTable::default(),
    };
    let job = match parsed {
        Ok(table) => {
            input.table = table;
            state.tracker.submit(input).await?
        }
        Err(e) => state.tracker.reject(input, &e).await?,
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResult { import_id: job.id }),
    ))
}

fn parse_upload(upload: UploadedFile) -> Result<ParsedTable, ImportError> {
    let format = FileFormat::detect(upload.content_type.as_deref(), upload.file_name.as_deref())?;
    parse_format(&upload.bytes, format)
}

// ── Status ───────────────────────────────────────────────────────────

/// Polling body: the job's progress and, once available, its preview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatusResponse {
    pub import_id: ImportId,
    pub status: JobStatus,
    pub progress: ImportProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImportPreview>,
}

impl ImportStatusResponse {
    fn from_job(job: ImportJob) -> (StatusCode, Json<Self>) {
        let code = if job.status.is_terminal() {
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        };
        let total = job.total_rows();
        let progress = job
            .progress
            .unwrap_or_else(|| ImportProgress::running(job.phase, 0, total));
        (
            code,
            Json(Self {
                import_id: job.id,
                status: job.status,
                progress,
                preview: job.preview,
            }),
        )
    }
}

/// GET /api/v1/programs/{program_id}/imports/{import_id}
///
/// `202` while the job is queued or processing, `200` once it has finished.
pub async fn get_import(
    State(state): State<AppState>,
    Path((program_id, import_id)): Path<(ProgramId, ImportId)>,
) -> AppResult<(StatusCode, Json<ImportStatusResponse>)> {
    let job = state.tracker.find(program_id, import_id).await?;
    Ok(ImportStatusResponse::from_job(job))
}

// ── Process ──────────────────────────────────────────────────────────

/// PUT /api/v1/programs/{program_id}/imports/{import_id}
///
/// Re-run a finished job as a preview (`commit: false`) or a commit.
/// Returns `202` with the queued job.
pub async fn process_import(
    State(state): State<AppState>,
    Path((program_id, import_id)): Path<(ProgramId, ImportId)>,
    Json(options): Json<ProcessOptions>,
) -> AppResult<(StatusCode, Json<ImportStatusResponse>)> {
    let job = state
        .tracker
        .process(program_id, import_id, options)
        .await?;
    Ok(ImportStatusResponse::from_job(job))
}
