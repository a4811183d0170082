//! Workflow orchestrator: drives one job through
//! `Received → Validating → Resolving → (Writing) → Done`, or `Failed`.
//!
//! Every run starts from the stored upload and the store's current state, so
//! a commit never trusts an earlier preview. Preview and commit share the
//! whole pipeline up to the write step and return the same preview shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::brapi::BrapiStore;
use crate::error::ImportError;
use crate::jobs::ImportJob;
use crate::mapping::map_table;
use crate::preview::ImportPreview;
use crate::registry::MappingRegistry;
use crate::resolver::{self, ResolveContext};
use crate::validation::evaluator::validate_rows;
use crate::validation::rules::RowErrors;
use crate::writer::write_plan;

/// Orchestrator state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportPhase {
    Received,
    Validating,
    Resolving,
    Writing,
    Done,
    Failed,
}

impl ImportPhase {
    pub const ALL: &'static [ImportPhase] = &[
        ImportPhase::Received,
        ImportPhase::Validating,
        ImportPhase::Resolving,
        ImportPhase::Writing,
        ImportPhase::Done,
        ImportPhase::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|phase| phase.as_str() == s)
    }
}

/// Receives phase transitions while a job runs.
#[async_trait]
pub trait PhaseSink: Send + Sync {
    async fn enter(&self, phase: ImportPhase, finished: usize, total: usize);
}

/// Sink that drops every transition.
pub struct NoopSink;

#[async_trait]
impl PhaseSink for NoopSink {
    async fn enter(&self, _phase: ImportPhase, _finished: usize, _total: usize) {}
}

/// Result of a run that got past every file-level check.
#[derive(Debug)]
pub struct ImportOutcome {
    pub preview: ImportPreview,
    /// Blocking row errors. When non-empty nothing was written.
    pub row_errors: Vec<RowErrors>,
    pub committed: bool,
}

pub struct ImportOrchestrator {
    store: Arc<dyn BrapiStore>,
    registry: Arc<dyn MappingRegistry>,
    reference_source: String,
}

impl ImportOrchestrator {
    pub fn new(
        store: Arc<dyn BrapiStore>,
        registry: Arc<dyn MappingRegistry>,
        reference_source: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            reference_source: reference_source.into(),
        }
    }

    pub fn registry(&self) -> &dyn MappingRegistry {
        self.registry.as_ref()
    }

    /// Run a job in the mode recorded in its options.
    pub async fn run(
        &self,
        job: &ImportJob,
        sink: &dyn PhaseSink,
    ) -> Result<ImportOutcome, ImportError> {
        let total = job.total_rows();

        // ---- Validating ----
        sink.enter(ImportPhase::Validating, 0, total).await;
        let definition = self
            .registry
            .get_mapping(&job.mapping_id, Some(job.workflow))
            .map_err(|e| ImportError::validation(e.to_string()))?;
        let table = map_table(&definition, &job.table)?;
        let mut errors = validate_rows(&definition, &table)?;
        tracing::debug!(
            import_id = %job.id,
            workflow = job.workflow.as_str(),
            rows = table.rows.len(),
            invalid_rows = errors.row_count(),
            "Rows validated"
        );

        // ---- Resolving ----
        sink.enter(ImportPhase::Resolving, 0, total).await;
        let ctx = ResolveContext {
            store: self.store.as_ref(),
            program_id: job.program_id,
            import_id: job.id,
            reference_source: &self.reference_source,
            overwrite: job.options.overwrite,
            overwrite_reason: job.options.overwrite_reason.as_deref(),
            user_fields: &job.user_fields,
            created_by: job.created_by.as_deref(),
            file_name: job.file_name.as_deref(),
        };
        let resolver::Resolution { mut plan, mut preview } =
            resolver::resolve(&ctx, &definition, &table, &mut errors).await?;
        if job.workflow.is_experiment() {
            preview.dynamic_columns = table.extra_columns.clone();
        }
        preview.attach_errors(&errors);

        if !errors.is_empty() {
            return Ok(ImportOutcome {
                preview,
                row_errors: errors.into_rows(),
                committed: false,
            });
        }

        if !job.options.commit {
            sink.enter(ImportPhase::Done, total, total).await;
            return Ok(ImportOutcome {
                preview,
                row_errors: Vec::new(),
                committed: false,
            });
        }

        // ---- Writing ----
        sink.enter(ImportPhase::Writing, 0, total).await;
        let summary = write_plan(self.store.as_ref(), &mut plan).await?;
        tracing::info!(
            import_id = %job.id,
            workflow = job.workflow.as_str(),
            created = summary.created,
            updated = summary.updated,
            "Import committed"
        );
        sink.enter(ImportPhase::Done, total, total).await;

        Ok(ImportOutcome {
            preview,
            row_errors: Vec::new(),
            committed: true,
        })
    }
}
