//! Periodic cleanup of finished import jobs.
//!
//! Deletes succeeded and failed jobs whose last update is older than the
//! configured TTL. Queued and processing jobs are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reconcile_core::jobs::{ImportJobStore, JobStoreError};
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(900); // 15 minutes

/// Delete every terminal job older than `ttl`. Returns the number deleted.
pub async fn sweep(jobs: &dyn ImportJobStore, ttl: Duration) -> Result<u64, JobStoreError> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(ttl)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    jobs.delete_older_than(cutoff).await
}

/// Run the job retention loop until `cancel` is triggered.
pub async fn run(jobs: Arc<dyn ImportJobStore>, ttl: Duration, cancel: CancellationToken) {
    tracing::info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep(jobs.as_ref(), ttl).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Job retention: purged finished imports");
                        } else {
                            tracing::debug!("Job retention: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Job retention: cleanup failed");
                    }
                }
            }
        }
    }
}
