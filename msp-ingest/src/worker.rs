//! Single-request ingest worker
//!
//! `Idle → TagEmbedding → ConflictResolution → StagedWrite → Visible →
//! LocalCleanup → Done`, any fatal error ending in `Failed`.
//!
//! Steps run strictly in order and the job makes exactly one attempt.
//! Tag embedding never fails the job. The staging file is removed only on
//! the success path; a failed job leaves it where it was so the scheduler can
//! retry.

use crate::context::LogContext;
use crate::error::{IngestError, IngestResult};
use crate::index::{ContentIndex, EntryHandle};
use crate::models::{IngestRequest, JobInput};
use crate::services::{
    ConflictEraser, EmbedOutcome, EvictionOutcome, IdentityResolver, StagedWriter, TagEmbedder,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Job state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    TagEmbedding,
    ConflictResolution,
    /// Entry exists but is still pending
    StagedWrite,
    Visible,
    LocalCleanup,
    Done,
    Failed,
}

/// The only thing the scheduler sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
}

/// What one run did, for diagnostics and tests
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    /// States in the order they were entered, starting at `Idle`
    pub transitions: Vec<JobState>,
    pub tag_embedding: Option<EmbedOutcome>,
    pub eviction: Option<EvictionOutcome>,
    pub entry: Option<EntryHandle>,
    pub error: Option<String>,
}

impl JobReport {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Failure,
            transitions: vec![JobState::Idle],
            tag_embedding: None,
            eviction: None,
            entry: None,
            error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.transitions.last().copied().unwrap_or(JobState::Idle)
    }

    fn enter(&mut self, state: JobState, ctx: &LogContext) {
        debug!(parent: ctx.span(), from = ?self.state(), to = ?state, "Job state transition");
        self.transitions.push(state);
    }
}

/// Runs ingest jobs against one content index
pub struct IngestWorker {
    embedder: TagEmbedder,
    resolver: IdentityResolver,
    eraser: ConflictEraser,
    writer: StagedWriter,
}

impl IngestWorker {
    pub fn new(index: Arc<dyn ContentIndex>) -> Self {
        Self {
            embedder: TagEmbedder::new(),
            resolver: IdentityResolver::new(index.clone()),
            eraser: ConflictEraser::new(index.clone()),
            writer: StagedWriter::new(index),
        }
    }

    /// Run one job; every error becomes `Failure`
    pub async fn run(&self, input: JobInput, cancel_token: &CancellationToken) -> JobOutcome {
        self.run_with_report(input, cancel_token).await.outcome
    }

    pub async fn run_with_report(
        &self,
        input: JobInput,
        cancel_token: &CancellationToken,
    ) -> JobReport {
        let ctx = LogContext::for_new_job();
        let mut report = JobReport::new(ctx.job_id());

        let result = self
            .execute(input, cancel_token, &ctx, &mut report)
            .instrument(ctx.span().clone())
            .await;

        match result {
            Ok(()) => {
                report.outcome = JobOutcome::Success;
                info!(parent: ctx.span(), "File processed");
            }
            Err(e) => {
                error!(
                    parent: ctx.span(),
                    state = ?report.state(),
                    error = %e,
                    "Error processing file"
                );
                report.enter(JobState::Failed, &ctx);
                report.error = Some(e.to_string());
                report.outcome = JobOutcome::Failure;
            }
        }

        report
    }

    async fn execute(
        &self,
        input: JobInput,
        cancel_token: &CancellationToken,
        ctx: &LogContext,
        report: &mut JobReport,
    ) -> IngestResult<()> {
        // Validation precedes every side effect
        let request = IngestRequest::try_from(input)?;
        ctx.record_name(&request.display_name);
        info!(parent: ctx.span(), path = %request.staging_path.display(), "Processing file");

        check_cancelled(cancel_token, "tag embedding")?;
        report.enter(JobState::TagEmbedding, ctx);
        let embedded = self
            .embedder
            .embed(&request.staging_path, request.tags.as_ref(), ctx)
            .await;
        report.tag_embedding = Some(embedded);

        check_cancelled(cancel_token, "conflict resolution")?;
        report.enter(JobState::ConflictResolution, ctx);
        let identity = self.resolver.resolve(&request, ctx);
        let eviction = self.eraser.erase(&self.resolver, &identity, ctx).await?;
        report.eviction = Some(eviction);

        check_cancelled(cancel_token, "staged write")?;
        report.enter(JobState::StagedWrite, ctx);
        let handle = self
            .writer
            .commit(&identity, &request.staging_path, ctx, cancel_token)
            .await?;
        report.enter(JobState::Visible, ctx);
        report.entry = Some(handle);

        report.enter(JobState::LocalCleanup, ctx);
        remove_staging_file(&request.staging_path, ctx).await;
        report.enter(JobState::Done, ctx);

        Ok(())
    }
}

fn check_cancelled(cancel_token: &CancellationToken, step: &'static str) -> IngestResult<()> {
    if cancel_token.is_cancelled() {
        return Err(IngestError::Cancelled(step));
    }
    Ok(())
}

/// Best-effort; a failure here does not demote a committed job
async fn remove_staging_file(path: &Path, ctx: &LogContext) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(parent: ctx.span(), path = %path.display(), "Removed staging file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            parent: ctx.span(),
            path = %path.display(),
            error = %e,
            "Failed to remove staging file"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DirectFsIndex;
    use serde_json::json;
    use tempfile::TempDir;

    fn worker(dir: &TempDir) -> IngestWorker {
        IngestWorker::new(Arc::new(DirectFsIndex::new(
            dir.path().join("store"),
            vec!["external_primary".to_string()],
        )))
    }

    fn input(path: &Path) -> JobInput {
        serde_json::from_value(json!({
            "path": path.to_string_lossy(),
            "name": "a.bin",
            "appFolder": "",
            "dirType": 3,
            "dirName": "Download",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_walks_every_state() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("a.bin");
        std::fs::write(&staging, b"data").unwrap();

        let report = worker(&dir)
            .run_with_report(input(&staging), &CancellationToken::new())
            .await;

        assert_eq!(report.outcome, JobOutcome::Success);
        assert_eq!(
            report.transitions,
            vec![
                JobState::Idle,
                JobState::TagEmbedding,
                JobState::ConflictResolution,
                JobState::StagedWrite,
                JobState::Visible,
                JobState::LocalCleanup,
                JobState::Done,
            ]
        );
        assert_eq!(report.tag_embedding, Some(EmbedOutcome::Skipped));
        assert_eq!(report.eviction, Some(EvictionOutcome::NothingRemoved));
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn test_missing_input_fails_from_idle() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("a.bin");
        std::fs::write(&staging, b"data").unwrap();

        let mut job = input(&staging);
        job.dir_name = None;
        let report = worker(&dir).run_with_report(job, &CancellationToken::new()).await;

        assert_eq!(report.outcome, JobOutcome::Failure);
        assert_eq!(report.transitions, vec![JobState::Idle, JobState::Failed]);
        assert!(staging.exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("a.bin");
        std::fs::write(&staging, b"data").unwrap();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let report = worker(&dir).run_with_report(input(&staging), &cancel_token).await;

        assert_eq!(report.outcome, JobOutcome::Failure);
        assert_eq!(report.state(), JobState::Failed);
        assert!(report.entry.is_none());
        assert!(staging.exists());
    }

    // procfs entries are readable but can never be unlinked
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cleanup_failure_does_not_fail_the_job() {
        let dir = TempDir::new().unwrap();
        let staging = Path::new("/proc/self/status");

        let report = worker(&dir)
            .run_with_report(input(staging), &CancellationToken::new())
            .await;

        assert_eq!(report.outcome, JobOutcome::Success);
        assert_eq!(report.state(), JobState::Done);
        assert!(report.transitions.contains(&JobState::LocalCleanup));
        assert!(report.error.is_none());
        assert!(staging.exists());
    }

    #[tokio::test]
    async fn test_missing_staging_file_fails_without_cleanup() {
        let dir = TempDir::new().unwrap();
        let report = worker(&dir)
            .run_with_report(input(&dir.path().join("absent.bin")), &CancellationToken::new())
            .await;

        assert_eq!(report.outcome, JobOutcome::Failure);
        assert!(report.transitions.contains(&JobState::StagedWrite));
        assert!(!report.transitions.contains(&JobState::LocalCleanup));
    }
}
