//! Client-side controller for the spreadsheet split/package pipeline.
//!
//! [`SplitClient`] sequences upload -> transform -> package -> download
//! against the remote split service, publishes progress and error state on a
//! broadcast channel, and enforces the two ordering invariants: processing
//! requires a completed upload, downloading requires a packaged archive.

use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use shared::{
    domain::{ProcessTarget, SessionPhase},
    protocol::{ProcessRequest, UploadResponse},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod progress;
pub mod service;
pub mod validate;

pub use progress::{ErrorReporter, ProgressReporter, ProgressState};
pub use service::{HttpSplitService, ProcessOutcome, ServiceError, SplitService};

pub const UPLOAD_LABEL: &str = "Uploading file...";
pub const PROCESS_START_LABEL: &str = "Processing file... This may take a moment...";
pub const STAGING_LABEL: &str = "Creating Excel files...";
pub const PACKAGING_LABEL: &str = "Creating ZIP archive...";
pub const COMPLETE_LABEL: &str = "Processing complete!";
pub const MISSING_UPLOAD_MESSAGE: &str = "Please upload a file first.";
pub const MISSING_ARCHIVE_MESSAGE: &str = "No file available for download.";

/// Pacing for the staged result reveal. The stage delays are cosmetic: the
/// remote call has already completed when they run.
#[derive(Debug, Clone, Copy)]
pub struct StagePacing {
    pub stage_delay: Duration,
    pub hide_delay: Duration,
}

impl Default for StagePacing {
    fn default() -> Self {
        Self {
            stage_delay: Duration::from_millis(1000),
            hide_delay: Duration::from_millis(1000),
        }
    }
}

impl StagePacing {
    /// No waits at all; tests run the full pipeline without a clock.
    pub fn immediate() -> Self {
        Self {
            stage_delay: Duration::ZERO,
            hide_delay: Duration::ZERO,
        }
    }
}

/// Controller identity for the single-flight guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Process,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::Process => "process",
            Operation::Download => "download",
        };
        f.write_str(name)
    }
}

/// Everything that can stop the session from advancing. All variants render
/// to the same error surface; the variant itself is the telemetry tag.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Transport(String),
    #[error("a {0} request is already in progress")]
    InFlight(Operation),
}

impl PipelineError {
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Precondition(_) => "precondition",
            PipelineError::Service(_) => "service",
            PipelineError::Transport(_) => "transport",
            PipelineError::InFlight(_) => "in_flight",
        }
    }
}

impl From<ServiceError> for PipelineError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(message) => PipelineError::Service(message),
            ServiceError::Unreachable(message) => PipelineError::Transport(message),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PhaseChanged(SessionPhase),
    Progress(ProgressState),
    ErrorShown(String),
    ErrorCleared,
    UploadCompleted {
        file_name: String,
        rows: u64,
        columns: Vec<String>,
    },
    ProcessCompleted {
        zip_filename: String,
        files_created: u32,
    },
    SheetsUpdated {
        rows_updated: u64,
    },
    /// Retrieval has begun; renderers use this for the transient
    /// acknowledgment (the pulse is presentation, not state).
    DownloadStarted {
        zip_filename: String,
    },
}

/// Read-only view of the single live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub uploaded_file_name: Option<String>,
    pub archive_ref: Option<String>,
}

struct SessionInner {
    phase: SessionPhase,
    uploaded_file_name: Option<String>,
    archive_ref: Option<String>,
    cleanup_sent: bool,
}

pub struct SplitClient {
    service: Arc<dyn SplitService>,
    inner: Mutex<SessionInner>,
    inflight: Mutex<HashSet<Operation>>,
    pacing: StagePacing,
    progress: ProgressReporter,
    errors: ErrorReporter,
    events: broadcast::Sender<PipelineEvent>,
}

impl SplitClient {
    pub fn new(service: Arc<dyn SplitService>) -> Arc<Self> {
        Self::with_pacing(service, StagePacing::default())
    }

    pub fn with_pacing(service: Arc<dyn SplitService>, pacing: StagePacing) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            service,
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Idle,
                uploaded_file_name: None,
                archive_ref: None,
                cleanup_sent: false,
            }),
            inflight: Mutex::new(HashSet::new()),
            pacing,
            progress: ProgressReporter::new(events.clone(), pacing.hide_delay),
            errors: ErrorReporter::new(events.clone()),
            events,
        })
    }

    /// Production wiring: HTTP transport against the given base URL.
    pub fn over_http(base_url: impl AsRef<str>) -> anyhow::Result<Arc<Self>> {
        Ok(Self::new(Arc::new(HttpSplitService::new(base_url)?)))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn errors(&self) -> &ErrorReporter {
        &self.errors
    }

    pub async fn session(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            phase: inner.phase,
            uploaded_file_name: inner.uploaded_file_name.clone(),
            archive_ref: inner.archive_ref.clone(),
        }
    }

    /// Guard predicate for the process affordance; the UI renders it, the
    /// controller re-checks it on every invocation.
    pub async fn can_process(&self) -> bool {
        self.inner.lock().await.uploaded_file_name.is_some()
    }

    /// Guard predicate for the download affordance.
    pub async fn can_download(&self) -> bool {
        self.inner.lock().await.archive_ref.is_some()
    }

    /// Submits a validated file to the split service. Exactly one network
    /// submission; on failure the session is left untouched so the user can
    /// retry with the same or another file.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, PipelineError> {
        if let Err(reason) = validate::validate_file_name(file_name) {
            let err = PipelineError::Validation(reason);
            self.errors.show(err.to_string()).await;
            return Err(err);
        }

        self.begin(Operation::Upload).await?;
        let result = self.upload_inner(file_name, bytes).await;
        self.finish(Operation::Upload).await;
        result
    }

    async fn upload_inner(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, PipelineError> {
        let prior_phase = {
            let mut inner = self.inner.lock().await;
            let prior = inner.phase;
            inner.phase = SessionPhase::Uploading;
            prior
        };
        self.emit_phase(SessionPhase::Uploading);
        // Indeterminate: no percentage is meaningful before the reply.
        self.progress.start(UPLOAD_LABEL, 0).await;

        match self.service.upload(file_name, bytes).await {
            Ok(response) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.uploaded_file_name = Some(response.file_name.clone());
                    // A new upload supersedes any archive from a prior run.
                    inner.archive_ref = None;
                    inner.phase = SessionPhase::Uploaded;
                }
                self.emit_phase(SessionPhase::Uploaded);
                self.progress.hide().await;
                info!(
                    file_name = %response.file_name,
                    rows = response.rows,
                    columns = response.columns.len(),
                    "upload accepted"
                );
                let _ = self.events.send(PipelineEvent::UploadCompleted {
                    file_name: response.file_name.clone(),
                    rows: response.rows,
                    columns: response.columns.clone(),
                });
                Ok(response)
            }
            Err(err) => {
                let err = PipelineError::from(err);
                {
                    self.inner.lock().await.phase = prior_phase;
                }
                self.emit_phase(prior_phase);
                self.progress.hide().await;
                self.errors.show(err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Asks the service to transform the uploaded file. Progress is revealed
    /// in fixed stages; the service returns a single terminal result, so the
    /// later stages are pacing, not measurement.
    pub async fn process(&self, target: ProcessTarget) -> Result<ProcessOutcome, PipelineError> {
        let file_name = { self.inner.lock().await.uploaded_file_name.clone() };
        let Some(file_name) = file_name else {
            let err = PipelineError::Precondition(MISSING_UPLOAD_MESSAGE.to_string());
            self.errors.show(err.to_string()).await;
            return Err(err);
        };

        self.begin(Operation::Process).await?;
        let result = self.process_inner(&file_name, target).await;
        self.finish(Operation::Process).await;
        result
    }

    async fn process_inner(
        &self,
        file_name: &str,
        target: ProcessTarget,
    ) -> Result<ProcessOutcome, PipelineError> {
        self.set_phase(SessionPhase::Processing).await;
        self.progress.start(PROCESS_START_LABEL, 10).await;

        let request = ProcessRequest {
            file_name: file_name.to_string(),
            option: target,
        };
        let outcome = match self.service.process(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = PipelineError::from(err);
                self.set_phase(SessionPhase::Uploaded).await;
                self.progress.hide().await;
                self.errors.show(err.to_string()).await;
                return Err(err);
            }
        };

        match &outcome {
            ProcessOutcome::Archive(response) => {
                self.progress.update(50, Some(STAGING_LABEL)).await;
                self.set_phase(SessionPhase::StagingFiles).await;
                tokio::time::sleep(self.pacing.stage_delay).await;

                self.progress.update(80, Some(PACKAGING_LABEL)).await;
                self.set_phase(SessionPhase::Packaging).await;
                tokio::time::sleep(self.pacing.stage_delay).await;

                self.progress.update(100, Some(COMPLETE_LABEL)).await;
                {
                    let mut inner = self.inner.lock().await;
                    inner.archive_ref = Some(response.zip_filename.clone());
                    inner.phase = SessionPhase::Ready;
                }
                self.emit_phase(SessionPhase::Ready);
                info!(
                    zip = %response.zip_filename,
                    files_created = response.files_created,
                    total_records = response.total_records,
                    "processing complete"
                );
                let _ = self.events.send(PipelineEvent::ProcessCompleted {
                    zip_filename: response.zip_filename.clone(),
                    files_created: response.files_created,
                });
                self.progress.hide().await;
            }
            ProcessOutcome::Sheets(response) => {
                // No archive is produced on this path, so there is nothing
                // to stage or package: straight to done.
                self.progress.update(100, Some(COMPLETE_LABEL)).await;
                self.set_phase(SessionPhase::Uploaded).await;
                info!(rows_updated = response.rows_updated, "sheets update complete");
                let _ = self.events.send(PipelineEvent::SheetsUpdated {
                    rows_updated: response.rows_updated,
                });
                self.progress.hide().await;
            }
        }

        Ok(outcome)
    }

    /// Retrieves the packaged archive. The caller decides where the bytes
    /// land; this controller only resolves the reference.
    pub async fn download(&self) -> Result<Vec<u8>, PipelineError> {
        let archive_ref = { self.inner.lock().await.archive_ref.clone() };
        let Some(archive_ref) = archive_ref else {
            let err = PipelineError::Precondition(MISSING_ARCHIVE_MESSAGE.to_string());
            self.errors.show(err.to_string()).await;
            return Err(err);
        };

        self.begin(Operation::Download).await?;
        let result = self.download_inner(&archive_ref).await;
        self.finish(Operation::Download).await;
        result
    }

    async fn download_inner(&self, archive_ref: &str) -> Result<Vec<u8>, PipelineError> {
        self.set_phase(SessionPhase::Downloading).await;
        let _ = self.events.send(PipelineEvent::DownloadStarted {
            zip_filename: archive_ref.to_string(),
        });

        match self.service.download(archive_ref).await {
            Ok(bytes) => {
                self.set_phase(SessionPhase::Ready).await;
                info!(zip = archive_ref, bytes = bytes.len(), "archive retrieved");
                Ok(bytes)
            }
            Err(err) => {
                let err = PipelineError::from(err);
                self.set_phase(SessionPhase::Ready).await;
                self.errors.show(err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Advisory end-of-session signal. Fires at most once, never blocks the
    /// caller on failure, never surfaces an error; the service is expected
    /// to garbage-collect orphaned sessions on its own schedule anyway.
    pub async fn cleanup(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.cleanup_sent {
                return;
            }
            inner.cleanup_sent = true;
        }
        if let Err(err) = self.service.cleanup().await {
            warn!(error = %err, "session cleanup request failed");
        }
    }

    async fn begin(&self, op: Operation) -> Result<(), PipelineError> {
        let mut inflight = self.inflight.lock().await;
        if !inflight.insert(op) {
            warn!(operation = %op, "rejected duplicate in-flight request");
            return Err(PipelineError::InFlight(op));
        }
        Ok(())
    }

    async fn finish(&self, op: Operation) {
        self.inflight.lock().await.remove(&op);
    }

    async fn set_phase(&self, phase: SessionPhase) {
        {
            self.inner.lock().await.phase = phase;
        }
        self.emit_phase(phase);
    }

    fn emit_phase(&self, phase: SessionPhase) {
        let _ = self.events.send(PipelineEvent::PhaseChanged(phase));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
