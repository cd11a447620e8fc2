//! Background verification jobs with an explicit status machine:
//! `uploaded -> processing -> completed | failed | partial`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::models::{Claim, VerificationReport};

use super::pipeline::VerificationPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Partial)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Uploaded, JobStatus::Processing)
                | (JobStatus::Uploaded, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Partial)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    pub report: Option<Arc<VerificationReport>>,
    pub error: Option<String>,
}

impl JobState {
    fn new(status: JobStatus) -> Self {
        Self {
            status,
            report: None,
            error: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("illegal job transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("job ended without reaching a terminal state")]
    Abandoned,
}

/// Writer side of one job's status channel.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    tx: watch::Sender<JobState>,
}

impl Job {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobState::new(JobStatus::Uploaded));
        Self { id: Uuid::new_v4(), tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> JobStatus {
        self.tx.borrow().status
    }

    /// Move to `next`, notifying subscribers. Illegal moves leave the state
    /// untouched.
    pub fn transition(&self, next: JobState) -> Result<(), JobError> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            if state.status.can_transition_to(next.status) {
                *state = next;
                true
            } else {
                outcome = Err(JobError::IllegalTransition {
                    from: state.status,
                    to: next.status,
                });
                false
            }
        });
        outcome
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side returned from [`JobTracker::submit`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: Uuid,
    rx: watch::Receiver<JobState>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        self.rx.borrow().status
    }

    /// Wait until the job completes, fails or ends partially.
    pub async fn wait_terminal(&mut self) -> Result<JobState, JobError> {
        self.rx
            .wait_for(|state| state.status.is_terminal())
            .await
            .map(|state| state.clone())
            .map_err(|_| JobError::Abandoned)
    }
}

/// Finished jobs kept queryable through [`JobTracker::status`].
pub const DEFAULT_RETAINED_JOBS: usize = 256;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, watch::Receiver<JobState>>,
    /// Terminal jobs, oldest first.
    finished: VecDeque<Uuid>,
}

impl JobTable {
    fn finish(&mut self, id: Uuid, retain: usize) {
        self.finished.push_back(id);
        while self.finished.len() > retain {
            if let Some(evicted) = self.finished.pop_front() {
                self.jobs.remove(&evicted);
            }
        }
    }
}

/// Runs verification jobs in the background and tracks their status.
///
/// Only the most recent `retain` finished jobs stay in the table.
#[derive(Clone)]
pub struct JobTracker {
    pipeline: Arc<VerificationPipeline>,
    table: Arc<RwLock<JobTable>>,
    retain: usize,
}

impl JobTracker {
    pub fn new(pipeline: Arc<VerificationPipeline>) -> Self {
        Self::with_retention(pipeline, DEFAULT_RETAINED_JOBS)
    }

    pub fn with_retention(pipeline: Arc<VerificationPipeline>, retain: usize) -> Self {
        Self {
            pipeline,
            table: Arc::new(RwLock::new(JobTable::default())),
            retain,
        }
    }

    pub async fn submit(&self, resume_id: String, claims: Vec<Claim>) -> JobHandle {
        let job = Job::new();
        let id = job.id;
        let handle = JobHandle {
            id,
            rx: job.subscribe(),
        };
        self.table.write().await.jobs.insert(id, job.subscribe());
        tracing::info!(job_id = %id, resume_id = %resume_id, "Verification job uploaded");

        let pipeline = self.pipeline.clone();
        let table = self.table.clone();
        let retain = self.retain;
        tokio::spawn(async move {
            run_job(job, pipeline, resume_id, claims).await;
            table.write().await.finish(id, retain);
        });

        handle
    }

    pub async fn status(&self, id: Uuid) -> Option<JobState> {
        self.table.read().await.jobs.get(&id).map(|rx| rx.borrow().clone())
    }

    /// Jobs currently tracked, running or finished.
    pub async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn run_job(job: Job, pipeline: Arc<VerificationPipeline>, resume_id: String, claims: Vec<Claim>) {
    if let Err(e) = job.transition(JobState::new(JobStatus::Processing)) {
        tracing::error!(job_id = %job.id, error = %e, "Job could not start");
        return;
    }

    let next = match pipeline.run_verification(&resume_id, &claims).await {
        Ok(report) => {
            let status = if report.partial.is_some() {
                JobStatus::Partial
            } else {
                JobStatus::Completed
            };
            JobState {
                status,
                report: Some(Arc::new(report)),
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, resume_id = %resume_id, error = %e, "Verification job failed");
            JobState {
                status: JobStatus::Failed,
                report: None,
                error: Some(format!("{}: {e}", e.kind())),
            }
        }
    };

    let status = next.status;
    if let Err(e) = job.transition(next) {
        tracing::error!(job_id = %job.id, error = %e, "Job could not finish");
        return;
    }
    tracing::info!(job_id = %job.id, status = %status, "Verification job finished");
}
