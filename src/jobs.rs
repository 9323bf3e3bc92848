use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    api::Client,
    bulk::{BulkJobState, FileStatus, ResultFilter},
    errors::ClientError,
};

/// Metadata for one bulk verification submission.
///
/// The file id is assigned once, at upload, and never changes. `status`
/// only ever advances from in-progress to a terminal state;
/// `completed_at` is set on that transition.
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    pub file_id: String,
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub status: BulkJobState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last full status payload retrieved, cached for inspection without
    /// another poll.
    pub last_status: Option<FileStatus>,
}

/// Tracks bulk verification jobs across their lifecycle.
///
/// The registry owns its jobs exclusively and is the only mutator of their
/// metadata. The map is mutex-protected so jobs can be submitted and
/// queried from multiple threads; network calls always happen outside the
/// lock.
pub struct JobRegistry {
    client: Client,
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upload `input` for bulk verification and start tracking the job.
    ///
    /// With `wait` set, blocks until the job reaches a terminal state,
    /// downloads the full result set, and writes the CSV text verbatim to
    /// `output` (overwriting it), leaving the job in its terminal state.
    /// Without it, returns right after the upload with the job still in
    /// progress.
    ///
    /// # Errors
    ///
    /// Propagates any bulk lifecycle error. When the remote reports the
    /// job `failed` during the wait, the tracked job is marked failed
    /// before [`ClientError::RemoteFailure`] is returned.
    pub fn submit_job(
        &self,
        input: &Path,
        output: &Path,
        wait: bool,
    ) -> Result<Job, ClientError> {
        let file_id = self.client.upload_file(input, None)?;
        let job = Job {
            file_id: file_id.clone(),
            input_file: input.to_path_buf(),
            output_file: output.to_path_buf(),
            status: BulkJobState::InProgress,
            created_at: Utc::now(),
            completed_at: None,
            last_status: None,
        };
        self.lock().insert(file_id.clone(), job.clone());

        if !wait {
            return Ok(job);
        }

        let final_status = match self.client.wait_for_completion(&file_id) {
            Ok(status) => status,
            Err(err) => {
                if matches!(err, ClientError::RemoteFailure(_)) {
                    self.mark_terminal(&file_id, BulkJobState::Failed, None);
                }
                return Err(err);
            }
        };

        // The terminal observation is recorded before the download, so a
        // failure persisting the results cannot leave the job in progress.
        let job = self
            .mark_terminal(&file_id, BulkJobState::Completed, Some(final_status))
            .ok_or_else(|| ClientError::UnknownJob(file_id.clone()))?;

        let results = self.client.download_result(&file_id, ResultFilter::All)?;
        fs::write(output, results)?;
        info!(%file_id, output = %output.display(), "bulk job completed, results written");

        Ok(job)
    }

    /// Refresh and return the tracked state of a job.
    ///
    /// Every query costs one status call against the service; the result
    /// is cached on the job's `last_status`.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::UnknownJob`], before any network call,
    /// when `file_id` was never registered here.
    pub fn job_status(&self, file_id: &str) -> Result<Job, ClientError> {
        if !self.lock().contains_key(file_id) {
            return Err(ClientError::UnknownJob(file_id.to_owned()));
        }

        let status = self.client.file_status(file_id)?;

        let mut jobs = self.lock();
        let job = jobs
            .get_mut(file_id)
            .ok_or_else(|| ClientError::UnknownJob(file_id.to_owned()))?;

        let state = status.state();
        if job.status == BulkJobState::InProgress
            && matches!(state, BulkJobState::Completed | BulkJobState::Failed)
        {
            job.status = state;
            job.completed_at = Some(Utc::now());
        }
        job.last_status = Some(status);

        Ok(job.clone())
    }

    /// Snapshot of every job the registry is tracking.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().values().cloned().collect()
    }

    fn mark_terminal(
        &self,
        file_id: &str,
        state: BulkJobState,
        last_status: Option<FileStatus>,
    ) -> Option<Job> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(file_id)?;
        if job.status == BulkJobState::InProgress {
            job.status = state;
            job.completed_at = Some(Utc::now());
        }
        if let Some(status) = last_status {
            job.last_status = Some(status);
        }
        Some(job.clone())
    }
}
