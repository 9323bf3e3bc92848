use std::{
    fs,
    path::Path,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use backon::{BlockingRetryable, ConstantBuilder};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    api::{ApiRequest, ApiResponse, Client, Endpoint, FileUpload},
    errors::ClientError,
};

/// Default delay between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on the total time spent polling.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600);

/// Remote state of a bulk verification job.
///
/// `Completed` and `Failed` are terminal. Status strings this version does
/// not know about are treated as still in progress, so new intermediate
/// states on the server side keep the poll loop going instead of breaking
/// it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkJobState {
    InProgress,
    Completed,
    Failed,
}

/// Last status payload retrieved for a bulk job.
///
/// The `status` string is carried verbatim; fields this version does not
/// know about are preserved in `extra`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FileStatus {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl FileStatus {
    #[must_use]
    pub fn state(&self) -> BulkJobState {
        match self.status.trim() {
            "completed" => BulkJobState::Completed,
            "failed" => BulkJobState::Failed,
            _ => BulkJobState::InProgress,
        }
    }
}

/// Which result set to download once a bulk job has completed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResultFilter {
    /// Every address with its verification outcome.
    #[default]
    All,
    /// Only the addresses that verified clean.
    Clean,
}

impl ResultFilter {
    const fn endpoint(self) -> Endpoint {
        match self {
            Self::All => Endpoint::DownloadAll,
            Self::Clean => Endpoint::DownloadClean,
        }
    }
}

impl FromStr for ResultFilter {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "all" => Ok(Self::All),
            "clean" => Ok(Self::Clean),
            other => Err(ClientError::InvalidInput(format!(
                "result type must be 'all' or 'clean', got '{other}'"
            ))),
        }
    }
}

/// Cooperative cancellation flag for [`Client::wait_for_completion_with`].
///
/// The poll loop checks the flag at the start of every iteration, so a
/// caller holding a clone can abandon a job without waiting out the full
/// timeout.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

enum Poll {
    Pending,
    Finished(ClientError),
}

impl Client {
    /// Upload a local file of addresses for bulk verification, returning
    /// the file id the service assigned to the job.
    ///
    /// When `filename` is not given, one embedding the current timestamp is
    /// synthesized so repeated uploads never collide. The name is sent both
    /// as a query parameter and as the multipart upload filename.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::FileNotFound`] before any network call if
    /// `path` does not exist, and with [`ClientError::UploadError`] if the
    /// response carries neither a bare file id nor a `file_id` field. The
    /// latter shape has never been observed in practice but the service
    /// does not contractually guarantee the response layout.
    pub fn upload_file(
        &self,
        path: &Path,
        filename: Option<String>,
    ) -> Result<String, ClientError> {
        if !path.exists() {
            return Err(ClientError::FileNotFound(path.to_path_buf()));
        }

        let filename = filename.unwrap_or_else(|| {
            format!("bulk_verify_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"))
        });
        let contents = fs::read(path)?;
        info!(%filename, bytes = contents.len(), "uploading bulk verification file");

        let response = self.call(ApiRequest::post(
            Endpoint::BulkUpload,
            vec![("filename", filename.clone())],
            FileUpload { filename, contents },
        ))?;

        match response {
            ApiResponse::Text(raw) => {
                let id = raw.trim();
                if id.is_empty() {
                    Err(ClientError::UploadError)
                } else {
                    Ok(id.to_owned())
                }
            }
            ApiResponse::Json(value) => value
                .get("file_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(ClientError::UploadError),
        }
    }

    /// Fetch the current status of a bulk job.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `file_id` is empty, or
    /// with a transport error.
    pub fn file_status(&self, file_id: &str) -> Result<FileStatus, ClientError> {
        if file_id.trim().is_empty() {
            return Err(ClientError::InvalidInput("file id is required".to_owned()));
        }

        let response = self.call(ApiRequest::get(
            Endpoint::FileInfo,
            vec![("file_id", file_id.to_owned())],
        ))?;

        match response {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
            // Not the documented shape, but keep the dual-mode contract.
            ApiResponse::Text(status) => Ok(FileStatus {
                file_id: Some(file_id.to_owned()),
                status,
                error: None,
                extra: serde_json::Map::new(),
            }),
        }
    }

    /// Download the result CSV of a completed bulk job.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `file_id` is empty, or
    /// with a transport error.
    pub fn download_result(
        &self,
        file_id: &str,
        filter: ResultFilter,
    ) -> Result<String, ClientError> {
        if file_id.trim().is_empty() {
            return Err(ClientError::InvalidInput("file id is required".to_owned()));
        }

        let response = self.call(ApiRequest::get(
            filter.endpoint(),
            vec![("file_id", file_id.to_owned())],
        ))?;

        Ok(match response {
            ApiResponse::Text(csv) => csv,
            ApiResponse::Json(value) => value.to_string(),
        })
    }

    /// Poll a bulk job with the default interval and time bound.
    ///
    /// # Errors
    ///
    /// See [`Client::wait_for_completion_with`].
    pub fn wait_for_completion(&self, file_id: &str) -> Result<FileStatus, ClientError> {
        self.wait_for_completion_with(file_id, DEFAULT_POLL_INTERVAL, DEFAULT_MAX_WAIT, None)
    }

    /// Poll a bulk job until it reaches a terminal state, the time bound is
    /// hit, or `cancel` fires.
    ///
    /// Polling is the only completion signal the service offers, so the
    /// loop trades responsiveness (`interval`) against request volume and
    /// is guaranteed to terminate within `max_wait`. Once the next poll
    /// could no longer happen strictly inside the bound, no further status
    /// call is made.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::RemoteFailure`] as soon as the job reports
    /// `failed` (carrying the server's error detail when present), with
    /// [`ClientError::Timeout`] when `max_wait` runs out, and with
    /// [`ClientError::Cancelled`] when the token fires. Transport errors,
    /// including [`ClientError::Unauthorized`], abort the loop immediately.
    pub fn wait_for_completion_with(
        &self,
        file_id: &str,
        interval: Duration,
        max_wait: Duration,
        cancel: Option<&CancelToken>,
    ) -> Result<FileStatus, ClientError> {
        let started = Instant::now();

        let fetch = || -> Result<FileStatus, Poll> {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(Poll::Finished(ClientError::Cancelled));
                }
            }

            let status = self.file_status(file_id).map_err(Poll::Finished)?;
            match status.state() {
                BulkJobState::Completed => Ok(status),
                BulkJobState::Failed => Err(Poll::Finished(ClientError::RemoteFailure(
                    status
                        .error
                        .unwrap_or_else(|| "unknown error".to_owned()),
                ))),
                BulkJobState::InProgress => Err(Poll::Pending),
            }
        };

        fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(interval)
                    .with_max_times(usize::MAX),
            )
            .when(|poll| {
                matches!(poll, Poll::Pending) && started.elapsed() + interval < max_wait
            })
            .notify(|_, dur: Duration| {
                debug!(file_id, delay = ?dur, "bulk job still processing, polling again");
            })
            .call()
            .map_err(|err| match err {
                Poll::Pending => ClientError::Timeout(max_wait),
                Poll::Finished(e) => e,
            })
    }
}
