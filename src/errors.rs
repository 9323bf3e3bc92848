use reqwest::StatusCode;
use std::fmt::{self, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A non-2xx response from the API, carrying whatever the server sent back.
#[derive(Debug, Error)]
pub struct RequestFailure {
    pub url: Url,
    pub status: StatusCode,
    pub msg: String,
}

impl RequestFailure {
    pub fn new(url: Url, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            url,
            status,
            msg: msg.into(),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{} returned {}, with:\n{}",
            self.url, self.status, self.msg
        )
    }
}

/// Everything that can go wrong talking to the EmailListVerify API.
///
/// HTTP 401 gets its own variant because an invalid key is never worth
/// retrying; any other non-2xx keeps the server's response in
/// [`RequestFailure`], and network-level problems keep their reqwest cause.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized, check the API key")]
    Unauthorized,

    #[error(transparent)]
    RequestFailed(#[from] RequestFailure),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not extract a file id from the upload response")]
    UploadError,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("bulk verification failed: {0}")]
    RemoteFailure(String),

    #[error("timed out after {0:?} waiting for bulk verification")]
    Timeout(Duration),

    #[error("unknown job id: {0}")]
    UnknownJob(String),

    #[error("wait for completion was cancelled")]
    Cancelled,

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}
