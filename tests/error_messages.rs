#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::time::Duration;

use emaillistverify::errors::{ClientError, RequestFailure};
use reqwest::StatusCode;
use url::Url;

#[test]
fn request_failure_reports_url_status_and_server_body() {
    let url = Url::parse("https://apps.emaillistverify.com/api/getCredits").unwrap();
    let failure = RequestFailure::new(url, StatusCode::TOO_MANY_REQUESTS, "slow down");

    let message = format!("{failure}");

    assert!(message.contains("https://apps.emaillistverify.com/api/getCredits"));
    assert!(message.contains("429"));
    assert!(message.contains("slow down"));
}

#[test]
fn unauthorized_points_at_the_api_key() {
    let message = format!("{}", ClientError::Unauthorized);
    assert_eq!(message, "unauthorized, check the API key");
}

#[test]
fn invalid_input_carries_the_reason() {
    let err = ClientError::InvalidInput("email address is required".to_owned());
    assert_eq!(format!("{err}"), "invalid input: email address is required");
}

#[test]
fn file_not_found_names_the_path() {
    let err = ClientError::FileNotFound(PathBuf::from("/tmp/missing.csv"));
    assert_eq!(format!("{err}"), "file not found: /tmp/missing.csv");
}

#[test]
fn remote_failure_embeds_the_server_detail() {
    let err = ClientError::RemoteFailure("malformed list".to_owned());
    assert_eq!(format!("{err}"), "bulk verification failed: malformed list");
}

#[test]
fn timeout_embeds_the_configured_bound() {
    let err = ClientError::Timeout(Duration::from_secs(3600));
    assert_eq!(
        format!("{err}"),
        "timed out after 3600s waiting for bulk verification"
    );
}

#[test]
fn unknown_job_names_the_id() {
    let err = ClientError::UnknownJob("id-404".to_owned());
    assert_eq!(format!("{err}"), "unknown job id: id-404");
}

#[test]
fn upload_error_explains_the_missing_file_id() {
    let message = format!("{}", ClientError::UploadError);
    assert!(message.contains("file id"));
}

#[test]
fn cancelled_wait_is_explicit() {
    let message = format!("{}", ClientError::Cancelled);
    assert!(message.contains("cancelled"));
}
