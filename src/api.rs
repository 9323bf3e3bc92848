use std::{fmt::Display, sync::Arc, thread, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::{
    blocking::{self, multipart},
    Method, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::errors::{ClientError, RequestFailure};

/// Default production endpoint of the EmailListVerify API.
pub const DEFAULT_BASE_URL: &str = "https://apps.emaillistverify.com/api";

/// Fixed delay between requests in [`Client::verify_emails`].
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("emaillistverify-rs/", env!("CARGO_PKG_VERSION"));

/// The fixed set of API endpoints this client talks to.
///
/// These are configuration constants of the service, not subject to change
/// by callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endpoint {
    VerifyEmail,
    VerifyEmailDetailed,
    GetCredits,
    BulkUpload,
    FileInfo,
    DownloadAll,
    DownloadClean,
}

impl Endpoint {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verifyEmail",
            Self::VerifyEmailDetailed => "verifyEmailDetailed",
            Self::GetCredits => "getCredits",
            Self::BulkUpload => "verifApiFile",
            Self::FileInfo => "getApiFileInfo",
            Self::DownloadAll => "downloadApiFile",
            Self::DownloadClean => "downloadCleanFile",
        }
    }
}

/// File content attached to a request as a multipart form upload.
#[derive(Clone, Debug)]
pub struct FileUpload {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// One request against the API, before authentication is attached.
///
/// The `secret` query parameter is appended by the transport; callers must
/// never pass it themselves.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub method: Method,
    pub query: Vec<(&'static str, String)>,
    pub upload: Option<FileUpload>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(endpoint: Endpoint, query: Vec<(&'static str, String)>) -> Self {
        Self {
            endpoint,
            method: Method::GET,
            query,
            upload: None,
        }
    }

    #[must_use]
    pub fn post(
        endpoint: Endpoint,
        query: Vec<(&'static str, String)>,
        upload: FileUpload,
    ) -> Self {
        Self {
            endpoint,
            method: Method::POST,
            query,
            upload: Some(upload),
        }
    }
}

/// A successfully parsed response body.
///
/// Some endpoints return bare strings, others structured objects, and which
/// one is not known in advance, so the transport hands both shapes up as a
/// tagged union for callers to match on.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse {
    Text(String),
    Json(Value),
}

/// The seam between the client surface and the wire.
///
/// The production implementation is [`HttpTransport`]; tests inject a
/// recording fake through [`Client::with_transport`].
pub trait Transport {
    /// # Errors
    ///
    /// Fails with [`ClientError::Unauthorized`] on HTTP 401 and with
    /// [`ClientError::RequestFailed`] or [`ClientError::Transport`] on any
    /// other HTTP or network failure.
    fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Blocking HTTPS transport that authenticates every request with the
/// configured secret key.
pub struct HttpTransport {
    base: Url,
    api_key: String,
    client: blocking::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if the API key is empty or
    /// the `base` URL cannot be a base. We rely on the latter invariant
    /// when building endpoint URLs.
    pub fn new(base: Url, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::InvalidInput("API key is required".to_owned()));
        }
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidInput(format!(
                "{base} cannot be a base, provide a valid URL"
            )));
        }

        let client = blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            base,
            api_key,
            client,
        })
    }

    fn endpoint_url(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidInput(format!("{} cannot be a base URL", self.base))
            })?
            .push(request.endpoint.path());

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("secret", &self.api_key);
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        debug_assert!(
            request.query.iter().all(|(key, _)| *key != "secret"),
            "the secret parameter is attached by the transport"
        );

        let url = self.endpoint_url(&request)?;
        debug!(
            endpoint = request.endpoint.path(),
            method = %request.method,
            "sending API request"
        );

        let mut builder = self.client.request(request.method, url.clone());
        if let Some(upload) = request.upload {
            let part = multipart::Part::bytes(upload.contents)
                .file_name(upload.filename)
                .mime_str("text/csv")?;
            builder = builder.multipart(multipart::Form::new().part("file_contents", part));
        }

        let response = builder.send()?;
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            status if !status.is_success() => Err(ClientError::from(RequestFailure::new(
                url,
                status,
                response.text()?,
            ))),
            _ => {
                let body = response.text()?;
                debug!(%status, bytes = body.len(), "received API response");
                match serde_json::from_str::<Value>(&body) {
                    Ok(value) => Ok(ApiResponse::Json(value)),
                    Err(_) => Ok(ApiResponse::Text(body.trim().to_owned())),
                }
            }
        }
    }
}

/// Verification outcome vocabulary for a single email address.
///
/// `Error` is synthesized locally when the request itself failed. Parsing
/// never fails: status strings this version does not know about map to
/// [`VerificationStatus::Unknown`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Ok,
    Invalid,
    InvalidMx,
    AcceptAll,
    OkForAll,
    Disposable,
    Role,
    EmailDisabled,
    DeadServer,
    Unknown,
    Error,
}

impl VerificationStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "ok" => Self::Ok,
            "invalid" => Self::Invalid,
            "invalid_mx" => Self::InvalidMx,
            "accept_all" => Self::AcceptAll,
            "ok_for_all" => Self::OkForAll,
            "disposable" => Self::Disposable,
            "role" => Self::Role,
            "email_disabled" => Self::EmailDisabled,
            "dead_server" => Self::DeadServer,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Invalid => write!(f, "invalid"),
            Self::InvalidMx => write!(f, "invalid_mx"),
            Self::AcceptAll => write!(f, "accept_all"),
            Self::OkForAll => write!(f, "ok_for_all"),
            Self::Disposable => write!(f, "disposable"),
            Self::Role => write!(f, "role"),
            Self::EmailDisabled => write!(f, "email_disabled"),
            Self::DeadServer => write!(f, "dead_server"),
            Self::Unknown => write!(f, "unknown"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Detailed verification record for one address.
///
/// When the server answers with a bare status string the record is
/// synthesized locally; structured responses are decoded as-is, with fields
/// this version does not know about preserved in `extra`. Decoding is
/// lenient about field types: a non-string `email` or `status` is
/// stringified and an unparseable `timestamp` becomes `None`, so a shape
/// drift on the server side degrades a single field instead of failing the
/// whole call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmailResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}

impl EmailResult {
    #[must_use]
    pub fn status_code(&self) -> VerificationStatus {
        VerificationStatus::parse(&self.status)
    }
}

/// The canonical EmailListVerify client.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport + Send + Sync>,
}

impl Client {
    /// Build a client against the production API.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_url(Url::parse(DEFAULT_BASE_URL)?, api_key)
    }

    /// Build a client against a custom base URL.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `api_key` is empty or
    /// `base` cannot be a base URL.
    pub fn with_base_url(base: Url, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(
            base, api_key,
        )?)))
    }

    /// Build a client over an arbitrary [`Transport`] implementation.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport + Send + Sync>) -> Self {
        Self { transport }
    }

    pub(crate) fn call(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.transport.execute(request)
    }

    /// Verify a single email address, returning the raw status string.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `email` is empty, or
    /// with a transport error.
    pub fn verify_email(&self, email: &str) -> Result<String, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "email address is required".to_owned(),
            ));
        }

        let response = self.call(ApiRequest::get(
            Endpoint::VerifyEmail,
            vec![("email", email.to_owned())],
        ))?;

        Ok(match response {
            ApiResponse::Text(text) => text,
            ApiResponse::Json(value) => value.to_string(),
        })
    }

    /// Verify a single email address with the detailed endpoint.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::InvalidInput`] if `email` is empty, with
    /// [`ClientError::Decode`] if a structured response is not a JSON
    /// object, or with a transport error.
    pub fn verify_email_detailed(&self, email: &str) -> Result<EmailResult, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "email address is required".to_owned(),
            ));
        }

        let response = self.call(ApiRequest::get(
            Endpoint::VerifyEmailDetailed,
            vec![("email", email.to_owned())],
        ))?;

        match response {
            ApiResponse::Text(status) => Ok(EmailResult {
                email: email.to_owned(),
                status,
                timestamp: Some(Utc::now()),
                extra: serde_json::Map::new(),
            }),
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Verify a batch of addresses one by one, sleeping `delay` between
    /// requests as a crude fixed-rate limiter (skipped when zero;
    /// [`DEFAULT_BATCH_DELAY`] is a sensible starting point).
    ///
    /// Partial success is the contract: a per-address failure becomes an
    /// in-band `"error: <message>"` entry instead of aborting the batch.
    /// Input order is preserved and duplicates are processed independently.
    pub fn verify_emails<'a, I>(&self, emails: I, delay: Duration) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut results = Vec::new();
        for email in emails {
            if !results.is_empty() && !delay.is_zero() {
                thread::sleep(delay);
            }
            let status = match self.verify_email(email) {
                Ok(status) => status,
                Err(err) => format!("error: {err}"),
            };
            results.push((email.to_owned(), status));
        }
        results
    }

    /// Fetch the account's remaining credits.
    ///
    /// A bare-string answer is wrapped as `{"credits": <string>}` so the
    /// caller always gets a structured value.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub fn get_credits(&self) -> Result<Value, ClientError> {
        let response = self.call(ApiRequest::get(Endpoint::GetCredits, Vec::new()))?;

        Ok(match response {
            ApiResponse::Text(credits) => json!({ "credits": credits }),
            ApiResponse::Json(value) => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_match_the_service() {
        assert_eq!(Endpoint::VerifyEmail.path(), "verifyEmail");
        assert_eq!(Endpoint::VerifyEmailDetailed.path(), "verifyEmailDetailed");
        assert_eq!(Endpoint::GetCredits.path(), "getCredits");
        assert_eq!(Endpoint::BulkUpload.path(), "verifApiFile");
        assert_eq!(Endpoint::FileInfo.path(), "getApiFileInfo");
        assert_eq!(Endpoint::DownloadAll.path(), "downloadApiFile");
        assert_eq!(Endpoint::DownloadClean.path(), "downloadCleanFile");
    }

    #[test]
    fn verification_status_parses_known_vocabulary() {
        assert_eq!(VerificationStatus::parse("ok"), VerificationStatus::Ok);
        assert_eq!(
            VerificationStatus::parse("email_disabled"),
            VerificationStatus::EmailDisabled
        );
        assert_eq!(
            VerificationStatus::parse(" dead_server "),
            VerificationStatus::DeadServer
        );
        assert_eq!(
            VerificationStatus::parse("error"),
            VerificationStatus::Error
        );
    }

    #[test]
    fn verification_status_is_forward_compatible() {
        assert_eq!(
            VerificationStatus::parse("something_new"),
            VerificationStatus::Unknown
        );
        assert_eq!(VerificationStatus::parse(""), VerificationStatus::Unknown);
    }

    #[test]
    fn verification_status_display_round_trips() {
        for status in [
            VerificationStatus::Ok,
            VerificationStatus::Invalid,
            VerificationStatus::InvalidMx,
            VerificationStatus::AcceptAll,
            VerificationStatus::OkForAll,
            VerificationStatus::Disposable,
            VerificationStatus::Role,
            VerificationStatus::EmailDisabled,
            VerificationStatus::DeadServer,
            VerificationStatus::Unknown,
            VerificationStatus::Error,
        ] {
            assert_eq!(VerificationStatus::parse(&status.to_string()), status);
        }
    }

    #[test]
    fn http_transport_rejects_empty_api_key() {
        let base = Url::parse(DEFAULT_BASE_URL).unwrap();
        let result = HttpTransport::new(base, "  ");
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[test]
    fn http_transport_rejects_cannot_be_a_base_url() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        let result = HttpTransport::new(base, "key");
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[test]
    fn email_result_keeps_unknown_fields() {
        let value = serde_json::json!({
            "email": "user@example.com",
            "status": "ok",
            "mx_server": "mx.example.com"
        });
        let result: EmailResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.status_code(), VerificationStatus::Ok);
        assert_eq!(
            result.extra.get("mx_server").and_then(Value::as_str),
            Some("mx.example.com")
        );
    }

    #[test]
    fn email_result_tolerates_unexpected_field_types() {
        let value = serde_json::json!({
            "email": "user@example.com",
            "status": 200,
            "timestamp": "17/05/2024 10:30"
        });
        let result: EmailResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.email, "user@example.com");
        assert_eq!(result.status, "200");
        assert!(result.timestamp.is_none());
    }

    #[test]
    fn email_result_accepts_an_epoch_timestamp() {
        let value = serde_json::json!({
            "email": "user@example.com",
            "status": "ok",
            "timestamp": 1_715_940_000
        });
        let result: EmailResult = serde_json::from_value(value).unwrap();
        assert_eq!(
            result.timestamp,
            DateTime::from_timestamp(1_715_940_000, 0)
        );
    }
}
