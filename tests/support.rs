//! Shared test transport: scripted responses in, recorded requests out.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use emaillistverify::api::{ApiRequest, ApiResponse, Transport};
use emaillistverify::errors::ClientError;

/// A [`Transport`] that replays a scripted sequence of responses and
/// records every request it sees, so tests can assert on call counts and
/// request shapes without touching the network.
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, ClientError>>>,
    fallback: Option<ApiResponse>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    /// Scripted transport; running past the script is a test bug and
    /// panics.
    pub fn new(responses: Vec<Result<ApiResponse, ClientError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Scripted transport that keeps answering `fallback` once the script
    /// runs out. Useful for open-ended polling scenarios.
    pub fn with_fallback(
        responses: Vec<Result<ApiResponse, ClientError>>,
        fallback: ApiResponse,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: Some(fallback),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(body: &str) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse::Text(body.to_owned()))
    }

    pub fn json(value: serde_json::Value) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse::Json(value))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for FakeTransport {
    fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.requests.lock().unwrap().push(request);

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => panic!("FakeTransport script exhausted"),
        }
    }
}
