//! HTTP plumbing shared by chat and catalog operations.
//!
//! [`Transport`] sends a request and hands back the response without judging
//! its status; callers either accept the standard status policy through
//! [`ApiResponse::error_for_status`] or inspect the status themselves.

use futures_util::StreamExt;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::core::config::{ConnectionConfig, TimeoutPolicy, Timeouts};
use crate::core::error::{OperationError, UnexpectedKind};
use crate::core::line_stream::LineStream;

/// A request against one API endpoint, relative to the configured base URL.
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    path: &'static str,
    body: Option<Vec<u8>>,
    timeout: TimeoutPolicy,
}

impl ApiRequest {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::GET,
            path,
            body: None,
            timeout: TimeoutPolicy::Connect,
        }
    }

    pub fn post<B: Serialize>(path: &'static str, body: &B) -> Result<Self, OperationError> {
        Self::with_body(Method::POST, path, body)
    }

    pub fn delete<B: Serialize>(path: &'static str, body: &B) -> Result<Self, OperationError> {
        Self::with_body(Method::DELETE, path, body)
    }

    fn with_body<B: Serialize>(
        method: Method,
        path: &'static str,
        body: &B,
    ) -> Result<Self, OperationError> {
        let body = serde_json::to_vec(body).map_err(|err| {
            OperationError::Unexpected(UnexpectedKind::Request(format!(
                "failed to encode request body: {err}"
            )))
        })?;
        Ok(Self {
            method,
            path,
            body: Some(body),
            timeout: TimeoutPolicy::Connect,
        })
    }

    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = policy;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Transport {
    client: reqwest::Client,
    timeouts: Timeouts,
}

impl Transport {
    pub fn new(timeouts: Timeouts) -> Result<Self, OperationError> {
        let mut builder = reqwest::Client::builder();
        if !timeouts.connect.is_zero() {
            builder = builder.connect_timeout(timeouts.connect);
        }
        let client = builder.build().map_err(|err| {
            OperationError::Unexpected(UnexpectedKind::Request(format!(
                "failed to build HTTP client: {err}"
            )))
        })?;
        Ok(Self { client, timeouts })
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Send `request` to the server at `connection`.
    ///
    /// Only transport-level failures are errors here; any HTTP status, including
    /// 4xx and 5xx, comes back as an [`ApiResponse`].
    pub async fn execute(
        &self,
        connection: &ConnectionConfig,
        request: ApiRequest,
    ) -> Result<ApiResponse, OperationError> {
        let url = connection.endpoint(request.path);
        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(limit) = self.timeouts.limit_for(request.timeout) {
            builder = builder.timeout(limit);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        debug!(method = %request.method, url = %url, timeout = ?request.timeout, "Sending request");
        let response = builder.send().await.map_err(|err| {
            let classified = OperationError::from(err);
            debug!(url = %url, error_kind = classified.kind(), error = %classified, "Request failed");
            classified
        })?;
        debug!(url = %url, status = %response.status(), "Response received");
        Ok(ApiResponse { inner: response })
    }
}

/// Map a response status to the error it represents, if any.
///
/// Only 500 counts as a server fault; every other non-success status is
/// reported as a connection failure.
pub fn classify_status(status: StatusCode) -> Option<OperationError> {
    if status.is_success() {
        return None;
    }
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        Some(OperationError::ServerFault {
            code: status.as_u16(),
            reason: reason.to_string(),
        })
    } else {
        Some(OperationError::ConnectionFailure(format!(
            "HTTP {}: {}",
            status.as_u16(),
            reason
        )))
    }
}

#[derive(Debug)]
pub struct ApiResponse {
    inner: reqwest::Response,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn error_for_status(self) -> Result<Self, OperationError> {
        match classify_status(self.status()) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Read the whole body and decode it as one JSON document.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, OperationError> {
        let body = self.inner.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Consume the body incrementally as newline-delimited JSON.
    ///
    /// Dropping the returned stream drops the response, which closes the
    /// connection.
    pub fn lines<T: DeserializeOwned>(self) -> LineStream<T> {
        let chunks = self
            .inner
            .bytes_stream()
            .map(|chunk| chunk.map_err(OperationError::from))
            .boxed();
        LineStream::new(chunks)
    }
}
