//! Installed-model inventory: list, pull, delete.
//!
//! These calls are stateless; each one is a fresh request against the
//! connection it is given.

use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{
    DeleteRequest, ModelsResponse, PullRequest, PullResponse, DELETE_ENDPOINT, PULL_ENDPOINT,
    TAGS_ENDPOINT,
};
use crate::core::config::{ConnectionConfig, TimeoutPolicy};
use crate::core::error::{OperationError, UnexpectedKind};
use crate::core::line_stream::LineStream;
use crate::core::transport::{ApiRequest, Transport};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
}

/// One progress report from a model download.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullProgressEvent {
    pub status: String,
    pub total: Option<u64>,
    pub completed: Option<u64>,
    /// Set when the server reported an error on this line. Informational: the
    /// download keeps being read.
    pub error_text: Option<String>,
}

impl PullProgressEvent {
    fn from_response(response: PullResponse) -> Option<Self> {
        if response.status.is_none() && response.error.is_none() {
            return None;
        }
        Some(Self {
            status: response.status.unwrap_or_default(),
            total: response.total,
            completed: response.completed,
            error_text: response.error,
        })
    }

    /// Human-readable line, e.g. `pulling 6a0746a1ec1a [1024/4096]`.
    pub fn describe(&self) -> String {
        let mut line = match (&self.error_text, self.status.is_empty()) {
            (Some(error), _) => error.clone(),
            (None, false) => self.status.clone(),
            (None, true) => "no response".to_string(),
        };
        if !self.status.is_empty() {
            if let Some(total) = self.total.filter(|total| *total > 0) {
                line.push_str(&format!(" [{}/{}]", self.completed.unwrap_or(0), total));
            }
        }
        line
    }

    /// Completion ratio in percent, when the server reported sizes.
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total.filter(|total| *total > 0)?;
        Some(self.completed.unwrap_or(0) as f64 / total as f64 * 100.0)
    }
}

impl fmt::Display for PullProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Fetch the installed models, in the order the server lists them.
///
/// An empty inventory is reported as [`OperationError::ModelNotFound`].
pub async fn list_models(
    transport: &Transport,
    connection: &ConnectionConfig,
) -> Result<Vec<ModelDescriptor>, OperationError> {
    let response = transport
        .execute(connection, ApiRequest::get(TAGS_ENDPOINT))
        .await?
        .error_for_status()?;
    let body: ModelsResponse = response.json().await?;

    let models: Vec<ModelDescriptor> = body
        .models
        .unwrap_or_default()
        .into_iter()
        .map(|model| ModelDescriptor { name: model.name })
        .collect();
    if models.is_empty() {
        return Err(OperationError::ModelNotFound);
    }
    debug!(count = models.len(), "Listed models");
    Ok(models)
}

/// Ask whether the server answers at all, with the short probe timeout.
pub async fn check_connection(transport: &Transport, connection: &ConnectionConfig) -> bool {
    let request = ApiRequest::get(TAGS_ENDPOINT).timeout(TimeoutPolicy::Probe);
    match transport.execute(connection, request).await {
        Ok(response) => response.status() == StatusCode::OK,
        Err(err) => {
            debug!(error_kind = err.kind(), error = %err, "Connection check failed");
            false
        }
    }
}

/// Progress of a running download.
pub struct PullStream {
    lines: LineStream<PullResponse>,
}

impl PullStream {
    /// Next progress report, or `None` when the server closed the stream.
    pub async fn next_event(&mut self) -> Option<Result<PullProgressEvent, OperationError>> {
        loop {
            match self.lines.next_record().await? {
                Ok(response) => {
                    if let Some(event) = PullProgressEvent::from_response(response) {
                        if let Some(error) = &event.error_text {
                            warn!(error = %error, "Server reported a pull error");
                        }
                        return Some(Ok(event));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Start downloading `name`. The request carries no timeout.
pub async fn pull_model(
    transport: &Transport,
    connection: &ConnectionConfig,
    name: &str,
    insecure: bool,
) -> Result<PullStream, OperationError> {
    let request = ApiRequest::post(
        PULL_ENDPOINT,
        &PullRequest {
            name: name.to_string(),
            insecure,
            stream: true,
        },
    )?
    .timeout(TimeoutPolicy::Unbounded);

    let response = transport
        .execute(connection, request)
        .await?
        .error_for_status()?;
    Ok(PullStream {
        lines: response.lines(),
    })
}

/// Remove `name` from the server. The status code is the whole answer.
pub async fn delete_model(
    transport: &Transport,
    connection: &ConnectionConfig,
    name: &str,
) -> Result<(), OperationError> {
    let request = ApiRequest::delete(
        DELETE_ENDPOINT,
        &DeleteRequest {
            name: name.to_string(),
        },
    )?;

    let response = transport.execute(connection, request).await?;
    match response.status() {
        StatusCode::OK => Ok(()),
        StatusCode::NOT_FOUND => Err(OperationError::ModelNotFound),
        other => Err(OperationError::Unexpected(UnexpectedKind::Status(
            other.as_u16(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Timeouts;
    use crate::utils::test_utils::{closed_port_url, MockResponse, MockServer};
    use std::time::Duration;

    fn transport() -> Transport {
        Transport::new(Timeouts {
            connect: Duration::from_secs(2),
            chat: Duration::from_secs(2),
            probe: Duration::from_millis(500),
        })
        .expect("client builds")
    }

    #[test]
    fn describe_matches_progress_log_format() {
        let event = PullProgressEvent {
            status: "pulling 6a0746a1ec1a".into(),
            total: Some(4096),
            completed: Some(1024),
            error_text: None,
        };
        assert_eq!(event.describe(), "pulling 6a0746a1ec1a [1024/4096]");
        assert_eq!(event.percentage(), Some(25.0));

        let event = PullProgressEvent {
            status: "pulling manifest".into(),
            total: Some(10),
            ..PullProgressEvent::default()
        };
        assert_eq!(event.describe(), "pulling manifest [0/10]");

        let event = PullProgressEvent {
            error_text: Some("pull model manifest: file does not exist".into()),
            ..PullProgressEvent::default()
        };
        assert_eq!(event.describe(), "pull model manifest: file does not exist");
        assert_eq!(PullProgressEvent::default().describe(), "no response");
    }

    #[tokio::test]
    async fn list_preserves_server_order() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"models":[{"name":"mistral:7b","size":1},{"name":"llama3.2:3b"},{"name":"phi3:mini"}]}"#,
        )])
        .await;

        let models = list_models(&transport(), &server.connection())
            .await
            .expect("models listed");
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["mistral:7b", "llama3.2:3b", "phi3:mini"]);

        let requests = server.requests().await;
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/api/tags");
    }

    #[tokio::test]
    async fn empty_inventory_is_model_not_found() {
        let server = MockServer::start(vec![
            MockResponse::json(200, r#"{"models":[]}"#),
            MockResponse::json(200, r#"{}"#),
        ])
        .await;

        for _ in 0..2 {
            let err = list_models(&transport(), &server.connection())
                .await
                .expect_err("no models");
            assert_eq!(err, OperationError::ModelNotFound);
        }
    }

    #[tokio::test]
    async fn list_classifies_server_fault_and_other_statuses() {
        let server = MockServer::start(vec![
            MockResponse::status(500, "boom"),
            MockResponse::status(403, "nope"),
        ])
        .await;

        let err = list_models(&transport(), &server.connection())
            .await
            .expect_err("500");
        assert!(matches!(err, OperationError::ServerFault { code: 500, .. }));

        let err = list_models(&transport(), &server.connection())
            .await
            .expect_err("403");
        assert_eq!(
            err,
            OperationError::ConnectionFailure("HTTP 403: Forbidden".into())
        );
    }

    #[tokio::test]
    async fn list_against_unreachable_host_is_connection_failure() {
        let connection = ConnectionConfig::new(&closed_port_url().await);
        let err = list_models(&transport(), &connection)
            .await
            .expect_err("unreachable");
        assert_eq!(err.kind(), "connection_failure");
    }

    #[tokio::test]
    async fn delete_maps_status_codes() {
        let server = MockServer::start(vec![
            MockResponse::status(200, ""),
            MockResponse::status(404, "{\"error\":\"model 'ghost' not found\"}"),
            MockResponse::status(409, ""),
        ])
        .await;
        let connection = server.connection();

        assert_eq!(delete_model(&transport(), &connection, "llama3").await, Ok(()));
        assert_eq!(
            delete_model(&transport(), &connection, "ghost").await,
            Err(OperationError::ModelNotFound)
        );
        assert_eq!(
            delete_model(&transport(), &connection, "busy").await,
            Err(OperationError::Unexpected(UnexpectedKind::Status(409)))
        );

        let requests = server.requests().await;
        assert_eq!(requests[1].method, "DELETE");
        assert_eq!(requests[1].path, "/api/delete");
        assert_eq!(requests[1].json(), serde_json::json!({"name": "ghost"}));
    }

    #[tokio::test]
    async fn pull_surfaces_line_errors_without_stopping() {
        let server = MockServer::start(vec![MockResponse::ndjson(&[
            r#"{"status":"pulling manifest"}"#,
            r#"{"error":"digest mismatch, retrying"}"#,
            r#"{"status":"downloading","total":100,"completed":40}"#,
            r#"{"digest":"sha256:abc"}"#,
            r#"{"status":"success"}"#,
        ])])
        .await;

        let mut stream = pull_model(&transport(), &server.connection(), "phi3", true)
            .await
            .expect("pull starts");
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            events.push(event.expect("well-formed line"));
        }

        let lines: Vec<_> = events.iter().map(PullProgressEvent::describe).collect();
        assert_eq!(
            lines,
            vec![
                "pulling manifest",
                "digest mismatch, retrying",
                "downloading [40/100]",
                "success",
            ]
        );
        assert_eq!(
            events[1].error_text.as_deref(),
            Some("digest mismatch, retrying")
        );

        let requests = server.requests().await;
        assert_eq!(requests[0].path, "/api/pull");
        assert_eq!(
            requests[0].json(),
            serde_json::json!({"name": "phi3", "insecure": true, "stream": true})
        );
    }

    #[tokio::test]
    async fn pull_halts_on_malformed_line() {
        let server = MockServer::start(vec![MockResponse::ndjson(&[
            r#"{"status":"pulling manifest"}"#,
            r#"{"status":"#,
            r#"{"status":"success"}"#,
        ])])
        .await;

        let mut stream = pull_model(&transport(), &server.connection(), "phi3", false)
            .await
            .expect("pull starts");
        assert!(stream.next_event().await.expect("first").is_ok());
        let err = stream
            .next_event()
            .await
            .expect("second")
            .expect_err("malformed");
        assert_eq!(err.kind(), "malformed_response");
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn check_connection_reports_reachability() {
        let server = MockServer::start(vec![MockResponse::json(200, r#"{"models":[]}"#)]).await;
        assert!(check_connection(&transport(), &server.connection()).await);

        let connection = ConnectionConfig::new(&closed_port_url().await);
        assert!(!check_connection(&transport(), &connection).await);
    }
}
