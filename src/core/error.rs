use std::error::Error as StdError;
use std::fmt;

/// What went wrong when a failure could not be attributed to a more specific cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnexpectedKind {
    /// The server answered with a status the operation has no mapping for.
    Status(u16),
    /// The HTTP client failed for a reason other than connecting, reading or timing out.
    Request(String),
    /// A background task ended abnormally (panicked or was aborted).
    Task(String),
}

impl fmt::Display for UnexpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnexpectedKind::Status(code) => write!(f, "unexpected server response: {code}"),
            UnexpectedKind::Request(detail) => write!(f, "request error: {detail}"),
            UnexpectedKind::Task(detail) => write!(f, "background task failed: {detail}"),
        }
    }
}

/// Every failure an operation can report to the presentation layer.
///
/// Transport and decoding failures are classified into one of these variants
/// before they leave the core; nothing else escapes the public operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The server has no model to offer, or the requested model does not exist.
    ModelNotFound,
    /// The server could not be reached, the connection broke, or it answered
    /// with a non-success status other than 500.
    ConnectionFailure(String),
    /// The server answered with HTTP 500.
    ServerFault { code: u16, reason: String },
    /// The configured timeout for the operation elapsed.
    Timeout,
    /// A response body or stream line was not the JSON we expected.
    MalformedResponse(String),
    Unexpected(UnexpectedKind),
}

impl OperationError {
    /// Stable tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::ModelNotFound => "model_not_found",
            OperationError::ConnectionFailure(_) => "connection_failure",
            OperationError::ServerFault { .. } => "server_fault",
            OperationError::Timeout => "timeout",
            OperationError::MalformedResponse(_) => "malformed_response",
            OperationError::Unexpected(_) => "unexpected",
        }
    }

    /// Remediation hints shown under the error message, if any apply.
    pub fn quick_fixes(&self) -> &'static [&'static str] {
        match self {
            OperationError::ModelNotFound => &["Download a model with 'palaver pull <name>'"],
            OperationError::ConnectionFailure(_) => &[
                "Check that the server is running ('ollama serve')",
                "Verify the host and port (default http://127.0.0.1:11434)",
            ],
            OperationError::ServerFault { .. } => &[
                "Restart the server",
                "Try another model; the current one may be corrupted",
                "Check the server logs for out-of-memory errors",
            ],
            OperationError::Timeout => &["The server is busy or the model is still loading; try again"],
            OperationError::MalformedResponse(_) | OperationError::Unexpected(_) => &[],
        }
    }

    /// Process exit status for command-line use.
    pub fn exit_code(&self) -> i32 {
        match self {
            OperationError::ConnectionFailure(_) | OperationError::Timeout => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::ModelNotFound => write!(f, "No model found"),
            OperationError::ConnectionFailure(reason) => write!(f, "Connection failed: {reason}"),
            OperationError::ServerFault { code, reason } => {
                write!(f, "Server error ({code}): {reason}")
            }
            OperationError::Timeout => write!(f, "Timed out waiting for the server"),
            OperationError::MalformedResponse(detail) => {
                write!(f, "Invalid response from server: {detail}")
            }
            OperationError::Unexpected(kind) => write!(f, "Unexpected error: {kind}"),
        }
    }
}

impl StdError for OperationError {}

impl From<reqwest::Error> for OperationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OperationError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            OperationError::ConnectionFailure(root_cause(&err))
        } else if err.is_decode() {
            OperationError::MalformedResponse(root_cause(&err))
        } else {
            OperationError::Unexpected(UnexpectedKind::Request(root_cause(&err)))
        }
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        OperationError::MalformedResponse(err.to_string())
    }
}

impl From<tokio::task::JoinError> for OperationError {
    fn from(err: tokio::task::JoinError) -> Self {
        OperationError::Unexpected(UnexpectedKind::Task(err.to_string()))
    }
}

// reqwest's top-level message is generic ("error sending request for url");
// the innermost source names the actual cause (refused, dns, reset).
fn root_cause(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
