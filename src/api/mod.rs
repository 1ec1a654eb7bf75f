//! Request and response payloads for the model server's HTTP API.

use serde::{Deserialize, Serialize};

pub const CHAT_ENDPOINT: &str = "api/chat";
pub const TAGS_ENDPOINT: &str = "api/tags";
pub const PULL_ENDPOINT: &str = "api/pull";
pub const DELETE_ENDPOINT: &str = "api/delete";

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// One line of a streamed chat response. The final line carries `done`
/// and usually no message.
#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub done: bool,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct ModelsResponse {
    pub models: Option<Vec<ModelInfo>>,
}

#[derive(Serialize, Debug)]
pub struct PullRequest {
    pub name: String,
    pub insecure: bool,
    pub stream: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct PullResponse {
    pub status: Option<String>,
    pub error: Option<String>,
    pub total: Option<u64>,
    pub completed: Option<u64>,
}

#[derive(Serialize, Debug)]
pub struct DeleteRequest {
    pub name: String,
}

pub mod models;
