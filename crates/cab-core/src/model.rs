use async_trait::async_trait;
use serde::Serialize;

use crate::{domain::ApiKey, Result};

/// Wire-level message role for the chat-completions payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message of model context.
#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A single completion request: ordered context plus the model slug.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A successful completion with the token counts the gateway reported.
///
/// Missing usage on the wire maps to zero tokens, which charges nothing.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Port for the hosted model gateway.
///
/// Implementations authenticate each call with the credential the
/// dispatcher rotated to; they must not cache or pin a key. Failures map
/// into the core error taxonomy (`RateLimited`, `AuthRejected`, `Timeout`,
/// `Upstream`).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, key: &ApiKey, req: CompletionRequest) -> Result<Completion>;
}
