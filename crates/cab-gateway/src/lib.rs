//! Model gateway adapter (OpenAI-compatible chat completions).
//!
//! Implements the `cab-core` ModelClient port over an AI gateway that
//! speaks the chat-completions wire format. One shared HTTP client serves
//! every credential; the rotated key is applied per request as a bearer
//! token, never baked into the client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use cab_core::{
    domain::ApiKey,
    errors::Error,
    model::{ChatMessage, Completion, CompletionRequest, ModelClient},
    Result,
};

#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(serde::Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("cab/0.1")
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for GatewayClient {
    async fn complete(&self, key: &ApiKey, req: CompletionRequest) -> Result<Completion> {
        let payload = WireRequest {
            model: &req.model,
            messages: &req.messages,
        };

        let resp = self
            .http
            .post(self.completions_url())
            .bearer_auth(&key.secret)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if let Some(e) = classify_status(status) {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = %status, key = key.index, body = %snippet(&body), "gateway rejected request");
            return Err(e);
        }

        let wire: WireResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("gateway json error: {e}")))?;

        parse_completion(wire)
    }
}

fn map_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Upstream(format!("gateway request error: {e}"))
    }
}

/// Map a non-2xx status to the core taxonomy; `None` means success.
fn classify_status(status: StatusCode) -> Option<Error> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthRejected,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout,
        _ => Error::Upstream(format!("gateway returned {status}")),
    })
}

fn parse_completion(wire: WireResponse) -> Result<Completion> {
    let text = wire
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(Error::Upstream(
            "gateway returned an empty completion".to_string(),
        ));
    }

    // Missing usage means we charge nothing rather than guessing.
    let (input_tokens, output_tokens) = match wire.usage {
        Some(u) => (u.prompt_tokens, u.completion_tokens),
        None => (0, 0),
    };

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_matches_the_error_taxonomy() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(Error::RateLimited)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(Error::AuthRejected)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Some(Error::AuthRejected)
        ));
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT),
            Some(Error::Timeout)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(Error::Upstream(_))
        ));
    }

    #[test]
    fn parses_a_standard_completion_payload() {
        let wire: WireResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "  hello there  "}}],
                "usage": {"prompt_tokens": 120, "completion_tokens": 45}
            }"#,
        )
        .unwrap();

        let c = parse_completion(wire).unwrap();
        assert_eq!(c.text, "hello there");
        assert_eq!(c.input_tokens, 120);
        assert_eq!(c.output_tokens, 45);
    }

    #[test]
    fn missing_usage_charges_zero_tokens() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "ok"}}]}"#,
        )
        .unwrap();

        let c = parse_completion(wire).unwrap();
        assert_eq!((c.input_tokens, c.output_tokens), (0, 0));
    }

    #[test]
    fn empty_content_is_an_upstream_error() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap();
        assert!(matches!(parse_completion(wire), Err(Error::Upstream(_))));

        let wire: WireResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parse_completion(wire), Err(Error::Upstream(_))));
    }

    #[test]
    fn completions_url_handles_trailing_slash() {
        let c = GatewayClient::new("https://gw.example/v1/", std::time::Duration::from_secs(5));
        assert_eq!(c.completions_url(), "https://gw.example/v1/chat/completions");
    }
}
