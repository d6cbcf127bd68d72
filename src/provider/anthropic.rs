// src/provider/anthropic.rs — Anthropic Messages API transport

use async_trait::async_trait;

use super::{ModelTransport, StopReason, TokenUsage, TransportReply, TransportRequest};
use crate::infra::errors::DebateError;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicTransport {
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicTransport {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn build_request_body(&self, request: &TransportRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }
        body
    }
}

#[async_trait]
impl ModelTransport for AnthropicTransport {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportReply, DebateError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| super::request_error("anthropic", &e))?;

        let response = super::check_status("anthropic", response).await?;

        let resp: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| DebateError::Transport {
                    provider: "anthropic".into(),
                    message: format!("Failed to parse response: {}", e),
                    retriable: false,
                })?;

        Ok(parse_response(&resp))
    }
}

fn parse_response(resp: &serde_json::Value) -> TransportReply {
    let text = resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|c| c["type"] == "text")
                .filter_map(|c| c["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match resp["stop_reason"].as_str() {
        Some("end_turn") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::Unknown,
    };

    TransportReply {
        text,
        usage,
        stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body() {
        let t = AnthropicTransport::new("k".into());
        let body = t.build_request_body(&TransportRequest {
            model: "claude-sonnet-4".into(),
            system: Some("be rigorous".into()),
            prompt: "review this".into(),
            max_tokens: 1024,
        });
        assert_eq!(body["model"], "claude-sonnet-4");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["system"], "be rigorous");
        assert_eq!(body["messages"][0]["content"], "review this");
    }

    #[test]
    fn test_parse_response() {
        let resp = serde_json::json!({
            "content": [
                { "type": "text", "text": "[AGREE]\n" },
                { "type": "text", "text": "Looks complete." }
            ],
            "usage": { "input_tokens": 1200, "output_tokens": 40 },
            "stop_reason": "end_turn"
        });
        let reply = parse_response(&resp);
        assert_eq!(reply.text, "[AGREE]\nLooks complete.");
        assert_eq!(reply.usage, TokenUsage::new(1200, 40));
        assert_eq!(reply.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_truncated_response() {
        let resp = serde_json::json!({
            "content": [{ "type": "text", "text": "partial" }],
            "usage": { "input_tokens": 10, "output_tokens": 100 },
            "stop_reason": "max_tokens"
        });
        assert_eq!(parse_response(&resp).stop_reason, StopReason::MaxTokens);
    }
}
