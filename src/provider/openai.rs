// src/provider/openai.rs — OpenAI Chat Completions transport
//
// Also serves OpenAI-compatible endpoints (Groq, OpenRouter, DeepSeek, xAI,
// a self-hosted gateway) under their own provider id.

use async_trait::async_trait;

use super::{ModelTransport, StopReason, TokenUsage, TransportReply, TransportRequest};
use crate::infra::errors::DebateError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAITransport {
    id: String,
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAITransport {
    pub fn new(api_key: String) -> Self {
        Self::compatible("openai", api_key, OPENAI_BASE_URL.into())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self::compatible("openai", api_key, base_url)
    }

    /// An OpenAI-compatible endpoint registered under its own provider id.
    pub fn compatible(id: &str, api_key: String, base_url: String) -> Self {
        Self {
            id: id.to_string(),
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &TransportRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
        });
        // Reasoning models reject `max_tokens`.
        let key = if self.id == "openai" && is_reasoning_model(&request.model) {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body[key] = serde_json::json!(request.max_tokens);
        body
    }
}

fn is_reasoning_model(model: &str) -> bool {
    let mut chars = model.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

#[async_trait]
impl ModelTransport for OpenAITransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportReply, DebateError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| super::request_error(&self.id, &e))?;

        let response = super::check_status(&self.id, response).await?;

        let resp: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| DebateError::Transport {
                    provider: self.id.clone(),
                    message: format!("Failed to parse response: {}", e),
                    retriable: false,
                })?;

        Ok(parse_response(&resp))
    }
}

fn parse_response(resp: &serde_json::Value) -> TransportReply {
    let choice = &resp["choices"][0];
    let text = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
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

    fn request(model: &str) -> TransportRequest {
        TransportRequest {
            model: model.into(),
            system: Some("sys".into()),
            prompt: "hi".into(),
            max_tokens: 512,
        }
    }

    #[test]
    fn test_body_has_system_then_user() {
        let body = OpenAITransport::new("k".into()).build_request_body(&request("gpt-4.1"));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_reasoning_models_use_completion_tokens() {
        let body = OpenAITransport::new("k".into()).build_request_body(&request("o3-mini"));
        assert_eq!(body["max_completion_tokens"], 512);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_compatible_keeps_max_tokens() {
        let t = OpenAITransport::compatible("groq", "k".into(), "https://api.groq.com/openai/v1/".into());
        assert_eq!(t.id(), "groq");
        assert_eq!(t.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(t.build_request_body(&request("o1-preview"))["max_tokens"], 512);
    }

    #[test]
    fn test_parse_length_is_truncation() {
        let resp = serde_json::json!({
            "choices": [{ "message": { "content": "half" }, "finish_reason": "length" }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 512 }
        });
        let reply = parse_response(&resp);
        assert_eq!(reply.stop_reason, StopReason::MaxTokens);
        assert_eq!(reply.usage, TokenUsage::new(5, 512));
    }
}
