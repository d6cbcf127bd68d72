// src/provider/gateway.rs — Uniform call interface over heterogeneous providers
//
// One `invoke` per participant turn: resolves the participant's transport,
// retries transport/rate failures with backoff, validates the reply shape and
// prices the call. The gateway holds no per-session state; retry counters live
// on each call. Cost is returned on the `CallResult` and committed to the
// session ledger by the engine together with the round. A reply that fails
// validation was still delivered, so it travels on the error as `billed`.

use std::collections::HashMap;
use std::sync::Arc;

use super::pricing::PriceTable;
use super::retry::{with_retry, CancelFlag, RetryConfig, Sleeper, TokioSleeper};
use super::{ModelRef, ModelTransport, StopReason, TokenUsage, TransportRequest};
use crate::core::prompts::Prompt;
use crate::core::types::{Participant, Role};
use crate::infra::errors::DebateError;

/// A validated, priced reply from one participant.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub role: Role,
    pub model: ModelRef,
    pub text: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub attempts: u32,
}

pub struct ModelGateway {
    transports: HashMap<String, Arc<dyn ModelTransport>>,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    prices: PriceTable,
}

impl ModelGateway {
    pub fn new(transports: Vec<Arc<dyn ModelTransport>>) -> Self {
        Self {
            transports: transports
                .into_iter()
                .map(|t| (t.id().to_string(), t))
                .collect(),
            retry: RetryConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            prices: PriceTable::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn supports(&self, provider: &str) -> bool {
        self.transports.contains_key(provider)
    }

    pub async fn invoke(
        &self,
        participant: &Participant,
        prompt: &Prompt,
        max_tokens: u32,
        cancel: &CancelFlag,
    ) -> Result<CallResult, DebateError> {
        let model = &participant.model;
        let transport = self.transports.get(&model.provider).ok_or_else(|| {
            DebateError::Configuration(format!(
                "no transport registered for provider '{}'",
                model.provider
            ))
        })?;

        let request = TransportRequest {
            model: model.model.clone(),
            system: prompt.system.clone(),
            prompt: prompt.user.clone(),
            max_tokens,
        };

        let label = participant.role.to_string();
        let retried = with_retry(&self.retry, self.sleeper.as_ref(), cancel, &label, || {
            transport.send(request.clone())
        })
        .await?;

        let reply = retried.value;
        let cost_usd = self.prices.cost(model, &reply.usage);
        let call = CallResult {
            role: participant.role.clone(),
            model: model.clone(),
            text: reply.text,
            usage: reply.usage,
            cost_usd,
            attempts: retried.attempts,
        };

        if let Err(reason) = validate_reply(&call, reply.stop_reason, max_tokens) {
            tracing::warn!(role = %participant.role, model = %model, "Rejected reply: {}", reason);
            return Err(DebateError::MalformedResponse {
                participant: participant.role.to_string(),
                reason,
                billed: Some(Box::new(call)),
            });
        }

        tracing::debug!(
            role = %participant.role,
            model = %model,
            attempts = call.attempts,
            input_tokens = call.usage.input_tokens,
            output_tokens = call.usage.output_tokens,
            cost_usd,
            "Gateway call complete"
        );
        Ok(call)
    }
}

/// Shape checks only. Content that parses but says something unhelpful is the
/// engine's concern, and none of these failures are retried.
fn validate_reply(call: &CallResult, stop_reason: StopReason, max_tokens: u32) -> Result<(), String> {
    if call.text.trim().is_empty() {
        return Err("empty response".into());
    }
    if stop_reason == StopReason::MaxTokens {
        return Err("provider reported truncation at max_tokens".into());
    }
    if call.usage.output_tokens > max_tokens {
        return Err(format!(
            "completion used {} tokens, limit is {}",
            call.usage.output_tokens, max_tokens
        ));
    }
    Ok(())
}
