// tests/common/mod.rs — Scripted mock transport shared by integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use adversarial_spec::core::session::{Session, SessionSettings};
use adversarial_spec::core::types::{CritiqueFocus, DocKind, Document, Participant, Role};
use adversarial_spec::infra::errors::DebateError;
use adversarial_spec::provider::retry::Sleeper;
use adversarial_spec::provider::{
    ModelRef, ModelTransport, StopReason, TokenUsage, TransportReply, TransportRequest,
};

pub const SEED: &str = "# Payments API\n\nAccept card payments over HTTPS.";

/// One scripted reaction to a call.
pub enum Step {
    Reply { text: String, input_tokens: u32 },
    Delayed { ms: u64, text: String },
    RateLimited,
    Down,
}

pub fn say(text: &str) -> Step {
    Step::Reply {
        text: text.to_string(),
        input_tokens: 100,
    }
}

pub fn say_tokens(text: &str, input_tokens: u32) -> Step {
    Step::Reply {
        text: text.to_string(),
        input_tokens,
    }
}

pub fn spec(body: &str) -> String {
    format!("Revised per the critiques.\n[SPEC]\n{body}\n[/SPEC]")
}

pub fn agree(reason: &str) -> String {
    format!("[AGREE]\n{reason}")
}

pub fn disagree(reason: &str, change: &str) -> String {
    format!("{reason}\nCHANGES:\n- {change}")
}

/// Replies are looked up by model name, one queue per model.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), steps.into_iter().collect());
        self
    }

    /// Models called so far, in call order.
    pub fn called_models(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Prompts sent to `model`, in call order.
    pub fn prompts_for(&self, model: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

fn reply(text: String, input_tokens: u32) -> TransportReply {
    TransportReply {
        text,
        usage: TokenUsage::new(input_tokens, 10),
        stop_reason: StopReason::EndTurn,
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn id(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportReply, DebateError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.model.clone(), request.prompt.clone()));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.model)
            .and_then(|q| q.pop_front());

        match step {
            Some(Step::Reply { text, input_tokens }) => Ok(reply(text, input_tokens)),
            Some(Step::Delayed { ms, text }) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(reply(text, 100))
            }
            Some(Step::RateLimited) => Err(DebateError::RateLimited {
                provider: "mock".into(),
                retry_after_ms: 0,
            }),
            Some(Step::Down) => Err(DebateError::Transport {
                provider: "mock".into(),
                message: "HTTP 503".into(),
                retriable: true,
            }),
            None => Err(DebateError::Transport {
                provider: "mock".into(),
                message: format!("script for {} exhausted", request.model),
                retriable: false,
            }),
        }
    }
}

/// Records requested delays without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn model(name: &str) -> ModelRef {
    ModelRef::new("mock", name)
}

pub fn participants() -> Vec<Participant> {
    vec![
        Participant::new(Role::Proposer, model("proposer")),
        Participant::new(Role::Opponent(1), model("opp-1")).with_focus(CritiqueFocus::Security),
        Participant::new(Role::Opponent(2), model("opp-2")).with_persona("oncall-engineer"),
        Participant::new(Role::Arbiter, model("arbiter")),
    ]
}

pub fn settings(max_rounds: u32, min_rounds: u32, review_enabled: bool) -> SessionSettings {
    SessionSettings {
        max_rounds,
        min_rounds,
        review_enabled,
        ..Default::default()
    }
}

pub fn session(settings: SessionSettings) -> Session {
    Session::new(
        Document::new(DocKind::TechSpec, SEED),
        participants(),
        settings,
    )
}

pub fn transport_arc(t: &Arc<ScriptedTransport>) -> Arc<dyn ModelTransport> {
    t.clone()
}
