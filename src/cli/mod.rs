// src/cli/mod.rs — CLI definition (clap derive)

pub mod info;
pub mod progress;
pub mod review;
pub mod run;
pub mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::core::types::{CritiqueFocus, DocKind, SessionStatus};
use crate::integrations::telegram::TelegramChannel;
use crate::integrations::types::{FeedbackChannel, LogChannel};

pub const EXIT_OK: i32 = 0;
pub const EXIT_AWAITING_REVIEW: i32 = 2;
pub const EXIT_FAILED: i32 = 3;

#[derive(Parser)]
#[command(
    name = "adversarial-spec",
    about = "Refine a PRD or tech spec through an adversarial multi-model debate",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Suppress progress output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a debate over a seed document
    Start(StartArgs),
    /// Continue an interrupted or re-opened session
    Resume {
        session: String,
    },
    /// Resolve a session awaiting human review
    Review(ReviewArgs),
    /// Abort a session; it becomes failed and is never called again
    Abort {
        session: String,
    },
    /// List sessions, most recent first
    Sessions,
    /// Move a session into the archive
    Archive {
        session: String,
    },
    /// Show the cost ledger of a session
    Cost {
        session: String,
    },
    /// Write the current document of a session to disk
    Export {
        session: String,
        /// Output path (defaults to a versioned file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List built-in personas
    Personas,
    /// List critique focus areas
    FocusAreas,
    /// List providers and whether their API keys are set
    Providers,
}

#[derive(Args, Clone)]
pub struct StartArgs {
    /// Seed document path
    pub doc: PathBuf,

    /// Document kind: prd or tech (defaults to config)
    #[arg(long)]
    pub kind: Option<DocKind>,

    /// Round budget
    #[arg(short, long)]
    pub rounds: Option<u32>,

    /// Rounds before an agreement is accepted without pressing the arbiter
    #[arg(long)]
    pub min_rounds: Option<u32>,

    /// Critique focus for opponents without one
    #[arg(long)]
    pub focus: Option<CritiqueFocus>,

    /// Persona for opponents without one
    #[arg(long)]
    pub persona: Option<String>,

    /// Ask participants to keep the author's original intent
    #[arg(long)]
    pub preserve_intent: bool,

    /// Finish on convergence without human review
    #[arg(long)]
    pub no_review: bool,

    /// Extra context appended to every prompt
    #[arg(long)]
    pub context: Option<String>,

    /// Call opponents one at a time
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Args, Clone)]
#[command(group(ArgGroup::new("decision").required(true).multiple(false)))]
pub struct ReviewArgs {
    pub session: String,

    /// Accept the current document
    #[arg(long, group = "decision")]
    pub approve: bool,

    /// Send the debate back with this feedback
    #[arg(long, group = "decision", value_name = "FEEDBACK")]
    pub request_changes: Option<String>,

    /// Wait for the decision on the configured feedback channel
    #[arg(long, group = "decision")]
    pub wait: bool,
}

/// Exit code for a session's status after a command.
pub fn exit_code(status: SessionStatus) -> i32 {
    match status {
        SessionStatus::Completed | SessionStatus::Converged => EXIT_OK,
        SessionStatus::AwaitingReview => EXIT_AWAITING_REVIEW,
        // Active after a run means the last round was aborted.
        SessionStatus::Active | SessionStatus::Failed => EXIT_FAILED,
    }
}

/// Telegram when configured, otherwise log-only.
pub fn feedback_channel() -> Arc<dyn FeedbackChannel> {
    match TelegramChannel::from_env() {
        Some(channel) => Arc::new(channel),
        None => Arc::new(LogChannel),
    }
}
