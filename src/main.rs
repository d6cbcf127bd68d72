// src/main.rs — adversarial-spec entry point

use clap::Parser;

use adversarial_spec::cli::{self, Cli, Commands, EXIT_FAILED};
use adversarial_spec::infra::config::Config;
use adversarial_spec::infra::logger;
use adversarial_spec::infra::store::SessionStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(EXIT_FAILED);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // Falls back to defaults if no config.toml
    let config = match cli.config {
        Some(ref path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load()?,
    };
    let store = SessionStore::open_default();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Start(args) => cli::run::run_start(config, args, store, quiet).await,
        Commands::Resume { session } => cli::run::run_resume(config, &session, store, quiet).await,
        Commands::Review(args) => cli::review::run_review(config, args, store, quiet).await,
        Commands::Abort { session } => cli::review::run_abort(&session, store),
        Commands::Sessions => cli::sessions::run_sessions(&store),
        Commands::Archive { session } => cli::sessions::run_archive(&session, &store),
        Commands::Cost { session } => cli::sessions::run_cost(&session, &store),
        Commands::Export { session, output } => cli::sessions::run_export(&session, output, &store),
        Commands::Personas => cli::info::run_personas(),
        Commands::FocusAreas => cli::info::run_focus_areas(),
        Commands::Providers => cli::info::run_providers(),
    }
}
