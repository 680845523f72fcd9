#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod agent;
pub mod artifact;
pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod store;

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use agent::chat::ChatModel;
use artifact::ArtifactSink;
use cli::{Cli, Commands};
use config::Config;
use output::Output;
use pipeline::Pipeline;
use store::{SessionStore, session_key};

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "info,gamegen=debug"
    } else {
        "warn,gamegen=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_generate(
    config: &Config,
    description: Option<String>,
    output: Option<std::path::PathBuf>,
    open: bool,
    json: bool,
) -> Result<()> {
    let description = match description {
        Some(description) => description,
        None => commands::generate::prompt_description(&config.prompt.default_description)?,
    };

    let model = ChatModel::from_config(&config.model)?;
    let sink = ArtifactSink::new(output.unwrap_or_else(|| config.output.path.clone()));
    let pipeline = Pipeline::new(model, sink);
    let mut store = SessionStore::open_session(&config.sessions.dir, &session_key(&description))?;

    let report = commands::generate::run(&description, &pipeline, &mut store)?;
    Output::new(json).generated(&report)?;

    if open && report.outcome.is_accepted() && pipeline.sink().exists() {
        if let Err(e) = browser::open(pipeline.sink().path()) {
            warn!(error = %e, "Could not open the game in a browser");
        }
    }
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => {
            let dir = std::env::current_dir()?;
            let created = commands::init::run(&dir)?;
            Output::new(false).config_written(&dir.join(config::CONFIG_FILE), created)
        }
        Commands::Generate {
            description,
            output,
            open,
            json,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            run_generate(&config, description, output, open, json)
        }
        Commands::History { session, json } => {
            let config = Config::load(cli.config.as_deref())?;
            let store = SessionStore::open(&config.sessions.dir)?;
            let result = commands::history::run(session, &store)?;
            Output::new(json).history(&result)
        }
        Commands::Prompts { json } => {
            let roles = commands::prompts::run();
            Output::new(json).roles(&roles)
        }
    }
}
