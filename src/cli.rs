use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gamegen")]
#[command(about = "Generate single-page HTML5 games with a developer agent and a QA agent", long_about = None)]
pub struct Cli {
    /// Config file to use (defaults to ./gamegen.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default gamegen.toml to the current directory
    Init,

    /// Generate a game from a description
    Generate {
        /// What the game should be. Prompted for when omitted.
        description: Option<String>,

        /// Where to write the accepted game (overrides the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Open the accepted game in the default browser
        #[arg(long)]
        open: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recorded sessions and their runs
    History {
        /// Show the runs of one session (full key or hash prefix)
        #[arg(long)]
        session: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the agent roles sent to the model
    Prompts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
