use anyhow::Result;
use clap::Parser;

use gamegen::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    gamegen::init_logging(cli.verbose);
    gamegen::run(cli)
}
