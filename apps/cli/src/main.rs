//! nbcolab CLI: turn authored book notebooks into Colab-ready notebooks.
//!
//! Strips exercise answers and build-only cells, swaps inline script
//! dependencies for `%pip install` lines, and roots static asset links at
//! the repository's raw-content URL.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
