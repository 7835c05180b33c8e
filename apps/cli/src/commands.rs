//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use nbcolab_core::{BatchReport, ConvertOutcome, Converter, ProgressReporter, convert_dir};
use nbcolab_shared::{AppConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nbcolab: turn book notebooks into Colab notebooks.
#[derive(Parser)]
#[command(
    name = "nbcolab",
    version,
    about = "Turn authored book notebooks into Colab-compatible notebooks.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.nbcolab/nbcolab.toml.
    #[arg(long, env = "NBCOLAB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the raw-content URL static asset links are rooted at.
    #[arg(long, global = true)]
    pub raw_base_url: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert one notebook.
    Convert {
        /// Authored notebook to read.
        src: PathBuf,

        /// Where to write the Colab notebook.
        dest: PathBuf,
    },

    /// Convert every notebook under a directory, mirroring its layout.
    Batch {
        /// Directory searched recursively for `.ipynb` files.
        src_dir: PathBuf,

        /// Output root for the converted notebooks.
        out_dir: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nbcolab=info",
        1 => "nbcolab=debug",
        _ => "nbcolab=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Convert { src, dest } => cmd_convert(&cli, src, dest),
        Command::Batch { src_dir, out_dir } => cmd_batch(&cli, src_dir, out_dir),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

/// Defaults, then the config file, then CLI flags.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(url) = &cli.raw_base_url {
        config.assets.raw_base_url = url.clone();
    }
    Ok(config)
}

fn cmd_convert(cli: &Cli, src: &Path, dest: &Path) -> Result<()> {
    let config = resolve_config(cli)?;
    let converter = Converter::from_config(&config)?;

    match converter.convert_file(src, dest)? {
        ConvertOutcome::Skipped => {
            let name = src.file_name().unwrap_or_default().to_string_lossy();
            println!("Skipping excluded file: {name}");
        }
        ConvertOutcome::Converted(report) => {
            println!(
                "{} -> {} ({} cells, {} removed, {} cleared{})",
                src.display(),
                dest.display(),
                report.cells_out,
                report.removed,
                report.cleared,
                if report.uses_viz { ", visualization note added" } else { "" },
            );
        }
    }

    Ok(())
}

fn cmd_batch(cli: &Cli, src_dir: &Path, out_dir: &Path) -> Result<()> {
    let config = resolve_config(cli)?;
    let converter = Converter::from_config(&config)?;

    info!(src = %src_dir.display(), out = %out_dir.display(), "converting directory");

    let reporter = CliProgress::new();
    let report = convert_dir(src_dir, out_dir, &converter, &reporter)?;

    println!();
    println!("  Converted: {}", report.converted.len());
    println!("  Skipped:   {}", report.skipped.len());
    println!("  Failed:    {}", report.failed.len());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    for (path, error) in &report.failed {
        println!("  ✗ {}: {error}", path.display());
    }
    println!();

    if !report.is_success() {
        return Err(eyre!("{} notebook(s) failed to convert", report.failed.len()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn notebook_done(&self, path: &Path, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
        self.bar.set_message(path.display().to_string());
    }

    fn done(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
