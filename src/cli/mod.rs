//! Command-line interface for cfg-load
//!
//! Loads one configuration file and pretty-prints the resulting tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cfg_load::config::pretty_json;
use cfg_load::{ConfigNode, Loaded, Loader};
use clap::{Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Load a YAML, JSON or INI configuration file and print it
#[derive(Parser)]
#[command(name = "cfg-load")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.yaml, .yml, .json or .ini)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Only parse the file; skip path resolution, env overlay, modules and remotes
    #[arg(long)]
    raw: bool,

    /// Do not fetch `*_load_url` resources
    #[arg(long)]
    no_remote: bool,

    /// Print source file and parse time before the values
    #[arg(long)]
    meta: bool,

    /// Spaces per indentation level
    #[arg(long, default_value_t = 4)]
    indent: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let loaded = Loader::new()
        .raw(cli.raw)
        .load_remote(!cli.no_remote)
        .load(&cli.file)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;

    println!("{}", render(&cli, loaded)?);
    Ok(())
}

fn render(cli: &Cli, loaded: Loaded) -> Result<String> {
    if cli.raw && cli.meta {
        tracing::warn!("--meta has no effect together with --raw");
    }

    let header = match (&loaded, cli.meta) {
        (Loaded::Config(cfg), true) => Some(cfg.meta_header()),
        _ => None,
    };

    let body = match cli.format {
        OutputFormat::Json => match &loaded {
            Loaded::Config(cfg) => cfg.pformat(cli.indent, false),
            Loaded::Raw(node) => pretty_json(node, cli.indent),
        }
        .context("Failed to render configuration as JSON")?,
        OutputFormat::Yaml => {
            let node = loaded.into_node();
            render_yaml(&node)?
        }
    };

    Ok(match header {
        Some(header) => format!("{header}\n{}", body.trim_end()),
        None => body.trim_end().to_string(),
    })
}

fn render_yaml(node: &ConfigNode) -> Result<String> {
    serde_yaml::to_string(node).context("Failed to render configuration as YAML")
}
