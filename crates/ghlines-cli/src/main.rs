//! ghlines - expand code-host line permalinks into snippets.
//!
//! Reads a chat message from the command line (or stdin), resolves every
//! line permalink in it and prints the result as fenced markdown or as the
//! raw JSON `MessageResult`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ghlines_core::Resolver;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod render;

use config::Config;
use render::{render, Reply};

/// Exit code used when the display limits refuse the output.
const EXIT_REFUSED: u8 = 2;

/// Expand GitHub, GitLab and Gist line permalinks into code snippets
#[derive(Parser)]
#[command(name = "ghlines")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Message text to scan (read from stdin when omitted)
    text: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Markdown)]
    format: Format,

    /// Refuse to print more than this many lines in total
    #[arg(long)]
    max_lines: Option<u64>,

    /// Refuse to print output of this many characters or more
    #[arg(long)]
    max_chars: Option<usize>,

    /// Strip indentation common to all displayed lines
    #[arg(long)]
    dedent: bool,

    /// Ignore links inside markdown code spans and fences
    #[arg(long)]
    skip_code: bool,

    /// Per-file fetch timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// The resolver's JSON result, no display limits applied
    Json,
    /// Fenced code blocks ready to post in chat
    Markdown,
}

impl Cli {
    /// Fold command line flags over the loaded configuration.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(max_lines) = self.max_lines {
            config.limits.max_lines = max_lines;
        }
        if let Some(max_chars) = self.max_chars {
            config.limits.max_chars = max_chars;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.resolver.fetch_timeout_ms = timeout_ms;
        }
        config.resolver.dedent |= self.dedent;
        config.resolver.skip_code_spans |= self.skip_code;
        config
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn read_message(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read message from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    config.resolver = config.resolver.with_env_overrides();
    let config = cli.apply(config);

    let text = read_message(cli.text.clone()).await?;
    let resolver =
        Resolver::new(config.resolver.clone()).context("Failed to build the resolver")?;
    let result = resolver.handle_message(&text).await;
    tracing::debug!(
        entries = result.msg_list.len(),
        total_lines = result.total_lines,
        "Message resolved"
    );

    match cli.format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Format::Markdown => match render(&result, &config.limits) {
            Reply::Nothing => Ok(ExitCode::SUCCESS),
            Reply::Snippets(body) => {
                println!("{body}");
                Ok(ExitCode::SUCCESS)
            }
            Reply::Refused(notice) => {
                println!("{notice}");
                Ok(ExitCode::from(EXIT_REFUSED))
            }
        },
    }
}
