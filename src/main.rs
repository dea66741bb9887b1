mod cli;
mod core;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use crate::cli::output::{detect_color, OutputFormat, OutputOptions};
use crate::cli::progress::LogWriter;
use crate::cli::usage_cmd::UsageArgs;
use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "oaiu",
    about = "Fetch OpenAI token usage between two dates and summarize it per model snapshot",
    version
)]
struct Cli {
    /// First day to fetch (inclusive)
    start_date: String,

    /// Last day to fetch (inclusive)
    end_date: String,

    /// Date format of START_DATE and END_DATE [default: %Y-%m-%d]
    #[arg(short, long)]
    encoding: Option<String>,

    /// OpenAI organization id (falls back to the config file)
    #[arg(short, long)]
    org: Option<String>,

    /// Also write a CSV file with per-day usage
    #[arg(short, long)]
    csv: bool,

    /// Seconds to wait after each request [default: 2.5]
    #[arg(long)]
    rate: Option<f64>,

    /// Seconds to wait after a 429 before retrying [default: 10]
    #[arg(long = "rate_limit_wait", alias = "rate-limit-wait")]
    rate_limit_wait: Option<f64>,

    /// Give up on a day after this many 429 retries, 0 to retry forever [default: 20]
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-request timeout in seconds [default: 60]
    #[arg(long)]
    timeout: Option<f64>,

    /// Directory the CSV file is written to [default: current directory]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print the report as JSON instead of a table
    #[arg(short = 'j', long = "json")]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(LogWriter)
        .with_target(false)
        .init();

    let config_path = AppConfig::config_path();
    let config = AppConfig::load()
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let output_opts = OutputOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        pretty: cli.pretty,
        use_color: detect_color(&config.settings.color, cli.no_color),
    };

    let args = UsageArgs {
        start_date: cli.start_date,
        end_date: cli.end_date,
        encoding: cli.encoding,
        org: cli.org,
        csv: cli.csv,
        rate: cli.rate,
        rate_limit_wait: cli.rate_limit_wait,
        max_retries: cli.max_retries,
        timeout: cli.timeout,
        output_dir: cli.output_dir,
    };

    cli::usage_cmd::run(args, &config, &output_opts).await
}
