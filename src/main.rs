use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shuttle_load::{
    config::{LoadTestConfig, DEFAULT_REPORT_FILE},
    report::generate_html_report,
    runner,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Concurrent HTTP load generator
#[derive(Parser, Debug)]
#[command(name = "shuttle-load", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load test (the default when no subcommand is given)
    Run(RunArgs),
    /// Render an HTML report from a results file
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Target URL
    #[arg(long)]
    url: Option<String>,

    /// Number of virtual users
    #[arg(short = 'c', long)]
    users: Option<usize>,

    /// Seconds each virtual user runs
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Launch users in this many batches
    #[arg(long, value_name = "STEPS")]
    ramp_up_steps: Option<usize>,

    /// Throughput bucket width in seconds
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Where to write the JSON results
    #[arg(long, value_name = "FILE")]
    results: Option<PathBuf>,

    /// Where to write the HTML report
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Open the HTML report when the run ends
    #[arg(long)]
    open: bool,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Results file written by a previous run
    results: PathBuf,

    /// Output HTML file
    #[arg(short, long, default_value = DEFAULT_REPORT_FILE)]
    output: PathBuf,
}

impl RunArgs {
    fn into_config(self) -> Result<LoadTestConfig> {
        let mut config = match &self.config {
            Some(path) => LoadTestConfig::from_file(path)?,
            None => LoadTestConfig::default(),
        };
        if let Some(url) = self.url {
            config.target_url = url;
        }
        if let Some(users) = self.users {
            config.concurrent_users = users;
        }
        if let Some(duration) = self.duration {
            config.test_duration_seconds = duration;
        }
        if let Some(timeout) = self.timeout_ms {
            config.request_timeout = timeout;
        }
        if let Some(steps) = self.ramp_up_steps {
            config.use_ramp_up = true;
            config.ramp_up_steps = steps;
        }
        if let Some(interval) = self.interval {
            config.tracking_interval_seconds = interval;
        }
        if let Some(results) = self.results {
            config.results_file = results;
        }
        if let Some(report) = self.report {
            config.report_file = report;
        }
        config.open_browser_after_test |= self.open;
        Ok(config)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.into_config()?;
    config.validate().context("invalid configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping virtual users and keeping partial results");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!(
        "Load testing {} with {} users for {}s",
        config.target_url,
        config.concurrent_users,
        config.test_duration_seconds
    );
    let metrics = runner::run_load_test(&config, Some(shutdown_rx)).await?;
    runner::publish(&config, &metrics).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(args).await,
        Command::Report(args) => {
            if generate_html_report(&args.results, &args.output)
                .await
                .is_none()
            {
                bail!("no report written to {}", args.output.display());
            }
            Ok(())
        }
    }
}
