//! A full run wired from a [`LoadTestConfig`]: drive the target, compute the
//! statistics, then publish the console summary, the results file and the
//! HTML report.

use tokio::sync::watch;

use crate::{
    aggregate::Metrics,
    browser::open_in_browser,
    config::LoadTestConfig,
    driver::RequestDriver,
    error::RunError,
    executor::{Executor, UserExecutor},
    report::{generate_html_report, ConsoleReporter, JsonFileReporter, Reporter},
    scenario::Scenario,
};

/// Execute the load test described by `config`.
///
/// Returns the finalized record. When `shutdown` flips to `true` the run stops
/// early and the partial record is returned all the same.
pub async fn run_load_test(
    config: &LoadTestConfig,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<Metrics, RunError> {
    config.validate()?;

    // One client for every user, so connections are pooled
    let driver = RequestDriver::connect(&config.target_url, config.request_timeout())?;
    let scenario = Scenario::builder()
        .name(format!("GET {}", driver.url()))
        .action(move || {
            let driver = driver.clone();
            async move { driver.send().await }
        })
        .build();

    let mut executor = UserExecutor::builder()
        .users(config.concurrent_users)
        .duration(config.test_duration())
        .ramp_up(config.ramp_up())
        .progress_interval(config.tracking_interval())
        .build();
    executor.shutdown = shutdown;

    let mut metrics = executor.exec(&scenario, Metrics::new(config)).await?;
    // Not-applicable statistics are already logged and zeroed
    let _ = metrics.finalize();
    Ok(metrics)
}

/// Print the summary and write the results and report files.
///
/// Each step is independent: a failure is logged and the remaining steps
/// still run.
pub async fn publish(config: &LoadTestConfig, metrics: &Metrics) {
    if let Err(e) = ConsoleReporter.report(metrics).await {
        tracing::error!("Could not print summary: {e}");
    }

    let json = JsonFileReporter::new(&config.results_file);
    if let Err(e) = json.report(metrics).await {
        tracing::error!("Could not write results file: {e}");
        return;
    }

    let Some(report) = generate_html_report(&config.results_file, &config.report_file).await
    else {
        return;
    };
    if config.open_browser_after_test {
        open_in_browser(&report).await;
    }
}
