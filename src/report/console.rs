use std::fmt::Write;

use super::Reporter;
use crate::{aggregate::Metrics, error::ReportError};

/// Prints a human-readable summary of the run to stdout.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    async fn report(&self, metrics: &Metrics) -> Result<(), ReportError> {
        println!("{}", render_summary(metrics));
        Ok(())
    }
}

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2} ms"))
}

/// Render the console summary, including the per-interval table in ascending
/// interval order.
pub fn render_summary(metrics: &Metrics) -> String {
    let has_latency = !metrics.latencies.is_empty();
    let stat = |v: f64| or_na(has_latency.then_some(v));
    let duration = metrics
        .elapsed()
        .map_or_else(|| "N/A".to_string(), |d| format!("{:.2}s", d.as_secs_f64()));
    let ramp_up = if metrics.use_ramp_up {
        format!("{} steps", metrics.ramp_up_steps)
    } else {
        "off".to_string()
    };

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "========== LOAD TEST RESULTS ==========");
    let _ = writeln!(out, "Target URL         : {}", metrics.target_url);
    let _ = writeln!(out, "Duration           : {duration}");
    let _ = writeln!(out, "Concurrent users   : {}", metrics.concurrent_users);
    let _ = writeln!(out, "Ramp-up            : {ramp_up}");
    let _ = writeln!(out, "Total requests     : {}", metrics.total_requests);
    let _ = writeln!(out, "Successful requests: {}", metrics.successful_requests);
    let _ = writeln!(
        out,
        "Failed requests    : {} ({} timeouts, {} transport errors)",
        metrics.failed_requests,
        metrics.timeouts(),
        metrics.transport_errors()
    );
    let _ = writeln!(out, "Requests/second    : {:.2}", metrics.requests_per_second);
    let _ = writeln!(out, "Average latency    : {}", stat(metrics.avg_latency));
    let _ = writeln!(out, "Min latency        : {}", or_na(metrics.min_latency));
    let _ = writeln!(out, "Max latency        : {}", or_na(metrics.max_latency));
    let _ = writeln!(out, "95th percentile    : {}", stat(metrics.p95_latency));
    let _ = writeln!(out, "99th percentile    : {}", stat(metrics.p99_latency));

    if !metrics.requests_per_interval.is_empty() {
        let _ = writeln!(out, "\nSuccessful requests per interval:");
        let _ = writeln!(out, "{:>10} | {:>10}", "start (s)", "requests");
        for (start, count) in &metrics.requests_per_interval {
            let _ = writeln!(out, "{start:>10} | {count:>10}");
        }
    }
    out
}
