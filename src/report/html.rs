//! Self-contained HTML report built from a results file.
//!
//! The page inlines all of its data and only pulls Chart.js from a CDN. It has
//! summary cards, a 10-bucket latency histogram spanning the observed
//! `[min, max]`, and a percentile line chart at fixed breakpoints.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::json::load_results;
use crate::{
    aggregate::Metrics,
    error::ReportError,
    stats::{percentile, sorted_copy},
};

pub const HISTOGRAM_BUCKETS: usize = 10;
pub const PERCENTILE_BREAKPOINTS: [u8; 8] = [0, 25, 50, 75, 90, 95, 99, 100];
const CHART_JS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Equal-width buckets over `[min, max]` of the series. The maximum lands
    /// in the last bucket. An empty series gives an empty histogram.
    pub fn new(latencies: &[f64], buckets: usize) -> Self {
        if latencies.is_empty() || buckets == 0 {
            return Self::default();
        }
        let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
        let max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = (max - min) / buckets as f64;

        let mut counts = vec![0u64; buckets];
        for &latency in latencies {
            let index = if width > 0.0 {
                ((latency - min) / width).floor() as usize
            } else {
                0
            };
            counts[index.min(buckets - 1)] += 1;
        }

        let decimals = label_decimals(width);
        let labels = (0..buckets)
            .map(|i| {
                let lo = min + width * i as f64;
                format!("{lo:.decimals$}-{:.decimals$}", lo + width)
            })
            .collect();
        Self { labels, counts }
    }
}

/// Enough decimals for adjacent bucket bounds to print differently.
fn label_decimals(width: f64) -> usize {
    match width {
        w if w >= 10.0 => 0,
        w if w >= 1.0 => 1,
        w if w >= 0.1 => 2,
        w if w > 0.0 => 3,
        // a single repeated latency
        _ => 2,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentilePoint {
    pub percentile: u8,
    pub latency: f64,
}

/// Everything the HTML page shows, derived from a results record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlReport {
    pub target_url: String,
    pub concurrent_users: usize,
    pub ramp_up_steps: Option<usize>,
    pub duration_seconds: Option<f64>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub requests_per_second: f64,
    pub avg_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub p95_latency: f64,
    pub p99_latency: f64,
    pub histogram: Histogram,
    pub percentiles: Vec<PercentilePoint>,
}

impl From<&Metrics> for HtmlReport {
    fn from(metrics: &Metrics) -> Self {
        let sorted = sorted_copy(&metrics.latencies);
        let percentiles = PERCENTILE_BREAKPOINTS
            .iter()
            .map(|&p| PercentilePoint {
                percentile: p,
                latency: percentile(&sorted, p as f64),
            })
            .collect();
        let success_rate = if metrics.total_requests > 0 {
            metrics.successful_requests as f64 / metrics.total_requests as f64 * 100.0
        } else {
            0.0
        };

        Self {
            target_url: metrics.target_url.clone(),
            concurrent_users: metrics.concurrent_users,
            ramp_up_steps: metrics.use_ramp_up.then_some(metrics.ramp_up_steps),
            duration_seconds: metrics.elapsed().map(|d| d.as_secs_f64()),
            total_requests: metrics.total_requests,
            successful_requests: metrics.successful_requests,
            failed_requests: metrics.failed_requests,
            success_rate,
            requests_per_second: metrics.requests_per_second,
            avg_latency: metrics.avg_latency,
            min_latency: metrics.min_latency.unwrap_or(0.0),
            max_latency: metrics.max_latency.unwrap_or(0.0),
            p95_latency: metrics.p95_latency,
            p99_latency: metrics.p99_latency,
            histogram: Histogram::new(&metrics.latencies, HISTOGRAM_BUCKETS),
            percentiles,
        }
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// JSON safe to drop inside a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String, ReportError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

impl HtmlReport {
    fn card(label: &str, value: String) -> String {
        format!(
            r#"<div class="card"><div class="label">{label}</div><div class="value">{value}</div></div>"#
        )
    }

    pub fn render(&self) -> Result<String, ReportError> {
        let cards = [
            Self::card("Total requests", self.total_requests.to_string()),
            Self::card("Successful", self.successful_requests.to_string()),
            Self::card("Failed", self.failed_requests.to_string()),
            Self::card("Success rate", format!("{:.2}%", self.success_rate)),
            Self::card("Requests/sec", format!("{:.2}", self.requests_per_second)),
            Self::card("Avg latency", format!("{:.2} ms", self.avg_latency)),
            Self::card("Min latency", format!("{:.2} ms", self.min_latency)),
            Self::card("Max latency", format!("{:.2} ms", self.max_latency)),
            Self::card("p95 latency", format!("{:.2} ms", self.p95_latency)),
            Self::card("p99 latency", format!("{:.2} ms", self.p99_latency)),
        ]
        .join("\n      ");

        let duration = self
            .duration_seconds
            .map_or_else(|| "N/A".to_string(), |d| format!("{d:.1}s"));
        let ramp_up = self
            .ramp_up_steps
            .map_or_else(|| "off".to_string(), |s| format!("{s} steps"));
        let histogram = script_json(&self.histogram)?;
        let percentiles = script_json(&self.percentiles)?;

        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Load Test Report</title>
  <script src="{CHART_JS_CDN}"></script>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 2rem; background: #f5f6f8; color: #222; }}
    .meta {{ color: #555; margin-bottom: 1.5rem; }}
    .cards {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(170px, 1fr)); gap: 1rem; }}
    .card {{ background: #fff; border-radius: 8px; padding: 1rem; box-shadow: 0 1px 3px rgba(0,0,0,.1); }}
    .label {{ font-size: .85rem; color: #666; }}
    .value {{ font-size: 1.4rem; font-weight: 600; margin-top: .3rem; }}
    .chart {{ background: #fff; border-radius: 8px; padding: 1rem; margin-top: 2rem; }}
  </style>
</head>
<body>
  <h1>Load Test Report</h1>
  <div class="meta">
    Target: <code>{url}</code> &middot; Users: {users} &middot; Ramp-up: {ramp_up} &middot; Duration: {duration}
  </div>
  <div class="cards">
      {cards}
  </div>
  <div class="chart"><h2>Latency distribution</h2><canvas id="histogram"></canvas></div>
  <div class="chart"><h2>Latency percentiles</h2><canvas id="percentiles"></canvas></div>
  <script id="histogram-data" type="application/json">{histogram}</script>
  <script id="percentile-data" type="application/json">{percentiles}</script>
  <script>
    const histogram = JSON.parse(document.getElementById('histogram-data').textContent);
    const percentiles = JSON.parse(document.getElementById('percentile-data').textContent);
    new Chart(document.getElementById('histogram'), {{
      type: 'bar',
      data: {{
        labels: histogram.labels.map(l => l + ' ms'),
        datasets: [{{ label: 'Requests', data: histogram.counts, backgroundColor: '#4e79a7' }}]
      }},
      options: {{ scales: {{ y: {{ beginAtZero: true }} }} }}
    }});
    new Chart(document.getElementById('percentiles'), {{
      type: 'line',
      data: {{
        labels: percentiles.map(p => 'p' + p.percentile),
        datasets: [{{ label: 'Latency (ms)', data: percentiles.map(p => p.latency), borderColor: '#e15759', fill: false }}]
      }},
      options: {{ scales: {{ y: {{ beginAtZero: true }} }} }}
    }});
  </script>
</body>
</html>
"#,
            url = html_escape(&self.target_url),
            users = self.concurrent_users,
        ))
    }
}

/// Read a results file and render its HTML page.
pub async fn render_html_report(results: &Path) -> Result<String, ReportError> {
    let metrics = load_results(results).await?;
    HtmlReport::from(&metrics).render()
}

async fn write_html_report(results: &Path, output: &Path) -> Result<(), ReportError> {
    let html = render_html_report(results).await?;
    tokio::fs::write(output, html)
        .await
        .map_err(|source| ReportError::Io {
            path: output.to_path_buf(),
            source,
        })
}

/// Generate `output` from the `results` file.
///
/// Errors are logged, never returned: a `None` (and no file at `output`)
/// means the report could not be produced.
pub async fn generate_html_report(results: &Path, output: &Path) -> Option<PathBuf> {
    match write_html_report(results, output).await {
        Ok(()) => {
            tracing::info!("HTML report written to {}", output.display());
            Some(output.to_path_buf())
        }
        Err(e) => {
            tracing::error!(
                "Could not generate HTML report from {}: {e}",
                results.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LoadTestConfig,
        metric::{FailureReason, Outcome, RequestMetric},
        report::{JsonFileReporter, Reporter},
    };
    use std::time::Duration;

    fn metrics_with(latencies: &[f64]) -> Metrics {
        let mut metrics = Metrics::new(&LoadTestConfig::default());
        metrics.mark_started();
        for &l in latencies {
            metrics.consume(&RequestMetric::new(Outcome::Success(l), Duration::ZERO));
        }
        metrics.consume(&RequestMetric::new(
            Outcome::Failure(FailureReason::Timeout),
            Duration::ZERO,
        ));
        metrics.mark_finished();
        let _ = metrics.finalize();
        metrics
    }

    mod histogram {
        use super::*;

        #[test]
        fn spans_min_to_max() {
            let latencies: Vec<f64> = (0..=100).map(f64::from).collect();
            let histogram = Histogram::new(&latencies, 10);
            assert_eq!(histogram.counts.len(), 10);
            assert_eq!(histogram.counts.iter().sum::<u64>(), 101);
            assert_eq!(histogram.counts[0], 10);
            // 90..=100 including the max
            assert_eq!(histogram.counts[9], 11);
            assert_eq!(histogram.labels[0], "0-10");
        }

        #[test]
        fn identical_latencies_share_one_bucket() {
            let histogram = Histogram::new(&[5.0, 5.0, 5.0], 10);
            assert_eq!(histogram.counts[0], 3);
            assert_eq!(histogram.counts.iter().sum::<u64>(), 3);
        }

        #[test]
        fn empty_series() {
            assert_eq!(Histogram::new(&[], 10), Histogram::default());
        }

        #[test]
        fn narrow_spans_keep_labels_distinct() {
            let latencies: Vec<f64> = (10..=20).map(|i| f64::from(i) / 10.0).collect();
            let histogram = Histogram::new(&latencies, 10);
            let mut labels = histogram.labels.clone();
            labels.sort();
            labels.dedup();
            assert_eq!(labels.len(), 10);
            assert_eq!(histogram.labels[0], "1.00-1.10");
        }
    }

    #[test]
    fn percentile_chart_uses_nearest_rank() {
        let report = HtmlReport::from(&metrics_with(&[50.0, 10.0, 40.0, 20.0, 30.0]));
        let points: Vec<(u8, f64)> = report
            .percentiles
            .iter()
            .map(|p| (p.percentile, p.latency))
            .collect();
        assert_eq!(
            points,
            vec![
                (0, 10.0),
                (25, 20.0),
                (50, 30.0),
                (75, 40.0),
                (90, 50.0),
                (95, 50.0),
                (99, 50.0),
                (100, 50.0),
            ]
        );
    }

    #[test]
    fn empty_latencies_render_zeros() {
        let report = HtmlReport::from(&metrics_with(&[]));
        assert!(report.histogram.counts.is_empty());
        assert!(report.percentiles.iter().all(|p| p.latency == 0.0));
        assert_eq!(report.min_latency, 0.0);
        assert!(report.render().unwrap().contains("<canvas id=\"histogram\">"));
    }

    #[test]
    fn target_url_is_escaped() {
        let mut metrics = metrics_with(&[1.0]);
        metrics.target_url = "http://x/?a=<script>".into();
        let html = HtmlReport::from(&metrics).render().unwrap();
        assert!(html.contains("http://x/?a=&lt;script&gt;"));
    }

    #[tokio::test]
    async fn round_trip_histogram_counts_every_latency() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        let output = dir.path().join("report.html");
        let metrics = metrics_with(&[12.0, 15.5, 9.25, 40.0, 33.0, 33.0, 18.0]);

        JsonFileReporter::new(&results)
            .report(&metrics)
            .await
            .unwrap();
        let written = generate_html_report(&results, &output).await;
        assert_eq!(written, Some(output.clone()));

        let html = tokio::fs::read_to_string(&output).await.unwrap();
        let start = html.find(r#"<script id="histogram-data" type="application/json">"#).unwrap();
        let json = &html[start..];
        let json = &json[json.find('>').unwrap() + 1..json.find("</script>").unwrap()];
        let histogram: serde_json::Value = serde_json::from_str(json).unwrap();
        let total: u64 = histogram["counts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_u64().unwrap())
            .sum();
        assert_eq!(total, metrics.latencies.len() as u64);
    }

    #[tokio::test]
    async fn results_without_latencies_still_render() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        let output = dir.path().join("report.html");
        let raw = r#"{
            "targetUrl": "http://localhost:3000",
            "concurrentUsers": 2,
            "useRampUp": false,
            "rampUpSteps": 10,
            "totalRequests": 3,
            "successfulRequests": 2,
            "failedRequests": 1,
            "startTime": 1700000000000,
            "endTime": 1700000002000,
            "requestsPerSecond": 1.5,
            "avgLatency": 15.25,
            "minLatency": 10.5,
            "maxLatency": 20.0,
            "p95Latency": 20.0,
            "p99Latency": 20.0
        }"#;
        tokio::fs::write(&results, raw).await.unwrap();

        assert_eq!(
            generate_html_report(&results, &output).await,
            Some(output.clone())
        );
        assert!(output.exists());

        let metrics = load_results(&results).await.unwrap();
        assert!(metrics.latencies.is_empty());
        assert!(metrics.requests_per_interval.is_empty());
        assert!(HtmlReport::from(&metrics).histogram.counts.is_empty());
    }

    #[tokio::test]
    async fn corrupt_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        let output = dir.path().join("report.html");
        tokio::fs::write(&results, "{ not json").await.unwrap();

        assert_eq!(generate_html_report(&results, &output).await, None);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.html");
        assert_eq!(
            generate_html_report(&dir.path().join("missing.json"), &output).await,
            None
        );
        assert!(!output.exists());
    }
}
