//! The run's metrics accumulator.
//!
//! [`Metrics`] is the single mutable record of a run. Virtual users never touch
//! it directly: they send [`RequestMetric`]s over a channel and one
//! [`aggregator_task`] owns and mutates the record, so every counter update is
//! a plain single-writer `+=` with no lock.
//!
//! The serialized form of [`Metrics`] is the results-file interchange format and
//! its field names must stay stable.

use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    config::LoadTestConfig,
    metric::{FailureReason, Outcome, RequestMetric},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub target_url: String,
    pub concurrent_users: usize,
    pub use_ramp_up: bool,
    pub ramp_up_steps: usize,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// One entry per successful request, in completion order.
    #[serde(default)]
    pub latencies: Vec<f64>,

    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,

    pub requests_per_second: f64,
    pub avg_latency: f64,
    /// `None` until a request succeeds.
    pub min_latency: Option<f64>,
    /// `None` until a request succeeds.
    pub max_latency: Option<f64>,
    pub p95_latency: f64,
    pub p99_latency: f64,

    /// Successful completions keyed by interval start, in whole seconds since
    /// the run started.
    #[serde(default)]
    pub requests_per_interval: BTreeMap<u64, u64>,

    #[serde(skip)]
    tracking_interval_seconds: u64,
    #[serde(skip)]
    timeouts: u64,
    #[serde(skip)]
    transport_errors: u64,
}

impl Metrics {
    pub fn new(config: &LoadTestConfig) -> Self {
        Self {
            target_url: config.target_url.clone(),
            concurrent_users: config.concurrent_users,
            use_ramp_up: config.use_ramp_up,
            ramp_up_steps: config.ramp_up_steps,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            latencies: Vec::new(),
            start_time: None,
            end_time: None,
            requests_per_second: 0.0,
            avg_latency: 0.0,
            min_latency: None,
            max_latency: None,
            p95_latency: 0.0,
            p99_latency: 0.0,
            requests_per_interval: BTreeMap::new(),
            tracking_interval_seconds: config.tracking_interval_seconds,
            timeouts: 0,
            transport_errors: 0,
        }
    }

    pub fn mark_started(&mut self) {
        self.start_time = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Fold a batch of samples into the record.
    pub fn aggregate(&mut self, metrics: &[RequestMetric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Fold one sample into the record.
    pub fn consume(&mut self, metric: &RequestMetric) {
        self.total_requests += 1;
        match &metric.outcome {
            Outcome::Success(latency) => {
                self.successful_requests += 1;
                self.latencies.push(*latency);
                self.min_latency = Some(self.min_latency.map_or(*latency, |m| m.min(*latency)));
                self.max_latency = Some(self.max_latency.map_or(*latency, |m| m.max(*latency)));
                *self
                    .requests_per_interval
                    .entry(self.interval_key(metric.completed_at))
                    .or_insert(0) += 1;
            }
            Outcome::Failure(reason) => {
                self.failed_requests += 1;
                match reason {
                    FailureReason::Timeout => self.timeouts += 1,
                    FailureReason::Transport(_) => self.transport_errors += 1,
                }
            }
        }
    }

    /// Start second of the bucket an elapsed time falls into.
    pub fn interval_key(&self, elapsed: Duration) -> u64 {
        let width = self.tracking_interval_seconds.max(1);
        (elapsed.as_secs() / width) * width
    }

    /// Failures caused by the per-request timeout. Not part of the results file.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Failures caused by transport errors. Not part of the results file.
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors
    }

    pub fn elapsed(&self) -> Option<Duration> {
        let (start, end) = (self.start_time?, self.end_time?);
        (end - start).to_std().ok()
    }
}

/// Owns the [`Metrics`] record for the duration of a run.
///
/// Drains the channel in batches of up to `batch_size` and logs live progress
/// every `progress_every`. Returns the record once every sender is dropped.
///
/// A sample whose accounting panics is logged and skipped, so the record
/// gathered so far always survives the run.
pub async fn aggregator_task(
    mut metrics: Metrics,
    mut rx: mpsc::Receiver<RequestMetric>,
    batch_size: usize,
    progress_every: Duration,
) -> Metrics {
    let progress_every = progress_every.max(Duration::from_millis(1));
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval_at(Instant::now() + progress_every, progress_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_total = 0;

    loop {
        tokio::select! {
            received = rx.recv() => {
                // Every virtual user has finished
                let Some(metric) = received else { break };
                batch.push(metric);

                while batch.len() < batch_size {
                    match rx.try_recv() {
                        Ok(metric) => batch.push(metric),
                        Err(_) => break,
                    }
                }
                for metric in batch.drain(..) {
                    if catch_unwind(AssertUnwindSafe(|| metrics.consume(&metric))).is_err() {
                        tracing::error!("Dropped a sample that could not be aggregated");
                    }
                }
            }
            _ = ticker.tick() => {
                let interval_requests = metrics.total_requests.saturating_sub(last_total);
                last_total = metrics.total_requests;
                tracing::info!(
                    total = metrics.total_requests,
                    failed = metrics.failed_requests,
                    "{} requests so far, {:.1} req/s over the last {}s",
                    metrics.total_requests,
                    interval_requests as f64 / progress_every.as_secs_f64(),
                    progress_every.as_secs(),
                );
            }
        }
    }
    metrics
}
