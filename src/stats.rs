//! Post-run statistics over a finished [`Metrics`] record.
//!
//! Percentiles use the nearest-rank method: sort ascending, take the element at
//! `floor(len * p / 100)` clamped to the last index. No interpolation.

use std::fmt;

use serde::Serialize;

use crate::aggregate::Metrics;

/// Nearest-rank percentile of an ascending slice. `0.0` for an empty slice.
///
/// ```
/// use shuttle_load::stats::percentile;
///
/// let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
/// assert_eq!(percentile(&sorted, 95.0), 50.0);
/// assert_eq!(percentile(&sorted, 50.0), 30.0);
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p / 100.0).floor();
    let index = if rank <= 0.0 { 0 } else { rank as usize };
    sorted[index.min(sorted.len() - 1)]
}

/// Ascending copy of a latency series.
pub fn sorted_copy(latencies: &[f64]) -> Vec<f64> {
    let mut sorted = latencies.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyStats {
    /// `None` for an empty series.
    pub fn compute(latencies: &[f64]) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        let sorted = sorted_copy(latencies);
        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
        Some(Self {
            avg,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }
}

/// Why the derived statistics of a run could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    NoSuccessfulRequests,
    RunNotFinished,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NoSuccessfulRequests => f.write_str("no successful requests"),
            Unavailable::RunNotFinished => f.write_str("run start or end time is missing"),
        }
    }
}

/// Derived figures of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// All requests, failed ones included, over the wall-clock run time.
    pub requests_per_second: f64,
    pub latency: LatencyStats,
}

impl TryFrom<&Metrics> for Summary {
    type Error = Unavailable;

    fn try_from(metrics: &Metrics) -> Result<Self, Self::Error> {
        let elapsed = metrics.elapsed().ok_or(Unavailable::RunNotFinished)?;
        let latency =
            LatencyStats::compute(&metrics.latencies).ok_or(Unavailable::NoSuccessfulRequests)?;
        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            metrics.total_requests as f64 / secs
        } else {
            0.0
        };
        Ok(Self {
            requests_per_second,
            latency,
        })
    }
}

impl Metrics {
    /// Fill in the derived fields. When the statistics are not applicable they
    /// are zeroed and a warning says why.
    pub fn finalize(&mut self) -> Result<Summary, Unavailable> {
        match Summary::try_from(&*self) {
            Ok(summary) => {
                self.requests_per_second = summary.requests_per_second;
                self.avg_latency = summary.latency.avg;
                self.p95_latency = summary.latency.p95;
                self.p99_latency = summary.latency.p99;
                Ok(summary)
            }
            Err(reason) => {
                tracing::warn!("Latency statistics not applicable: {reason}");
                self.requests_per_second = 0.0;
                self.avg_latency = 0.0;
                self.p95_latency = 0.0;
                self.p99_latency = 0.0;
                Err(reason)
            }
        }
    }
}
