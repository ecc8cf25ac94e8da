use std::{fmt, time::Duration};

/// Why a single request did not produce a latency sample.
///
/// Both variants count as failed requests; they are kept apart so logs and the
/// console summary can tell a slow target from an unreachable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The per-request timeout fired and the request was aborted.
    Timeout,
    /// Connection refused/reset, DNS failure, or the body stream broke.
    Transport(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// The classification of exactly one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Full body received; latency in milliseconds from send to end of body.
    Success(f64),
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// A single sample produced by a virtual user and sent to the aggregator.
///
/// `completed_at` is measured from the start of the run, not from the user's
/// launch, so that every user's samples land in the same interval buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetric {
    pub outcome: Outcome,
    pub completed_at: Duration,
}

impl RequestMetric {
    pub fn new(outcome: Outcome, completed_at: Duration) -> Self {
        Self {
            outcome,
            completed_at,
        }
    }
}
