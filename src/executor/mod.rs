//! Executor: the concurrency controller of a run
//!
//! An [`Executor`] takes a [`Scenario`] and decides when and how many virtual
//! users run its action. The built-in [`UserExecutor`] launches a fixed number of
//! users, either all at once or in ramp-up batches, and lets each of them loop
//! the action back-to-back until its own deadline.
//!
//! # Data flow
//! 1. The executor stamps the run's start time and hands the [`Metrics`] record
//!    to a dedicated aggregator task.
//! 2. Virtual users are spawned as tokio tasks. Each one owns a sender half of a
//!    bounded channel and pushes one [`RequestMetric`](crate::metric::RequestMetric)
//!    per completed action.
//! 3. When the last user finishes, the channel closes, the aggregator returns the
//!    record and the executor stamps the end time.
//!
//! # Deadlines
//! A user's deadline is `launch + duration`, never the global start plus the
//! duration. Under ramp-up the last batch therefore keeps running up to
//! `(duration / steps) * (steps - 1)` past the nominal end of the test.
//!
//! # Interruption
//! The optional shutdown [`watch`](tokio::sync::watch) flag stops everything
//! early: in-flight actions are dropped, no further batches launch, and the
//! metrics gathered so far are still returned.
pub mod users;
pub use users::{batch_sizes, UserExecutor};

use crate::{aggregate::Metrics, metric::Outcome, scenario::Scenario};
use std::future::Future;

/// The runtime hook that executes a [`Scenario`].
pub trait Executor<F, Fut>
where
    Self: Send + Sync + Sized,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Outcome> + Send,
{
    type Error;

    /// Run the scenario to completion, folding every sample into `metrics`.
    fn exec(
        &self,
        scenario: &Scenario<F>,
        metrics: Metrics,
    ) -> impl Future<Output = Result<Metrics, Self::Error>> + Send;
}
