use std::{future::Future, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use typed_builder::TypedBuilder;

use super::Executor;
use crate::{
    aggregate::{aggregator_task, Metrics},
    config::RampUp,
    error::RunError,
    metric::{Outcome, RequestMetric},
    scenario::Scenario,
};
use internals::*;

/// Split `users` into launch batches of `ceil(users / steps)`.
///
/// Only non-empty batches are returned, so there are never more than `users`
/// of them even when `steps` is larger. The last batch may be smaller and the
/// sizes always sum to `users`.
pub fn batch_sizes(users: usize, steps: usize) -> Vec<usize> {
    let per_batch = users.div_ceil(steps.max(1)).max(1);
    let mut remaining = users;
    std::iter::from_fn(|| {
        (remaining > 0).then(|| {
            let size = per_batch.min(remaining);
            remaining -= size;
            size
        })
    })
    .collect()
}

/// Executor that runs a fixed population of closed-loop virtual users.
///
/// - Without ramp-up every user is spawned at the same instant.
/// - With ramp-up, users are spawned in [`batch_sizes`] batches, one batch every
///   `duration / steps`.
/// - Every user loops the scenario action with no pause in between until
///   `duration` has passed since *its own* launch.
///
/// ```no_run
/// # async fn demo() -> Result<(), shuttle_load::error::RunError> {
/// use std::time::Duration;
/// use shuttle_load::{
///     aggregate::Metrics, config::LoadTestConfig, executor::UserExecutor,
///     metric::Outcome, Executor, Scenario,
/// };
///
/// let config = LoadTestConfig::default();
/// let scenario = Scenario::builder()
///     .name("noop")
///     .action(|| async { Outcome::Success(0.0) })
///     .build();
/// let metrics = UserExecutor::builder()
///     .users(10)
///     .duration(Duration::from_secs(5))
///     .build()
///     .exec(&scenario, Metrics::new(&config))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct UserExecutor {
    /// Number of virtual users to launch.
    pub users: usize,
    /// How long each user keeps issuing requests after its launch.
    pub duration: Duration,
    /// Staged launch plan; `None` launches everyone at once.
    #[builder(default)]
    pub ramp_up: Option<RampUp>,
    /// How often the aggregator logs live progress.
    #[builder(default = Duration::from_secs(5))]
    pub progress_interval: Duration,
    /// Capacity of the sample channel and the aggregator's batch size.
    #[builder(default = 1024)]
    pub channel_capacity: usize,
    /// Flipping this to `true` stops the run early.
    #[builder(default, setter(strip_option))]
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl UserExecutor {
    /// Launch plan as `(delay before batch, batch size)` pairs.
    ///
    /// The delay always comes from the configured step count, even when fewer
    /// batches are needed to launch everyone.
    fn plan(&self) -> Vec<(Duration, usize)> {
        match self.ramp_up {
            Some(RampUp { steps }) => {
                let step_delay = self.duration.div_f64(steps.max(1) as f64);
                batch_sizes(self.users, steps)
                    .into_iter()
                    .enumerate()
                    .map(|(i, size)| (if i == 0 { Duration::ZERO } else { step_delay }, size))
                    .collect()
            }
            None => vec![(Duration::ZERO, self.users)],
        }
    }
}

impl<F, Fut> Executor<F, Fut> for UserExecutor
where
    Self: Send + Sync + Sized,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    type Error = RunError;

    async fn exec(&self, scenario: &Scenario<F>, mut metrics: Metrics) -> Result<Metrics, RunError> {
        let mut shutdown = self
            .shutdown
            .clone()
            .unwrap_or_else(|| watch::channel(false).1);
        let (tx, rx) = mpsc::channel(self.channel_capacity.max(1));

        metrics.mark_started();
        let ctx = UserContext {
            run_start: Instant::now(),
            duration: self.duration,
            tx,
            shutdown: shutdown.clone(),
        };
        let aggregator = tokio::spawn(aggregator_task(
            metrics,
            rx,
            self.channel_capacity.max(1),
            self.progress_interval,
        ));

        let plan = self.plan();
        let batches = plan.len();
        let mut handles = Vec::with_capacity(self.users);
        tracing::info!(
            "Running scenario {} with {} users for {}s each",
            scenario.name,
            self.users,
            self.duration.as_secs_f64()
        );

        for (i, (delay, size)) in plan.into_iter().enumerate() {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stopped(&mut shutdown) => {
                        tracing::warn!("Interrupted, skipping remaining batches");
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            tracing::info!("Launching batch {}/{batches}: {size} users", i + 1);
            let first_id = handles.len();
            handles.extend(spawn_users(&ctx, first_id, size, scenario.action.clone()));
        }
        // Only the users hold senders from here on
        drop(ctx);

        tracing::info!("Waiting for {} users to reach their deadlines...", handles.len());
        for res in join_all(handles).await {
            if let Err(e) = res {
                // the samples that user already sent are kept
                tracing::error!("Virtual user panicked: {e}");
            }
        }

        let mut metrics = aggregator.await.inspect_err(|e| {
            tracing::error!("Aggregator task failed, no metrics to report: {e}");
        })?;
        metrics.mark_finished();
        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(metrics)
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Pieces of the virtual-user loop.
mod internals {
    use super::*;

    /// State shared by every virtual user of a run.
    #[derive(Clone)]
    pub struct UserContext {
        /// Origin for the interval buckets.
        pub run_start: Instant,
        /// Per-user run length.
        pub duration: Duration,
        pub tx: mpsc::Sender<RequestMetric>,
        pub shutdown: watch::Receiver<bool>,
    }

    /// Resolves once the shutdown flag is set. Never resolves if the flag can
    /// no longer change.
    pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
        if shutdown.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Spawn `count` users numbered from `first_id`. Each returns how many
    /// samples it sent.
    pub fn spawn_users<F, Fut>(
        ctx: &UserContext,
        first_id: usize,
        count: usize,
        action: F,
    ) -> Vec<JoinHandle<u64>>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        (first_id..first_id + count)
            .map(|id| {
                let ctx = ctx.clone();
                let action = action.clone();
                tokio::spawn(virtual_user(id, ctx, action))
            })
            .collect()
    }

    /// One closed-loop user: request after request until its own deadline.
    pub async fn virtual_user<F, Fut>(id: usize, ctx: UserContext, action: F) -> u64
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let UserContext {
            run_start,
            duration,
            tx,
            mut shutdown,
        } = ctx;
        let deadline = Instant::now() + duration;
        let mut sent = 0;
        tracing::debug!("User {id} started");

        while Instant::now() < deadline {
            let outcome = tokio::select! {
                outcome = action() => outcome,
                _ = stopped(&mut shutdown) => break,
            };
            if let Outcome::Failure(reason) = &outcome {
                tracing::debug!("User {id}: request failed ({reason})");
            }
            if tx
                .send(RequestMetric::new(outcome, run_start.elapsed()))
                .await
                .is_err()
            {
                break;
            }
            sent += 1;
        }

        tracing::debug!("User {id} stopped after {sent} requests");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadTestConfig;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    fn metrics() -> Metrics {
        Metrics::new(&LoadTestConfig::builder().tracking_interval_seconds(1).build())
    }

    fn sleepy_scenario(
        latency: Duration,
    ) -> Scenario<impl Fn() -> futures::future::BoxFuture<'static, Outcome> + Clone> {
        Scenario::builder()
            .name("sleepy")
            .action(move || -> futures::future::BoxFuture<'static, Outcome> {
                Box::pin(async move {
                    tokio::time::sleep(latency).await;
                    Outcome::Success(latency.as_secs_f64() * 1000.0)
                })
            })
            .build()
    }

    mod batch_sizes {
        use super::*;

        #[test]
        fn even_split() {
            let sizes = batch_sizes(1000, 10);
            assert_eq!(sizes, vec![100; 10]);
            assert_eq!(sizes.iter().sum::<usize>(), 1000);
        }

        #[test]
        fn last_batch_is_smaller() {
            let sizes = batch_sizes(10, 3);
            assert_eq!(sizes, vec![4, 4, 2]);
            assert_eq!(sizes.iter().sum::<usize>(), 10);
        }

        #[test]
        fn more_steps_than_users() {
            assert_eq!(batch_sizes(3, 5), vec![1, 1, 1]);
        }

        #[test]
        fn huge_step_count() {
            assert_eq!(batch_sizes(3, 1usize << 62), vec![1, 1, 1]);
            assert_eq!(batch_sizes(3, usize::MAX), vec![1, 1, 1]);
        }

        #[test]
        fn no_users_no_batches() {
            assert!(batch_sizes(0, 4).is_empty());
        }

        #[test]
        fn single_step_is_everyone() {
            assert_eq!(batch_sizes(7, 1), vec![7]);
        }
    }

    #[test]
    fn plan_keeps_configured_step_delay() {
        let executor = UserExecutor::builder()
            .users(2)
            .duration(Duration::from_secs(10))
            .ramp_up(Some(RampUp { steps: 5 }))
            .build();
        assert_eq!(
            executor.plan(),
            vec![(Duration::ZERO, 1), (Duration::from_secs(2), 1)]
        );
    }

    #[tokio::test]
    async fn spawn_expected_number_of_users() {
        let (tx, _rx) = mpsc::channel(8);
        let ctx = UserContext {
            run_start: Instant::now(),
            duration: Duration::ZERO,
            tx,
            shutdown: watch::channel(false).1,
        };
        let action = || async { Outcome::Success(1.0) };
        let users = spawn_users(&ctx, 0, 10, action);

        assert_eq!(users.len(), 10);
        for user in users {
            // a zero duration means the deadline has already passed
            assert_eq!(user.await.unwrap(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_at_once_runs_every_user_for_the_duration() {
        let executor = UserExecutor::builder()
            .users(5)
            .duration(Duration::from_secs(1))
            .build();
        let scenario = sleepy_scenario(Duration::from_millis(100));

        let started = Instant::now();
        let metrics = executor.exec(&scenario, metrics()).await.unwrap();

        assert_eq!(metrics.total_requests, 50);
        assert_eq!(
            metrics.successful_requests + metrics.failed_requests,
            metrics.total_requests
        );
        assert_eq!(metrics.latencies.len() as u64, metrics.successful_requests);
        assert!(metrics.start_time.is_some() && metrics.end_time.is_some());
        assert!(started.elapsed() < Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn late_batches_get_their_full_duration() {
        let executor = UserExecutor::builder()
            .users(2)
            .duration(Duration::from_secs(2))
            .ramp_up(Some(RampUp { steps: 2 }))
            .build();
        let scenario = sleepy_scenario(Duration::from_millis(300));

        let started = Instant::now();
        let metrics = executor.exec(&scenario, metrics()).await.unwrap();

        // second user launches at 1s and keeps going until 3s
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(metrics.total_requests, 14);
        // only the late user can complete a request past the 3s mark
        assert!(metrics.requests_per_interval.contains_key(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_partial_metrics() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let executor = UserExecutor::builder()
            .users(4)
            .duration(Duration::from_secs(60))
            .ramp_up(Some(RampUp { steps: 4 }))
            .shutdown(stop_rx)
            .build();
        let scenario = sleepy_scenario(Duration::from_millis(100));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            stop_tx.send(true).unwrap();
        });

        let started = Instant::now();
        let metrics = executor.exec(&scenario, metrics()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(21));
        assert!(metrics.total_requests > 0);
        assert!(metrics.end_time.is_some());
        assert_eq!(
            metrics.successful_requests + metrics.failed_requests,
            metrics.total_requests
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_panicking_user_does_not_abort_the_run() {
        let tripped = Arc::new(AtomicBool::new(false));
        let scenario = Scenario::builder()
            .name("flaky")
            .action(move || {
                let tripped = tripped.clone();
                async move {
                    if !tripped.swap(true, Ordering::SeqCst) {
                        panic!("first request explodes");
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Outcome::Success(100.0)
                }
            })
            .build();
        let executor = UserExecutor::builder()
            .users(2)
            .duration(Duration::from_secs(1))
            .build();

        let metrics = executor.exec(&scenario, metrics()).await.unwrap();
        assert_eq!(metrics.total_requests, 10);
    }
}
