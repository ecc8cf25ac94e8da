//! shuttle-load: a closed-loop HTTP load generator.
//!
//! A fixed population of virtual users hammers one URL with back-to-back GET
//! requests for a configured duration, optionally launched in ramp-up batches.
//! Every request is timed to the last byte of its body; afterwards the run is
//! summarized (throughput, average, nearest-rank p95/p99) and published as a
//! console summary, a JSON results file and a self-contained HTML report.
//!
//! # Architecture
//!
//! - [`RequestDriver`](driver::RequestDriver): issues one timed request and
//!   classifies it as an [`Outcome`](metric::Outcome). It never fails.
//! - [`Scenario`]: the action every virtual user repeats.
//! - [`Executor`]: the concurrency controller. [`UserExecutor`] launches the
//!   users, all at once or in batches, and waits for each to reach its own
//!   deadline.
//! - [`Metrics`](aggregate::Metrics): the run's accumulator, owned by a single
//!   aggregator task fed over a channel.
//! - [`stats`]: nearest-rank percentiles and the derived fields of a finished run.
//! - [`Reporter`]: console and JSON outputs; [`report::html`] renders the HTML
//!   page from a results file.
//!
//! # Example
//!
//! ```no_run
//! use shuttle_load::{config::LoadTestConfig, runner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoadTestConfig::builder()
//!         .target_url("http://localhost:3000")
//!         .concurrent_users(200)
//!         .test_duration_seconds(60)
//!         .use_ramp_up(true)
//!         .ramp_up_steps(4)
//!         .build();
//!
//!     let metrics = runner::run_load_test(&config, None).await?;
//!     runner::publish(&config, &metrics).await;
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//! - `internals`: expose the virtual-user loop pieces of [`UserExecutor`].

/// The run's metrics accumulator
pub mod aggregate;
/// Opening the HTML report in a viewer
pub mod browser;
/// Typed run configuration
pub mod config;
/// Single timed requests
pub mod driver;
pub mod error;
/// Concurrency control of virtual users
pub mod executor;
/// Per-request samples
pub mod metric;
/// Console, JSON and HTML outputs
pub mod report;
/// End-to-end run wiring
pub mod runner;
/// The action virtual users repeat
pub mod scenario;
pub mod stats;

pub use executor::{Executor, UserExecutor};
pub use report::Reporter;
pub use scenario::Scenario;
