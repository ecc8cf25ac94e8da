//! Turning a finished [`Metrics`] record into output.
//!
//! A [`Reporter`] is the I/O boundary of a run: it consumes the record and
//! sends it somewhere (stdout, a JSON file). Everything before it stays pure.
//! The HTML report is generated separately from a results file, so it can be
//! regenerated at any time without re-running the test.

pub mod console;
pub mod html;
pub mod json;

pub use console::ConsoleReporter;
pub use html::{generate_html_report, HtmlReport};
pub use json::{load_results, JsonFileReporter};

use std::future::Future;

use crate::{aggregate::Metrics, error::ReportError};

/// Consumes a finished run and performs side effects with it.
///
/// # Example
/// ```rust
/// use shuttle_load::{aggregate::Metrics, error::ReportError, Reporter};
///
/// struct CountReporter;
/// impl Reporter for CountReporter {
///     async fn report(&self, metrics: &Metrics) -> Result<(), ReportError> {
///         println!("{} requests", metrics.total_requests);
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter {
    fn report(&self, metrics: &Metrics) -> impl Future<Output = Result<(), ReportError>>;
}
