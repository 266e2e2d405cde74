//! JSON output formatter for machine processing

use crate::domain::{DependencyOutcome, RunSummary};
use crate::output::{OutputFormatter, Verbosity};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Quiet drops skipped dependencies from `outcomes`
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    dry_run: bool,
    cancelled: bool,
    budget_exhausted: bool,
    summary: JsonSummary,
    outcomes: Vec<&'a DependencyOutcome>,
}

#[derive(Serialize)]
struct JsonSummary {
    updated: usize,
    skipped: usize,
    failed: usize,
    pull_requests_created: usize,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = JsonOutput {
            dry_run: summary.dry_run,
            cancelled: summary.cancelled,
            budget_exhausted: summary.budget_exhausted,
            summary: JsonSummary {
                updated: summary.updated_count(),
                skipped: summary.skipped_count(),
                failed: summary.failed_count(),
                pull_requests_created: summary.pull_requests_created(),
            },
            outcomes: summary
                .outcomes
                .iter()
                .filter(|o| self.verbosity != Verbosity::Quiet || !o.is_skipped())
                .collect(),
        };

        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)
    }
}
