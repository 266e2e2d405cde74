//! Text output formatter for human-readable display
//!
//! This module provides:
//! - One line per updated or failed dependency, with the semver change type
//! - Skipped dependencies with their reason (verbose only)
//! - A summary line, plus notes on cancellation and the pull request budget

use crate::domain::{DependencyOutcome, RunSummary};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Semantic version change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChangeType {
    /// Major version change (breaking)
    Major,
    /// Minor version change (features)
    Minor,
    /// Patch version change (fixes)
    Patch,
    /// Unknown or unparseable
    Unknown,
}

impl VersionChangeType {
    /// Determine the change type between two versions
    pub fn from_versions(old: &str, new: &str) -> Self {
        let parse = |v: &str| -> Option<(u64, u64)> {
            let v = v.trim_start_matches(['v', '=', '^', '~']);
            let mut parts = v.split(['.', '-', '+']);
            let major = parts.next()?.parse().ok()?;
            let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
            Some((major, minor))
        };

        match (parse(old), parse(new)) {
            (Some((old_major, _)), Some((new_major, _))) if old_major != new_major => {
                VersionChangeType::Major
            }
            (Some((_, old_minor)), Some((_, new_minor))) if old_minor != new_minor => {
                VersionChangeType::Minor
            }
            (Some(_), Some(_)) => VersionChangeType::Patch,
            _ => VersionChangeType::Unknown,
        }
    }

    /// Get the display label with color
    pub fn colored_label(&self) -> String {
        match self {
            VersionChangeType::Major => "major".red().bold().to_string(),
            VersionChangeType::Minor => "minor".yellow().to_string(),
            VersionChangeType::Patch => "patch".green().to_string(),
            VersionChangeType::Unknown => "?".dimmed().to_string(),
        }
    }

    /// Get the plain label
    pub fn label(&self) -> &'static str {
        match self {
            VersionChangeType::Major => "major",
            VersionChangeType::Minor => "minor",
            VersionChangeType::Patch => "patch",
            VersionChangeType::Unknown => "?",
        }
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn dry_run_prefix(&self, summary: &RunSummary) -> String {
        match (summary.dry_run, self.color) {
            (false, _) => String::new(),
            (true, true) => format!("{} ", "(dry-run)".cyan()),
            (true, false) => "(dry-run) ".to_string(),
        }
    }

    fn max_name_length(summary: &RunSummary) -> usize {
        summary
            .outcomes
            .iter()
            .map(|o| o.dependency().len())
            .max()
            .unwrap_or(0)
            .max(20)
    }

    fn format_outcome(
        &self,
        outcome: &DependencyOutcome,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        match outcome {
            DependencyOutcome::Updated {
                dependency,
                previous_version,
                new_version,
                unlock_level,
                pull_request,
                ..
            } => {
                let old = previous_version.as_deref().unwrap_or("unknown");
                let new = new_version.as_deref().unwrap_or("unknown");
                let change = VersionChangeType::from_versions(old, new);
                if self.color {
                    writeln!(
                        writer,
                        "  {} {:width$} {} {} {} [{}] {}",
                        "✓".green(),
                        dependency,
                        old.dimmed(),
                        "→".dimmed(),
                        new.bright_white().bold(),
                        change.colored_label(),
                        format!("({}, {})", unlock_level, pull_request).dimmed(),
                        width = width
                    )
                } else {
                    writeln!(
                        writer,
                        "  + {:width$} {} -> {} [{}] ({}, {})",
                        dependency,
                        old,
                        new,
                        change.label(),
                        unlock_level,
                        pull_request,
                        width = width
                    )
                }
            }
            DependencyOutcome::Failed {
                dependency,
                message,
                timeout,
            } => {
                let kind = if *timeout { "timed out" } else { "failed" };
                if self.color {
                    writeln!(
                        writer,
                        "  {} {:width$} {}: {}",
                        "✗".red(),
                        dependency,
                        kind.red(),
                        message,
                        width = width
                    )
                } else {
                    writeln!(writer, "  ! {:width$} {}: {}", dependency, kind, message, width = width)
                }
            }
            DependencyOutcome::Skipped { dependency, reason } => {
                let reason = format!("({})", reason);
                if self.color {
                    let name = format!("{:width$}", dependency, width = width);
                    writeln!(writer, "  {} {} {}", "-".dimmed(), name.dimmed(), reason.dimmed())
                } else {
                    writeln!(writer, "  - {:width$} {}", dependency, reason, width = width)
                }
            }
        }
    }

    fn format_summary_line(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let prefix = self.dry_run_prefix(summary);
        let (updated, skipped, failed, created) = (
            summary.updated_count(),
            summary.skipped_count(),
            summary.failed_count(),
            summary.pull_requests_created(),
        );

        if self.color {
            writeln!(
                writer,
                "{}{} updated, {} skipped, {} failed, {} pull requests created",
                prefix,
                updated.to_string().green(),
                skipped.to_string().dimmed(),
                if failed > 0 {
                    failed.to_string().red().to_string()
                } else {
                    failed.to_string()
                },
                created.to_string().bold()
            )?;
        } else {
            writeln!(
                writer,
                "{}{} updated, {} skipped, {} failed, {} pull requests created",
                prefix, updated, skipped, failed, created
            )?;
        }

        if summary.cancelled {
            writeln!(writer, "Run cancelled before every dependency was processed")?;
        }
        if summary.budget_exhausted {
            writeln!(writer, "Stopped early: pull request limit reached")?;
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let width = Self::max_name_length(summary);

        for outcome in &summary.outcomes {
            let show = match outcome {
                DependencyOutcome::Failed { .. } => true,
                DependencyOutcome::Updated { .. } => self.verbosity != Verbosity::Quiet,
                DependencyOutcome::Skipped { .. } => self.verbosity == Verbosity::Verbose,
            };
            if show {
                self.format_outcome(outcome, width, writer)?;
            }
        }

        if !summary.outcomes.is_empty() && self.verbosity != Verbosity::Quiet {
            writeln!(writer)?;
        }
        self.format_summary_line(summary, writer)
    }
}
