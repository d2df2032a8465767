//! Console summaries
//!
//! The full results live in the report file; this prints the short version.

use std::path::Path;

use crate::cli::VerbosityLevel;
use crate::diagnostic::Diagnostic;
use crate::importer::ImportedSchema;
use crate::report::{DetectionOutcome, StageOutcome, ValidationReport};
use crate::sync::SyncSummary;

/// Human-readable console formatter
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits escape codes
    pub fn plain(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn verdict(&self, valid: bool) -> String {
        if valid {
            self.colorize("✓ VALID", "32")
        } else {
            self.colorize("✗ INVALID", "31")
        }
    }

    fn stage_line<T>(
        &self,
        label: &str,
        outcome: &StageOutcome<T>,
        summary: impl Fn(&T) -> (bool, usize),
    ) -> String {
        match outcome {
            StageOutcome::Completed(result) => {
                let (valid, count) = summary(result);
                if valid {
                    format!("  {} {}\n", label, self.colorize("valid", "32"))
                } else {
                    format!(
                        "  {} {} - {} error{}\n",
                        label,
                        self.colorize("invalid", "31"),
                        count,
                        if count == 1 { "" } else { "s" }
                    )
                }
            }
            StageOutcome::SetupFailed(reason) => {
                format!("  {} {} - {}\n", label, self.colorize("not run", "33"), reason)
            }
            StageOutcome::Skipped(reason) => {
                format!("  {} {} - {}\n", label, self.colorize("skipped", "36"), reason)
            }
        }
    }

    pub fn format_report(&self, report: &ValidationReport, artifact: &Path) -> String {
        let mut output = format!(
            "{}  {}\n",
            self.verdict(report.is_valid()),
            report.source.display()
        );

        if self.verbosity == VerbosityLevel::Quiet {
            return output;
        }

        match &report.detection {
            DetectionOutcome::Resolved(descriptor) => {
                output.push_str(&format!("  Dialect: {}\n", descriptor.name));
            }
            DetectionOutcome::Failed { reason, .. } => {
                output.push_str(&format!(
                    "  Dialect: {} ({})\n",
                    self.colorize("unresolved", "33"),
                    reason
                ));
            }
            DetectionOutcome::NotApplicable { .. } => {
                output.push_str(&format!("  Validator: {}\n", report.validator.label()));
            }
        }

        output.push_str(&self.stage_line("Structure:", &report.structural, |r| {
            (r.valid, r.diagnostics.len())
        }));
        output.push_str(&self.stage_line("Rules:    ", &report.semantic, |r| {
            (r.valid, r.diagnostics.len())
        }));

        if self.verbosity >= VerbosityLevel::Verbose {
            for diagnostic in report.diagnostics() {
                let tag = match &diagnostic {
                    Diagnostic::Structural(d) => d.severity.to_string(),
                    Diagnostic::Semantic(_) => "rule".to_string(),
                };
                output.push_str(&format!("    [{}] {}\n", tag, diagnostic));
            }
        }

        output.push_str(&format!("  Report: {}\n", artifact.display()));
        output
    }

    pub fn format_import(&self, imported: &ImportedSchema) -> String {
        format!(
            "{}  {} installed for dialect {}\n",
            self.colorize("✓ IMPORTED", "32"),
            imported.installed_path.display(),
            imported.dialect
        )
    }

    pub fn format_sync(&self, summary: &SyncSummary) -> String {
        let mut output = format!(
            "{}  {} files, {} bytes\n",
            self.colorize("✓ SYNCED", "32"),
            summary.files.len(),
            summary.total_bytes()
        );
        if self.verbosity >= VerbosityLevel::Verbose {
            for file in &summary.files {
                output.push_str(&format!("    {} <- {}\n", file.path.display(), file.url));
            }
        }
        output
    }
}
