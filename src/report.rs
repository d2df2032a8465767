//! Validation report composition and persistence
//!
//! A [`ValidationReport`] is assembled once per run from the detection outcome and
//! the two stage outcomes, rendered to the plain-text layout users know from the
//! checker's results files, and written under a date-based name that never
//! replaces an earlier report.

use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::diagnostic::Diagnostic;
use crate::dialect::DialectDescriptor;
use crate::error::{Result, TbxCheckError};
use crate::semantic::SemanticResult;
use crate::structural::StructuralResult;

pub const REPORT_BANNER: &str = "TBX-Checker";
pub const REPORT_TITLE: &str = "Validation Results";
pub const REPORT_SUFFIX: &str = "_TBXChecker-Results";

pub const UNRESOLVED_NOTICE: &str = "Unable to locate validation files for the provided TBX file. \
If you are using a custom dialect, be sure to upload your own validation files.";

/// How far a stage got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed(T),
    /// The stage's own inputs could not be loaded
    SetupFailed(String),
    /// The stage never ran because an earlier step prevented it
    Skipped(String),
}

impl<T> StageOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }
}

/// Result of dialect detection as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectionOutcome {
    Resolved(DialectDescriptor),
    Failed { reason: String, details: String },
    /// The validator does not select schemas by dialect
    NotApplicable { description: String },
}

impl DetectionOutcome {
    pub fn descriptor(&self) -> Option<&DialectDescriptor> {
        match self {
            DetectionOutcome::Resolved(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DetectionOutcome::Failed { .. })
    }
}

/// Which validator produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    /// TBX v3: RELAX NG grammar plus Schematron rules
    Tbx3,
    /// TBX v2: DTD validation plus the language-tag check
    LegacyTbx2,
}

impl ValidatorKind {
    /// What the structural verdict line says the document was checked against
    fn structural_target(&self) -> &'static str {
        match self {
            ValidatorKind::Tbx3 => "the RNG file",
            ValidatorKind::LegacyTbx2 => "the DTD",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValidatorKind::Tbx3 => "TBX v3 (RNG + Schematron)",
            ValidatorKind::LegacyTbx2 => "TBX v2 (DTD)",
        }
    }
}

/// Everything one validation run found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub timestamp: DateTime<Local>,
    pub source: PathBuf,
    pub validator: ValidatorKind,
    pub detection: DetectionOutcome,
    pub structural: StageOutcome<StructuralResult>,
    pub semantic: StageOutcome<SemanticResult>,
}

impl ValidationReport {
    /// Report for a run whose dialect could not be resolved; neither stage runs
    pub fn detection_failed(
        source: impl Into<PathBuf>,
        validator: ValidatorKind,
        reason: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        Self {
            timestamp: Local::now(),
            source: source.into(),
            validator,
            structural: StageOutcome::Skipped(format!("dialect detection failed ({})", reason)),
            semantic: StageOutcome::Skipped(format!("dialect detection failed ({})", reason)),
            detection: DetectionOutcome::Failed {
                reason,
                details: details.into(),
            },
        }
    }

    pub fn structural_valid(&self) -> bool {
        self.structural.completed().is_some_and(|r| r.valid)
    }

    pub fn semantic_valid(&self) -> bool {
        match &self.semantic {
            StageOutcome::Completed(result) => result.valid,
            // the legacy validator has no semantic stage
            StageOutcome::Skipped(_) => self.validator == ValidatorKind::LegacyTbx2,
            StageOutcome::SetupFailed(_) => false,
        }
    }

    /// Whether the document passed everything that was supposed to run
    pub fn is_valid(&self) -> bool {
        !self.detection.is_failed() && self.structural_valid() && self.semantic_valid()
    }

    pub fn structural_error_count(&self) -> usize {
        self.structural
            .completed()
            .map_or(0, |r| r.diagnostics.len())
    }

    pub fn semantic_error_count(&self) -> usize {
        self.semantic.completed().map_or(0, |r| r.diagnostics.len())
    }

    /// Structural then semantic diagnostics as one ordered stream
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let structural = self
            .structural
            .completed()
            .into_iter()
            .flat_map(|r| r.diagnostics.iter().cloned().map(Diagnostic::from));
        let semantic = self
            .semantic
            .completed()
            .into_iter()
            .flat_map(|r| r.diagnostics.iter().cloned().map(Diagnostic::from));
        structural.chain(semantic).collect()
    }
}

/// A written report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub contents: String,
}

/// Renders reports and writes them under non-colliding names
#[derive(Debug, Clone)]
pub struct ReportComposer {
    output_dir: PathBuf,
}

impl ReportComposer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// First free `<date>_TBXChecker-Results[-n].txt` in the output directory
    pub fn next_artifact_path(&self, date: NaiveDate) -> PathBuf {
        let stem = format!("{}{}", date.format("%Y-%m-%d"), REPORT_SUFFIX);
        let first = self.output_dir.join(format!("{}.txt", stem));
        if !first.exists() {
            return first;
        }

        (0u64..)
            .map(|n| self.output_dir.join(format!("{}-{}.txt", stem, n)))
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }

    /// Render the report text
    pub fn render(&self, report: &ValidationReport) -> String {
        let saved_to = fs::canonicalize(&self.output_dir).unwrap_or_else(|_| self.output_dir.clone());
        let mut out = String::new();

        out.push_str(REPORT_BANNER);
        out.push('\n');
        out.push_str(REPORT_TITLE);
        out.push('\n');
        out.push_str(&report.timestamp.format("%H:%M:%S - %Y-%m-%d").to_string());
        out.push_str(&format!("\nFile saved to: {}\n\n", saved_to.display()));

        out.push_str(&format!("Validated file:\n{}\n\n", report.source.display()));

        let (grammar, ruleset) = match &report.detection {
            DetectionOutcome::Resolved(descriptor) => (
                descriptor.grammar_path.display().to_string(),
                descriptor.ruleset_path.display().to_string(),
            ),
            DetectionOutcome::NotApplicable { .. } => {
                ("not used".to_string(), "not used".to_string())
            }
            DetectionOutcome::Failed { .. } => ("none".to_string(), "none".to_string()),
        };
        out.push_str("Current rng validation file path:\n");
        out.push_str(&grammar);
        out.push_str("\nCurrent sch validation file path:\n");
        out.push_str(&ruleset);
        out.push_str("\n\n\n");

        match &report.detection {
            DetectionOutcome::Resolved(descriptor) => out.push_str(&descriptor.detection_message),
            DetectionOutcome::Failed { details, .. } => {
                out.push_str(UNRESOLVED_NOTICE);
                if !details.is_empty() {
                    out.push_str(&format!("\n({})", details));
                }
            }
            DetectionOutcome::NotApplicable { description } => out.push_str(description),
        }
        out.push_str("\n\n\n");

        let target = report.validator.structural_target();
        match &report.structural {
            StageOutcome::Completed(result) if result.valid => {
                out.push_str(&format!("Valid! Successful validation against {}.\n", target));
            }
            StageOutcome::Completed(result) => {
                out.push_str(&format!(
                    "Invalid! Unsuccessful validation against {}. See errors below:\n\n",
                    target
                ));
                out.push_str("(Line:Column)\n");
                for diagnostic in &result.diagnostics {
                    out.push_str(&format!("\t{}\n\n", diagnostic));
                }
                out.push_str("\n\n");
            }
            StageOutcome::SetupFailed(reason) => {
                out.push_str(&format!(
                    "Validation against {} could not be performed: {}\n",
                    target, reason
                ));
            }
            StageOutcome::Skipped(reason) => {
                out.push_str(&format!("Validation against {} was skipped: {}\n", target, reason));
            }
        }

        match &report.semantic {
            StageOutcome::Completed(result) if result.valid => {
                out.push_str("Valid! Successful validation against the SCH file.\n");
            }
            StageOutcome::Completed(result) => {
                out.push_str("Invalid! Unsuccessful validation against the SCH file.\n");
                for diagnostic in &result.diagnostics {
                    out.push_str(&format!("\t{}\n\n", diagnostic));
                }
            }
            StageOutcome::SetupFailed(reason) => {
                out.push_str(&format!(
                    "Validation against the SCH file could not be performed: {}\n",
                    reason
                ));
            }
            StageOutcome::Skipped(reason) => {
                out.push_str(&format!(
                    "Validation against the SCH file was skipped: {}\n",
                    reason
                ));
            }
        }

        out
    }

    /// Render and persist the report.
    ///
    /// The text is staged in a temporary file inside the output directory and
    /// moved into place without replacing anything; a name taken in the meantime
    /// moves on to the next suffix.
    pub fn compose(&self, report: &ValidationReport) -> Result<ReportArtifact> {
        let contents = self.render(report);

        let write_err = |path: &Path, source: io::Error| TbxCheckError::ReportWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut staged =
            NamedTempFile::new_in(&self.output_dir).map_err(|e| write_err(&self.output_dir, e))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| write_err(staged.path(), e))?;

        let date = report.timestamp.date_naive();
        loop {
            let path = self.next_artifact_path(date);
            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(path = %path.display(), "report written");
                    return Ok(ReportArtifact { path, contents });
                }
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "report name taken, retrying");
                    staged = err.file;
                }
                Err(err) => return Err(write_err(&path, err.error)),
            }
        }
    }
}

/// Open a written report with the platform's default viewer
pub fn open_in_viewer(path: &Path) -> Result<()> {
    let status = if cfg!(target_os = "windows") {
        Command::new("cmd").arg("/C").arg("start").arg("").arg(path).status()
    } else if cfg!(target_os = "macos") {
        Command::new("open").arg(path).status()
    } else {
        Command::new("xdg-open").arg(path).status()
    }?;

    if !status.success() {
        tracing::warn!(path = %path.display(), %status, "viewer exited unsuccessfully");
    }
    Ok(())
}
