//! Structural (RELAX NG) validation stage

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostic::{Severity, StructuralDiagnostic};
use crate::error::LibXml2Error;
use crate::libxml2::{LibXml2Wrapper, XML_PARSE_NONET, XmlEvent};

/// The grammar could not be loaded; nothing after it can run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("RELAX NG grammar {} could not be loaded: {details}", path.display())]
pub struct StructuralSetupError {
    pub path: PathBuf,
    pub details: String,
}

/// Outcome of a completed structural pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralResult {
    pub valid: bool,
    pub diagnostics: Vec<StructuralDiagnostic>,
}

impl StructuralResult {
    /// `valid` is derived from the diagnostics, never set independently
    pub fn from_diagnostics(diagnostics: Vec<StructuralDiagnostic>) -> Self {
        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Validates documents against a RELAX NG grammar, collecting every event
pub struct StructuralValidator {
    libxml2: LibXml2Wrapper,
}

impl StructuralValidator {
    pub fn new() -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
        }
    }

    /// Validate `document` against `grammar`.
    ///
    /// Well-formedness problems found while reading the document are diagnostics
    /// too; only a grammar that fails to load is an error.
    pub fn validate_structure(
        &self,
        document: &Path,
        grammar: &Path,
    ) -> Result<StructuralResult, StructuralSetupError> {
        let schema = self
            .libxml2
            .parse_relaxng(grammar)
            .map_err(|err| setup_error(grammar, err))?;

        let load = self
            .libxml2
            .read_document(document, XML_PARSE_NONET)
            .map_err(|err| setup_error(grammar, err))?;

        let mut diagnostics = position_diagnostics(document, load.events);

        let Some(doc) = load.document else {
            if diagnostics.is_empty() {
                diagnostics.push(StructuralDiagnostic::new(
                    0,
                    0,
                    Severity::Fatal,
                    format!("{} could not be parsed", document.display()),
                ));
            }
            tracing::debug!(file = %document.display(), "document is not well-formed");
            return Ok(StructuralResult::from_diagnostics(diagnostics));
        };

        match self.libxml2.validate_relaxng(&schema, &doc, document) {
            Ok((code, events)) => {
                let reported = events.len();
                diagnostics.extend(position_diagnostics(document, events));
                if code > 0 && reported == 0 {
                    diagnostics.push(StructuralDiagnostic::new(
                        0,
                        0,
                        Severity::Error,
                        "document does not match the RELAX NG grammar",
                    ));
                }
            }
            Err(err) => {
                diagnostics.push(StructuralDiagnostic::new(
                    0,
                    0,
                    Severity::Fatal,
                    err.to_string(),
                ));
            }
        }

        for diagnostic in &diagnostics {
            tracing::debug!(
                line = diagnostic.line,
                column = diagnostic.column,
                severity = %diagnostic.severity,
                "{}",
                diagnostic.message
            );
        }

        Ok(StructuralResult::from_diagnostics(diagnostics))
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-based column of the first start tag of `element` on `line`, prefix ignored
fn start_tag_column(line: &str, element: &str) -> Option<u32> {
    for (column, (offset, ch)) in line.char_indices().enumerate() {
        if ch != '<' {
            continue;
        }
        let rest = &line[offset + 1..];
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let qname = &rest[..end];
        let local = qname.rsplit(':').next().unwrap_or(qname);
        if local == element {
            return Some(column as u32 + 1);
        }
    }
    None
}

/// Turn engine events into diagnostics. Grammar and DTD validity events carry a line
/// and the offending element but no column; those get the column of that element's
/// start tag on the reported line, or stay at 0 when it cannot be found.
pub(crate) fn position_diagnostics(document: &Path, events: Vec<XmlEvent>) -> Vec<StructuralDiagnostic> {
    let needs_column = events
        .iter()
        .any(|e| e.column == 0 && e.line > 0 && e.element.is_some());
    let lines: Vec<String> = if needs_column {
        fs::read(document)
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    events
        .into_iter()
        .map(|event| {
            let column = match (&event.element, event.column) {
                (Some(element), 0) if event.line > 0 => lines
                    .get(event.line as usize - 1)
                    .and_then(|line| start_tag_column(line, element))
                    .unwrap_or(0),
                _ => event.column,
            };
            let mut diagnostic = StructuralDiagnostic::from(event);
            diagnostic.column = column;
            diagnostic
        })
        .collect()
}

fn setup_error(grammar: &Path, err: LibXml2Error) -> StructuralSetupError {
    let details = match err {
        LibXml2Error::RelaxNgParseFailed { details, .. } if !details.is_empty() => details,
        other => other.to_string(),
    };
    StructuralSetupError {
        path: grammar.to_path_buf(),
        details,
    }
}
