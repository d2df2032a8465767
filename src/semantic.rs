//! Semantic (Schematron) validation stage

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostic::SemanticDiagnostic;
use crate::error::LibXml2Error;
use crate::libxml2::{
    LibXml2Wrapper, SCHEMATRON_ASSERT_CODE, SCHEMATRON_REPORT_CODE, XML_PARSE_NONET,
    XmlErrorLevel, XmlEvent,
};

/// libxml2 formats rule output as `<node path> line <n>: <text>`
static RULE_MESSAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_rule_message_regex() -> &'static Regex {
    RULE_MESSAGE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^(\S*) line (\d+): (.*)$").expect("Failed to compile rule message regex")
    })
}

/// The semantic stage could not run. Structural results are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticSetupError {
    #[error("Schematron rule-set {} is not usable: {details}", path.display())]
    RulesetMalformed { path: PathBuf, details: String },

    #[error("document {} could not be parsed for rule evaluation", path.display())]
    DocumentUnparsable { path: PathBuf },

    #[error("Schematron engine failure: {details}")]
    Engine { details: String },
}

/// One event emitted while applying a rule-set, in engine order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SemanticEvent {
    /// An `assert` whose test was false: a rule violation
    FailedAssert {
        location: String,
        line: u32,
        text: String,
    },
    /// A `report` whose test was true: informational
    SuccessfulReport {
        location: String,
        line: u32,
        text: String,
    },
    /// A warning the engine raised while evaluating rules
    EngineMessage { message: String },
}

/// An error the engine raised while evaluating a rule (an XPath failure, say) means
/// that rule's verdict is unknown
fn is_engine_error(event: &XmlEvent) -> bool {
    event.code != SCHEMATRON_ASSERT_CODE
        && event.code != SCHEMATRON_REPORT_CODE
        && event.level >= XmlErrorLevel::Error
}

impl SemanticEvent {
    fn from_xml_event(event: XmlEvent) -> Self {
        let (location, line, text) = split_rule_message(&event.message, event.line);
        match event.code {
            SCHEMATRON_ASSERT_CODE => SemanticEvent::FailedAssert {
                location,
                line,
                text,
            },
            SCHEMATRON_REPORT_CODE => SemanticEvent::SuccessfulReport {
                location,
                line,
                text,
            },
            _ => SemanticEvent::EngineMessage {
                message: event.message,
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SemanticEvent::FailedAssert { .. })
    }
}

fn split_rule_message(message: &str, fallback_line: u32) -> (String, u32, String) {
    match get_rule_message_regex().captures(message) {
        Some(caps) => (
            caps[1].to_string(),
            caps[2].parse().unwrap_or(fallback_line),
            caps[3].trim().to_string(),
        ),
        None => (String::new(), fallback_line, message.trim().to_string()),
    }
}

/// Outcome of a completed semantic pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticResult {
    pub valid: bool,
    pub diagnostics: Vec<SemanticDiagnostic>,
    /// Every event, failures included, for audit
    pub events: Vec<SemanticEvent>,
}

impl SemanticResult {
    /// Diagnostics are exactly the failed assertions
    pub fn from_events(events: Vec<SemanticEvent>) -> Self {
        let diagnostics: Vec<SemanticDiagnostic> = events
            .iter()
            .filter_map(|event| match event {
                SemanticEvent::FailedAssert { line, text, .. } => Some(SemanticDiagnostic {
                    rule_text: text.clone(),
                    line: *line,
                }),
                _ => None,
            })
            .collect();

        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
            events,
        }
    }

    pub fn informational_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_failure()).count()
    }
}

/// Applies a Schematron rule-set to documents
pub struct SemanticValidator {
    libxml2: LibXml2Wrapper,
}

impl SemanticValidator {
    pub fn new() -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
        }
    }

    /// Validate `document` against `ruleset`
    pub fn validate_semantics(
        &self,
        document: &Path,
        ruleset: &Path,
    ) -> Result<SemanticResult, SemanticSetupError> {
        let schema = self
            .libxml2
            .parse_schematron(ruleset)
            .map_err(|err| match err {
                LibXml2Error::SchematronParseFailed { path, details } => {
                    SemanticSetupError::RulesetMalformed {
                        path,
                        details: if details.is_empty() {
                            "not a usable Schematron schema".to_string()
                        } else {
                            details
                        },
                    }
                }
                other => SemanticSetupError::RulesetMalformed {
                    path: ruleset.to_path_buf(),
                    details: other.to_string(),
                },
            })?;

        let load = self
            .libxml2
            .read_document(document, XML_PARSE_NONET)
            .map_err(|err| SemanticSetupError::Engine {
                details: err.to_string(),
            })?;
        let doc = load
            .document
            .ok_or_else(|| SemanticSetupError::DocumentUnparsable {
                path: document.to_path_buf(),
            })?;

        let events = self
            .libxml2
            .validate_schematron(&schema, &doc, document)
            .map_err(|err| SemanticSetupError::Engine {
                details: err.to_string(),
            })?;

        let engine_errors: Vec<&str> = events
            .iter()
            .filter(|event| is_engine_error(event))
            .map(|event| event.message.as_str())
            .collect();
        if !engine_errors.is_empty() {
            return Err(SemanticSetupError::Engine {
                details: engine_errors.join("; "),
            });
        }

        let events: Vec<SemanticEvent> = events
            .into_iter()
            .map(SemanticEvent::from_xml_event)
            .collect();

        for event in &events {
            if let SemanticEvent::FailedAssert { line, text, .. } = event {
                tracing::debug!(line = *line, "failed assert: {}", text);
            }
        }

        Ok(SemanticResult::from_events(events))
    }
}

impl Default for SemanticValidator {
    fn default() -> Self {
        Self::new()
    }
}
