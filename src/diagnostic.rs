//! Diagnostics collected by the validation stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::libxml2::{XmlErrorLevel, XmlEvent};

/// Severity of a structural diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl From<XmlErrorLevel> for Severity {
    fn from(level: XmlErrorLevel) -> Self {
        match level {
            XmlErrorLevel::Warning => Severity::Warning,
            XmlErrorLevel::Error => Severity::Error,
            XmlErrorLevel::Fatal => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// A positioned event from the grammar (or DTD) pass. Column 0 means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralDiagnostic {
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

impl StructuralDiagnostic {
    pub fn new(line: u32, column: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            severity,
            message: message.into(),
        }
    }
}

impl From<XmlEvent> for StructuralDiagnostic {
    fn from(event: XmlEvent) -> Self {
        Self {
            line: event.line,
            column: event.column,
            severity: event.level.into(),
            message: event.message,
        }
    }
}

impl fmt::Display for StructuralDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column == 0 {
            write!(f, "({}) {}", self.line, self.message)
        } else {
            write!(f, "({}:{}) {}", self.line, self.column, self.message)
        }
    }
}

/// A failed Schematron assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticDiagnostic {
    pub rule_text: String,
    /// Line of the node the rule fired on, 0 when unknown
    pub line: u32,
}

impl fmt::Display for SemanticDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule_text)
    }
}

/// Either kind of diagnostic, for consumers that want one ordered stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Diagnostic {
    Structural(StructuralDiagnostic),
    Semantic(SemanticDiagnostic),
}

impl From<StructuralDiagnostic> for Diagnostic {
    fn from(d: StructuralDiagnostic) -> Self {
        Diagnostic::Structural(d)
    }
}

impl From<SemanticDiagnostic> for Diagnostic {
    fn from(d: SemanticDiagnostic) -> Self {
        Diagnostic::Semantic(d)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Structural(d) => d.fmt(f),
            Diagnostic::Semantic(d) => d.fmt(f),
        }
    }
}
