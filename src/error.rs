use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Main application error type that encompasses all fatal failure modes
///
/// Diagnostics produced by validation are not errors and never appear here;
/// neither do stage setup failures, which are recorded in the report.
#[derive(Error, Debug)]
pub enum TbxCheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read {path}: {reason}")]
    FileAccess { path: PathBuf, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Dialect detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Schema import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("Report could not be written to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Reasons a document's dialect could not be resolved to a grammar/rule-set pair
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("dialect undetermined: no TBX dialect marker found in {file}")]
    Undetermined { file: PathBuf },

    #[error("resolved grammar unreadable: {path}")]
    ResourceUnreadable { path: PathBuf },

    #[error(
        "no validation files for custom dialect {name}: expected {} and {}",
        grammar.display(),
        ruleset.display()
    )]
    CustomDialectUnresolved {
        name: String,
        grammar: PathBuf,
        ruleset: PathBuf,
    },

    #[error("document could not be scanned: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DetectionError {
    /// Short reason string used in the report
    pub fn reason(&self) -> &'static str {
        match self {
            DetectionError::Undetermined { .. } => "dialect undetermined",
            DetectionError::ResourceUnreadable { .. } => "resolved grammar unreadable",
            DetectionError::CustomDialectUnresolved { .. } => "custom dialect unresolved",
            DetectionError::Io { .. } => "document unreadable",
        }
    }

    /// Whether the failure is about the document itself rather than missing schema files
    pub fn is_io(&self) -> bool {
        matches!(self, DetectionError::Io { .. })
    }
}

/// Custom schema import errors
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(
        "Unable to find dialect name in file name {file_name}. Please include the name of the \
         dialect in your file name, surrounded by underscores. For example: \
         \"my_file_TBX-Example_version_1.rng\""
    )]
    NoDialectName { file_name: String },

    #[error("Unsupported schema file {path}: expected a .rng or .sch file")]
    UnsupportedExtension { path: PathBuf },

    #[error("Schema file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Failed to install {path}: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibXml2Error {
    #[error("RELAX NG grammar could not be parsed: {path}{}", format_details(details))]
    RelaxNgParseFailed { path: PathBuf, details: String },

    #[error("Schematron rule-set could not be parsed: {path}{}", format_details(details))]
    SchematronParseFailed { path: PathBuf, details: String },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Validation failed with code {code}: {file}")]
    ValidationFailed { code: i32, file: PathBuf },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },
}

fn format_details(details: &str) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" - {}", details)
    }
}

impl From<LibXml2Error> for TbxCheckError {
    fn from(err: LibXml2Error) -> Self {
        TbxCheckError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

impl From<ConfigError> for TbxCheckError {
    fn from(err: ConfigError) -> Self {
        TbxCheckError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TbxCheckError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
