//! # tbx-check Library
//!
//! Detects which TBX dialect a terminology file declares, validates it against that
//! dialect's RELAX NG grammar and Schematron rule-set through libxml2, and writes a
//! single results file covering both passes.

pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod dialect;
pub mod error;
pub mod http_client;
pub mod importer;
pub mod legacy;
pub mod libxml2;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod semantic;
pub mod structural;
pub mod sync;

pub use cli::{Cli, Command, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use diagnostic::{Diagnostic, SemanticDiagnostic, Severity, StructuralDiagnostic};
pub use dialect::{DialectDescriptor, DialectDetector, DialectKind, SchemaLayout};
pub use error::{DetectionError, ImportError, LibXml2Error, Result, TbxCheckError};
pub use http_client::{HttpClientConfig, SchemaHttpClient};
pub use importer::{ImportedSchema, SchemaImporter};
pub use legacy::LegacyValidator;
pub use libxml2::LibXml2Wrapper;
pub use output::Output;
pub use pipeline::{DocumentValidator, PipelineConfig, Tbx3Validator, TbxVersion, validator_for};
pub use report::{
    DetectionOutcome, ReportArtifact, ReportComposer, StageOutcome, ValidationReport,
    ValidatorKind,
};
pub use semantic::{SemanticEvent, SemanticResult, SemanticSetupError, SemanticValidator};
pub use structural::{StructuralResult, StructuralSetupError, StructuralValidator};
pub use sync::{SchemaFetcher, SchemaSync, SyncSummary};
