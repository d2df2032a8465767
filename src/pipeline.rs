//! The validation pipeline: detection, structural pass, semantic pass, report
//!
//! Which validator runs is decided by [`PipelineConfig::version`]. Both variants
//! implement [`DocumentValidator`] and produce the same [`ValidationReport`].

use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::dialect::{DialectDetector, SchemaLayout};
use crate::error::{Result, TbxCheckError};
use crate::legacy::LegacyValidator;
use crate::report::{
    DetectionOutcome, ReportArtifact, ReportComposer, StageOutcome, ValidationReport,
    ValidatorKind,
};
use crate::semantic::SemanticValidator;
use crate::structural::StructuralValidator;

/// Extensions accepted for documents to validate
pub const DOCUMENT_EXTENSIONS: [&str; 2] = ["xml", "tbx"];

/// TBX major version, selecting the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TbxVersion {
    V2,
    #[default]
    V3,
}

impl TryFrom<u8> for TbxVersion {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            2 => Ok(TbxVersion::V2),
            3 => Ok(TbxVersion::V3),
            other => Err(format!("unsupported TBX version {} (expected 2 or 3)", other)),
        }
    }
}

impl From<TbxVersion> for u8 {
    fn from(version: TbxVersion) -> Self {
        match version {
            TbxVersion::V2 => 2,
            TbxVersion::V3 => 3,
        }
    }
}

impl FromStr for TbxVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        trimmed
            .parse::<u8>()
            .map_err(|_| format!("invalid TBX version '{}'", s))
            .and_then(TbxVersion::try_from)
    }
}

impl fmt::Display for TbxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Everything a run needs to know, passed explicitly
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub version: TbxVersion,
    pub layout: SchemaLayout,
    pub check_xml_lang: bool,
    pub continue_scan_on_unresolved: bool,
}

impl PipelineConfig {
    pub fn new(layout: SchemaLayout) -> Self {
        Self {
            version: TbxVersion::V3,
            layout,
            check_xml_lang: true,
            continue_scan_on_unresolved: false,
        }
    }
}

/// A way of validating a document end to end
pub trait DocumentValidator: Send + Sync {
    fn kind(&self) -> ValidatorKind;

    /// Validate one document. Diagnostics and stage setup failures end up in the
    /// report; only failures reading the document itself are errors.
    fn validate(&self, document: &Path) -> Result<ValidationReport>;
}

/// TBX v3: dialect detection, RELAX NG, then Schematron
pub struct Tbx3Validator {
    detector: DialectDetector,
    structural: StructuralValidator,
    semantic: SemanticValidator,
}

impl Tbx3Validator {
    pub fn new(detector: DialectDetector) -> Self {
        Self {
            detector,
            structural: StructuralValidator::new(),
            semantic: SemanticValidator::new(),
        }
    }
}

impl DocumentValidator for Tbx3Validator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Tbx3
    }

    fn validate(&self, document: &Path) -> Result<ValidationReport> {
        let timestamp = Local::now();

        let descriptor = match self.detector.detect(document) {
            Ok(descriptor) => descriptor,
            Err(err) if err.is_io() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(file = %document.display(), reason = err.reason(), "{}", err);
                let mut report = ValidationReport::detection_failed(
                    document,
                    ValidatorKind::Tbx3,
                    err.reason(),
                    err.to_string(),
                );
                report.timestamp = timestamp;
                return Ok(report);
            }
        };
        tracing::info!(dialect = %descriptor.name, "{}", descriptor.detection_message);

        let (structural, semantic) = match self
            .structural
            .validate_structure(document, &descriptor.grammar_path)
        {
            Err(err) => {
                tracing::warn!("{}", err);
                (
                    StageOutcome::SetupFailed(err.to_string()),
                    StageOutcome::Skipped("the RELAX NG grammar could not be loaded".to_string()),
                )
            }
            Ok(structural) => {
                tracing::info!(
                    valid = structural.valid,
                    diagnostics = structural.diagnostics.len(),
                    "RELAX NG validation finished"
                );
                let semantic = match self
                    .semantic
                    .validate_semantics(document, &descriptor.ruleset_path)
                {
                    Ok(semantic) => {
                        tracing::info!(
                            valid = semantic.valid,
                            failed_asserts = semantic.diagnostics.len(),
                            informational = semantic.informational_count(),
                            "Schematron validation finished"
                        );
                        StageOutcome::Completed(semantic)
                    }
                    Err(err) => {
                        tracing::warn!("{}", err);
                        StageOutcome::SetupFailed(err.to_string())
                    }
                };
                (StageOutcome::Completed(structural), semantic)
            }
        };

        Ok(ValidationReport {
            timestamp,
            source: document.to_path_buf(),
            validator: ValidatorKind::Tbx3,
            detection: DetectionOutcome::Resolved(descriptor),
            structural,
            semantic,
        })
    }
}

/// Build the validator the configuration asks for
pub fn validator_for(config: &PipelineConfig) -> Box<dyn DocumentValidator> {
    match config.version {
        TbxVersion::V3 => {
            let detector = DialectDetector::new(config.layout.clone())
                .continue_scan_on_unresolved(config.continue_scan_on_unresolved);
            Box::new(Tbx3Validator::new(detector))
        }
        TbxVersion::V2 => Box::new(LegacyValidator::new(config.check_xml_lang)),
    }
}

/// Reject anything that is not a readable `.xml`/`.tbx` regular file
pub fn check_document(path: &Path) -> Result<()> {
    let access = |reason: &str| TbxCheckError::FileAccess {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let extension_ok = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        });
    if !extension_ok {
        return Err(access("expected a .xml or .tbx file"));
    }

    let metadata = fs::metadata(path).map_err(|e| access(&e.to_string()))?;
    if !metadata.is_file() {
        return Err(access("not a regular file"));
    }
    File::open(path).map_err(|e| access(&e.to_string()))?;
    Ok(())
}

/// Validate `document` and write its report
pub fn run(
    config: &PipelineConfig,
    document: &Path,
    composer: &ReportComposer,
) -> Result<(ValidationReport, ReportArtifact)> {
    check_document(document)?;

    let validator = validator_for(config);
    tracing::info!(
        file = %document.display(),
        validator = validator.kind().label(),
        "validating"
    );

    let report = validator.validate(document)?;
    let artifact = composer.compose(&report)?;
    Ok((report, artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tbx_version_parsing() {
        assert_eq!("3".parse::<TbxVersion>().unwrap(), TbxVersion::V3);
        assert_eq!("v2".parse::<TbxVersion>().unwrap(), TbxVersion::V2);
        assert!("4".parse::<TbxVersion>().is_err());
        assert!("three".parse::<TbxVersion>().is_err());
        assert_eq!(TbxVersion::default(), TbxVersion::V3);
        assert_eq!(TbxVersion::V2.to_string(), "2");
    }

    #[test]
    fn test_tbx_version_serde_as_number() {
        let json = serde_json::to_string(&TbxVersion::V2).unwrap();
        assert_eq!(json, "2");
        assert_eq!(serde_json::from_str::<TbxVersion>("3").unwrap(), TbxVersion::V3);
        assert!(serde_json::from_str::<TbxVersion>("1").is_err());
    }

    #[test]
    fn test_validator_for_selects_by_version() {
        let mut config = PipelineConfig::new(SchemaLayout::new("schemas"));
        assert_eq!(validator_for(&config).kind(), ValidatorKind::Tbx3);

        config.version = TbxVersion::V2;
        assert_eq!(validator_for(&config).kind(), ValidatorKind::LegacyTbx2);
    }

    #[test]
    fn test_check_document() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("glossary.TBX");
        fs::write(&good, "<tbx/>").unwrap();
        assert!(check_document(&good).is_ok());

        let wrong_ext = dir.path().join("glossary.txt");
        fs::write(&wrong_ext, "<tbx/>").unwrap();
        assert!(matches!(
            check_document(&wrong_ext),
            Err(TbxCheckError::FileAccess { .. })
        ));

        assert!(check_document(&dir.path().join("missing.xml")).is_err());

        let directory = dir.path().join("folder.xml");
        fs::create_dir(&directory).unwrap();
        assert!(check_document(&directory).is_err());
    }

    #[test]
    fn test_detection_io_error_propagates() {
        let dir = TempDir::new().unwrap();
        let validator = Tbx3Validator::new(DialectDetector::new(SchemaLayout::new(dir.path())));
        let result = validator.validate(&dir.path().join("gone.tbx"));
        assert!(matches!(result, Err(TbxCheckError::Detection(_))));
    }
}
