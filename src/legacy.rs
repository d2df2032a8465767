//! TBX v2 validation: DTD validity plus the `xml:lang` shape check

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::Local;

use crate::diagnostic::{Severity, StructuralDiagnostic};
use crate::error::{Result, TbxCheckError};
use crate::libxml2::{
    LibXml2Wrapper, XML_PARSE_DTDATTR, XML_PARSE_DTDLOAD, XML_PARSE_DTDVALID, XML_PARSE_NONET,
};
use crate::pipeline::DocumentValidator;
use crate::report::{DetectionOutcome, StageOutcome, ValidationReport, ValidatorKind};
use crate::structural::{StructuralResult, position_diagnostics};

pub const LEGACY_DIALECT_NAME: &str = "TBX v2 (DTD)";

static XML_LANG_REGEX: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_xml_lang_regex() -> &'static Regex {
    XML_LANG_REGEX.get_or_init(|| {
        Regex::new(r#"xml:lang\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Failed to compile xml:lang regex")
    })
}

fn get_language_tag_regex() -> &'static Regex {
    LANGUAGE_TAG_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{1,8})*$")
            .expect("Failed to compile language tag regex")
    })
}

/// Whether `tag` has the shape of a BCP 47 language tag
pub fn is_well_formed_language_tag(tag: &str) -> bool {
    get_language_tag_regex().is_match(tag)
}

/// One diagnostic per `xml:lang` value that is not shaped like a language tag
pub fn check_language_tags(content: &str) -> Vec<StructuralDiagnostic> {
    let mut diagnostics = Vec::new();

    for (index, line) in content.lines().enumerate() {
        for caps in get_xml_lang_regex().captures_iter(line) {
            let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if is_well_formed_language_tag(value.as_str()) {
                continue;
            }
            let column = line[..value.start()].chars().count() + 1;
            diagnostics.push(StructuralDiagnostic::new(
                (index + 1) as u32,
                column as u32,
                Severity::Error,
                format!(
                    "xml:lang value \"{}\" is not a valid language tag",
                    value.as_str()
                ),
            ));
        }
    }

    diagnostics
}

/// Validates TBX v2 documents against the DTD they declare
pub struct LegacyValidator {
    libxml2: LibXml2Wrapper,
    check_xml_lang: bool,
}

impl LegacyValidator {
    pub fn new(check_xml_lang: bool) -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
            check_xml_lang,
        }
    }

    fn validate_dtd(&self, document: &Path) -> Result<Vec<StructuralDiagnostic>> {
        let options = XML_PARSE_DTDLOAD | XML_PARSE_DTDATTR | XML_PARSE_DTDVALID | XML_PARSE_NONET;
        let load = self.libxml2.read_document(document, options)?;

        let mut diagnostics = position_diagnostics(document, load.events);
        if load.document.is_none() && diagnostics.is_empty() {
            diagnostics.push(StructuralDiagnostic::new(
                0,
                0,
                Severity::Fatal,
                format!("{} could not be parsed", document.display()),
            ));
        }
        Ok(diagnostics)
    }
}

impl DocumentValidator for LegacyValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::LegacyTbx2
    }

    fn validate(&self, document: &Path) -> Result<ValidationReport> {
        let timestamp = Local::now();
        let mut diagnostics = self.validate_dtd(document)?;

        if self.check_xml_lang {
            let bytes = fs::read(document).map_err(|e| TbxCheckError::FileAccess {
                path: document.to_path_buf(),
                reason: e.to_string(),
            })?;
            let lang_diagnostics = check_language_tags(&String::from_utf8_lossy(&bytes));
            tracing::debug!(count = lang_diagnostics.len(), "xml:lang check finished");
            diagnostics.extend(lang_diagnostics);
        }

        let structural = StructuralResult::from_diagnostics(diagnostics);
        tracing::info!(
            file = %document.display(),
            valid = structural.valid,
            diagnostics = structural.diagnostics.len(),
            "DTD validation finished"
        );

        Ok(ValidationReport {
            timestamp,
            source: document.to_path_buf(),
            validator: ValidatorKind::LegacyTbx2,
            detection: DetectionOutcome::NotApplicable {
                description: format!(
                    "{}: the document is validated against the DTD it declares.",
                    LEGACY_DIALECT_NAME
                ),
            },
            structural: StageOutcome::Completed(structural),
            semantic: StageOutcome::Skipped("TBX v2 documents have no Schematron rule-set".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DTD: &str = r#"<!ELEMENT martif (text)>
<!ATTLIST martif type CDATA #REQUIRED xml:lang CDATA #IMPLIED>
<!ELEMENT text (#PCDATA)>
<!ATTLIST text xml:lang CDATA #IMPLIED>
"#;

    fn write_doc(dir: &TempDir, body: &str) -> std::path::PathBuf {
        fs::write(dir.path().join("martif.dtd"), DTD).unwrap();
        let path = dir.path().join("legacy.tbx");
        fs::write(
            &path,
            format!(
                "<?xml version=\"1.0\"?>\n<!DOCTYPE martif SYSTEM \"martif.dtd\">\n{}",
                body
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_language_tag_shapes() {
        for good in ["en", "EN", "fr-CA", "zh-Hant-TW", "de-1996", "sgn-BE-FR"] {
            assert!(is_well_formed_language_tag(good), "{}", good);
        }
        for bad in ["", "e", "english", "en_US", "en-", "-en", "en-toolongsubtag"] {
            assert!(!is_well_formed_language_tag(bad), "{}", bad);
        }
    }

    #[test]
    fn test_check_language_tags_positions() {
        let content = "<martif xml:lang=\"en\">\n  <text xml:lang='en_US'>x</text>\n  <text xml:lang=\"fr\"/><text xml:lang=\"\"/>\n";
        let diagnostics = check_language_tags(content);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (2, 19));
        assert!(diagnostics[0].message.contains("en_US"));
        assert_eq!(diagnostics[1].line, 3);
        assert_eq!(diagnostics[1].severity, Severity::Error);
    }

    #[test]
    fn test_valid_legacy_document() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, "<martif type=\"TBX\" xml:lang=\"en\"><text>hi</text></martif>\n");

        let report = LegacyValidator::new(true).validate(&path).unwrap();
        assert!(report.is_valid(), "{:?}", report.structural);
        assert_eq!(report.validator, ValidatorKind::LegacyTbx2);
        assert!(report.semantic.is_skipped());
        assert!(matches!(report.detection, DetectionOutcome::NotApplicable { .. }));
    }

    #[test]
    fn test_dtd_violation_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, "<martif><text>hi</text><extra/></martif>\n");

        let report = LegacyValidator::new(false).validate(&path).unwrap();
        assert!(!report.is_valid());
        assert!(report.structural_error_count() >= 1);
    }

    #[test]
    fn test_lang_check_toggle() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(
            &dir,
            "<martif type=\"TBX\" xml:lang=\"english\"><text>hi</text></martif>\n",
        );

        assert!(LegacyValidator::new(false).validate(&path).unwrap().is_valid());

        let checked = LegacyValidator::new(true).validate(&path).unwrap();
        assert!(!checked.is_valid());
        let diagnostics = &checked.structural.completed().unwrap().diagnostics;
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 3);
    }
}
