//! TBX dialect detection
//!
//! Finds the dialect a document declares (`type="TBX-…"` on its root element) with a
//! cheap line scan and resolves it to the grammar/rule-set pair used to validate it.

use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Cached regex for generic dialect markers; names are restricted to what an
/// imported file name can carry, so no separator ever reaches the lookup path
static DIALECT_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_dialect_marker_regex() -> &'static Regex {
    DIALECT_MARKER_REGEX.get_or_init(|| {
        Regex::new(r#"type="TBX-([^"_/\\]+)""#).expect("Failed to compile dialect marker regex")
    })
}

const CORE_MARKER: &str = r#"type="TBX-Core""#;
const MIN_MARKER: &str = r#"type="TBX-Min""#;
const BASIC_MARKER: &str = r#"type="TBX-Basic""#;
const DCA_MARKER: &str = "dca";

/// Directory under the schema root holding user-supplied dialects
pub const DEFAULT_EXTERNAL_DIR: &str = "External_Schemas";

/// Which dialect a descriptor resolves
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialectKind {
    Core,
    Min,
    Basic,
    Custom(String),
}

impl DialectKind {
    /// Dialects shipped with the checker
    pub const BUILT_IN: [DialectKind; 3] = [DialectKind::Core, DialectKind::Min, DialectKind::Basic];

    pub fn name(&self) -> String {
        match self {
            DialectKind::Core => "TBX-Core".to_string(),
            DialectKind::Min => "TBX-Min".to_string(),
            DialectKind::Basic => "TBX-Basic".to_string(),
            DialectKind::Custom(name) => name.clone(),
        }
    }

    pub fn detection_message(&self) -> String {
        match self {
            DialectKind::Custom(name) => format!(
                "The dialect of your file was automatically detected to be the custom dialect {}.",
                name
            ),
            builtin => format!(
                "The dialect of your file was automatically detected to be {}.",
                builtin.name()
            ),
        }
    }
}

/// Resolved dialect: the grammar and rule-set a document is validated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectDescriptor {
    pub kind: DialectKind,
    pub name: String,
    pub grammar_path: PathBuf,
    pub ruleset_path: PathBuf,
    pub detection_message: String,
}

impl DialectDescriptor {
    fn new(kind: DialectKind, grammar_path: PathBuf, ruleset_path: PathBuf) -> Self {
        Self {
            name: kind.name(),
            detection_message: kind.detection_message(),
            kind,
            grammar_path,
            ruleset_path,
        }
    }
}

/// Where grammar and rule-set files live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLayout {
    root: PathBuf,
    external_dir: PathBuf,
}

impl SchemaLayout {
    /// Layout rooted at `root`, with custom dialects under `root/External_Schemas`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let external_dir = root.join(DEFAULT_EXTERNAL_DIR);
        Self { root, external_dir }
    }

    pub fn with_external_dir(mut self, external_dir: impl Into<PathBuf>) -> Self {
        self.external_dir = external_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lookup directory for custom dialects, shared with the importer
    pub fn external_dir(&self) -> &Path {
        &self.external_dir
    }

    /// Grammar and rule-set paths for a dialect
    pub fn pair(&self, kind: &DialectKind) -> (PathBuf, PathBuf) {
        match kind {
            DialectKind::Core => (
                self.root
                    .join("TBX-Core_dialect-master/Schemas/TBXcoreStructV03_TBX-Core_integrated.rng"),
                self.root.join("TBX-Core_dialect-master/Schemas/TBX-Core.sch"),
            ),
            DialectKind::Min => (
                self.root
                    .join("TBX-Min_dialect-master/DCA/TBXcoreStructV03_TBX-Min_integrated.rng"),
                self.root.join("TBX-Min_dialect-master/DCA/TBX-Min_DCA.sch"),
            ),
            DialectKind::Basic => (
                self.root
                    .join("TBX-Basic_dialect-master/DCA/TBXcoreStructV03_TBX-Basic_integrated.rng"),
                self.root.join("TBX-Basic_dialect-master/DCA/TBX-Basic_DCA.sch"),
            ),
            DialectKind::Custom(name) => (
                self.external_dir.join(format!("{}.rng", name)),
                self.external_dir.join(format!("{}.sch", name)),
            ),
        }
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

/// What a single line declares, before any file is checked
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineMarker {
    BuiltIn(DialectKind),
    Custom(String),
}

/// Test one line against the markers in fixed priority order
fn match_line(line: &str) -> Option<LineMarker> {
    if line.contains(CORE_MARKER) {
        return Some(LineMarker::BuiltIn(DialectKind::Core));
    }
    if line.contains(MIN_MARKER) && line.contains(DCA_MARKER) {
        return Some(LineMarker::BuiltIn(DialectKind::Min));
    }
    if line.contains(BASIC_MARKER) && line.contains(DCA_MARKER) {
        return Some(LineMarker::BuiltIn(DialectKind::Basic));
    }
    get_dialect_marker_regex()
        .captures(line)
        .map(|caps| LineMarker::Custom(caps[1].to_string()))
}

/// Line-scanning dialect detector
#[derive(Debug, Clone)]
pub struct DialectDetector {
    layout: SchemaLayout,
    continue_scan_on_unresolved: bool,
}

impl DialectDetector {
    pub fn new(layout: SchemaLayout) -> Self {
        Self {
            layout,
            continue_scan_on_unresolved: false,
        }
    }

    /// Keep scanning after a custom marker whose files are missing instead of failing
    pub fn continue_scan_on_unresolved(mut self, enabled: bool) -> Self {
        self.continue_scan_on_unresolved = enabled;
        self
    }

    pub fn layout(&self) -> &SchemaLayout {
        &self.layout
    }

    /// Detect the dialect of the document at `path`
    pub fn detect(&self, path: &Path) -> Result<DialectDescriptor, DetectionError> {
        let file = File::open(path).map_err(|source| DetectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.detect_from_reader(BufReader::new(file), path)
    }

    /// Detect the dialect from any buffered reader; `source` names it in errors
    pub fn detect_from_reader<R: BufRead>(
        &self,
        mut reader: R,
        source: &Path,
    ) -> Result<DialectDescriptor, DetectionError> {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source_err| DetectionError::Io {
                    path: source.to_path_buf(),
                    source: source_err,
                })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            match match_line(&line) {
                Some(LineMarker::BuiltIn(kind)) => return self.resolve_builtin(kind),
                Some(LineMarker::Custom(name)) => match self.resolve_custom(&name) {
                    Ok(descriptor) => return Ok(descriptor),
                    Err(err) if self.continue_scan_on_unresolved => {
                        tracing::debug!(dialect = %name, error = %err, "custom dialect unresolved, continuing scan");
                    }
                    Err(err) => return Err(err),
                },
                None => {}
            }
        }

        Err(DetectionError::Undetermined {
            file: source.to_path_buf(),
        })
    }

    fn resolve_builtin(&self, kind: DialectKind) -> Result<DialectDescriptor, DetectionError> {
        let (grammar, ruleset) = self.layout.pair(&kind);
        for path in [&grammar, &ruleset] {
            if !is_readable_file(path) {
                return Err(DetectionError::ResourceUnreadable { path: path.clone() });
            }
        }
        Ok(DialectDescriptor::new(kind, grammar, ruleset))
    }

    fn resolve_custom(&self, name: &str) -> Result<DialectDescriptor, DetectionError> {
        let kind = DialectKind::Custom(name.to_string());
        let (grammar, ruleset) = self.layout.pair(&kind);
        if is_readable_file(&grammar) && is_readable_file(&ruleset) {
            Ok(DialectDescriptor::new(kind, grammar, ruleset))
        } else {
            Err(DetectionError::CustomDialectUnresolved {
                name: name.to_string(),
                grammar,
                ruleset,
            })
        }
    }
}
