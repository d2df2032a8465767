//! Installs user-supplied grammars and rule-sets as custom dialects

use regex::Regex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::NamedTempFile;

use crate::error::ImportError;

/// `_TBX-<name>_` anywhere in a file name
static DIALECT_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_dialect_name_regex() -> &'static Regex {
    DIALECT_NAME_REGEX.get_or_init(|| {
        Regex::new(r"_TBX-([^_]+)_").expect("Failed to compile dialect name regex")
    })
}

/// What kind of schema file is being imported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFileKind {
    Grammar,
    Ruleset,
}

impl SchemaFileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("rng") {
            Some(SchemaFileKind::Grammar)
        } else if ext.eq_ignore_ascii_case("sch") {
            Some(SchemaFileKind::Ruleset)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SchemaFileKind::Grammar => "rng",
            SchemaFileKind::Ruleset => "sch",
        }
    }
}

/// A schema file now available to dialect detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSchema {
    pub dialect: String,
    pub kind: SchemaFileKind,
    pub installed_path: PathBuf,
}

/// Extract the dialect name from a file name such as `my_file_TBX-Example_version_1.rng`
pub fn extract_dialect_name(file_name: &str) -> Option<String> {
    get_dialect_name_regex()
        .captures(file_name)
        .map(|caps| caps[1].to_string())
}

/// Copies schema files into the custom dialect lookup directory
#[derive(Debug, Clone)]
pub struct SchemaImporter {
    lookup_dir: PathBuf,
}

impl SchemaImporter {
    pub fn new(lookup_dir: impl Into<PathBuf>) -> Self {
        Self {
            lookup_dir: lookup_dir.into(),
        }
    }

    pub fn lookup_dir(&self) -> &Path {
        &self.lookup_dir
    }

    /// Install `source` as `<name>.rng` or `<name>.sch`.
    ///
    /// Nothing is written unless the name and extension check out, and the copy is
    /// renamed into place only once complete.
    pub fn import(&self, source: &Path) -> Result<ImportedSchema, ImportError> {
        let kind = SchemaFileKind::from_path(source).ok_or_else(|| {
            ImportError::UnsupportedExtension {
                path: source.to_path_buf(),
            }
        })?;

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dialect = extract_dialect_name(&file_name)
            .ok_or_else(|| ImportError::NoDialectName { file_name })?;

        if !source.is_file() {
            return Err(ImportError::SourceMissing {
                path: source.to_path_buf(),
            });
        }

        let destination = self
            .lookup_dir
            .join(format!("{}.{}", dialect, kind.extension()));
        let install_err = |source: io::Error| ImportError::Install {
            path: destination.clone(),
            source,
        };

        fs::create_dir_all(&self.lookup_dir).map_err(install_err)?;

        let mut input = File::open(source).map_err(install_err)?;
        let mut staged = NamedTempFile::new_in(&self.lookup_dir).map_err(install_err)?;
        io::copy(&mut input, &mut staged).map_err(install_err)?;
        staged.as_file().sync_all().map_err(install_err)?;
        staged
            .persist(&destination)
            .map_err(|err| install_err(err.error))?;

        tracing::info!(
            dialect = %dialect,
            path = %destination.display(),
            "custom schema installed"
        );

        Ok(ImportedSchema {
            dialect,
            kind,
            installed_path: destination,
        })
    }
}
