#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tbx_check::{DialectKind, SchemaLayout};
use tempfile::TempDir;

/// Cut-down TBX grammar: a `tbx` root holding concept entries with terms
pub const GRAMMAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="tbx">
      <attribute name="type"/>
      <optional><attribute name="style"/></optional>
      <element name="text">
        <oneOrMore>
          <element name="conceptEntry">
            <attribute name="id"/>
            <oneOrMore>
              <element name="term"><text/></element>
            </oneOrMore>
          </element>
        </oneOrMore>
      </element>
    </element>
  </start>
</grammar>
"#;

pub const ID_RULE_TEXT: &str = "A conceptEntry id must be at least two characters long.";

pub const RULESET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://purl.oclc.org/dsdl/schematron">
  <pattern id="concepts">
    <rule context="conceptEntry">
      <assert test="string-length(@id) &gt; 1">A conceptEntry id must be at least two characters long.</assert>
      <report test="count(term) &gt; 2">This conceptEntry has more than two terms.</report>
    </rule>
  </pattern>
</schema>
"#;

/// A document in `dialect` with one concept entry per `(id, "term term ...")` pair
pub fn tbx_document(dialect: &str, entries: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (id, terms) in entries {
        body.push_str(&format!("    <conceptEntry id=\"{}\">", id));
        for term in terms.split_whitespace() {
            body.push_str(&format!("<term>{}</term>", term));
        }
        body.push_str("</conceptEntry>\n");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tbx type=\"TBX-{}\" style=\"dca\">\n  <text>\n{}  </text>\n</tbx>\n",
        dialect, body
    )
}

/// Temporary schema root with every built-in dialect installed, plus a report directory
pub struct Workspace {
    pub dir: TempDir,
    pub layout: SchemaLayout,
    pub reports: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = SchemaLayout::new(dir.path().join("schemas"));
        for kind in DialectKind::BUILT_IN.iter() {
            let (grammar, ruleset) = layout.pair(kind);
            fs::create_dir_all(grammar.parent().unwrap()).unwrap();
            fs::write(&grammar, GRAMMAR).unwrap();
            fs::write(&ruleset, RULESET).unwrap();
        }
        let reports = dir.path().join("reports");
        fs::create_dir_all(&reports).unwrap();

        Self {
            dir,
            layout,
            reports,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn overwrite_builtin(&self, kind: &DialectKind, grammar: Option<&str>, ruleset: Option<&str>) {
        let (grammar_path, ruleset_path) = self.layout.pair(kind);
        if let Some(content) = grammar {
            fs::write(grammar_path, content).unwrap();
        }
        if let Some(content) = ruleset {
            fs::write(ruleset_path, content).unwrap();
        }
    }

    pub fn report_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.reports)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        files.sort();
        files
    }
}
