//! End-to-end runs of the validation pipeline against small RNG/SCH fixtures

mod common;

use std::fs;

use common::{ID_RULE_TEXT, Workspace, tbx_document};
use tbx_check::pipeline::{self, PipelineConfig, TbxVersion};
use tbx_check::report::UNRESOLVED_NOTICE;
use tbx_check::{
    DetectionOutcome, DialectKind, ReportComposer, SchemaImporter, StageOutcome, ValidatorKind,
};

fn config(ws: &Workspace) -> PipelineConfig {
    PipelineConfig::new(ws.layout.clone())
}

#[test]
fn test_valid_basic_document() {
    let ws = Workspace::new();
    let doc = ws.write(
        "glossary.tbx",
        &tbx_document("Basic", &[("c1", "cat Katze"), ("c2", "dog")]),
    );

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(report.is_valid());
    assert_eq!(
        report.detection.descriptor().unwrap().kind,
        DialectKind::Basic
    );
    assert!(artifact.contents.contains(
        "The dialect of your file was automatically detected to be TBX-Basic."
    ));
    assert!(artifact.contents.contains("Valid! Successful validation against the RNG file."));
    assert!(artifact.contents.contains("Valid! Successful validation against the SCH file."));
    assert_eq!(fs::read_to_string(&artifact.path).unwrap(), artifact.contents);
}

#[test]
fn test_failed_assertions_do_not_touch_structural_result() {
    let ws = Workspace::new();
    let doc = ws.write(
        "short-ids.tbx",
        &tbx_document("Core", &[("a", "x"), ("ok", "y"), ("b", "z")]),
    );

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(report.structural_valid());
    assert!(!report.semantic_valid());
    let semantic = report.semantic.completed().unwrap();
    assert_eq!(semantic.diagnostics.len(), 2);
    assert!(semantic.diagnostics.iter().all(|d| d.rule_text == ID_RULE_TEXT));

    let structural = report.structural.completed().unwrap();
    assert!(structural.diagnostics.iter().all(|d| !d.message.contains(ID_RULE_TEXT)));
    assert!(artifact.contents.contains("Invalid! Unsuccessful validation against the SCH file."));
}

#[test]
fn test_informational_reports_are_not_failures() {
    let ws = Workspace::new();
    let doc = ws.write(
        "many-terms.tbx",
        &tbx_document("Min", &[("c1", "a b c")]),
    );

    let (report, _) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    let semantic = report.semantic.completed().unwrap();
    assert!(semantic.valid);
    assert!(semantic.informational_count() >= 1);
}

#[test]
fn test_structural_violations_are_positioned() {
    let ws = Workspace::new();
    let doc = ws.write(
        "no-id.tbx",
        "<?xml version=\"1.0\"?>\n<tbx type=\"TBX-Basic\" style=\"dca\">\n  <text>\n    <conceptEntry><term>a</term></conceptEntry>\n    <conceptEntry id=\"c2\"><term>b</term></conceptEntry>\n    <conceptEntry><term>c</term></conceptEntry>\n    <conceptEntry id=\"c4\"><term>d</term></conceptEntry>\n  <conceptEntry><term>e</term></conceptEntry>\n  </text>\n</tbx>\n",
    );

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    let structural = report.structural.completed().unwrap();
    assert!(!structural.valid);
    let positions: Vec<(u32, u32)> = structural
        .diagnostics
        .iter()
        .map(|d| (d.line, d.column))
        .collect();
    assert_eq!(positions, vec![(4, 5), (6, 5), (8, 3)], "{:?}", structural.diagnostics);
    assert!(artifact.contents.contains("(Line:Column)"));
    assert!(artifact.contents.contains("\t(8:3) "));
    assert!(report.semantic.is_completed());
}

#[test]
fn test_malformed_document_still_produces_report() {
    let ws = Workspace::new();
    let doc = ws.write(
        "broken.tbx",
        "<tbx type=\"TBX-Core\" style=\"dca\">\n  <text>\n</tbx>\n",
    );

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(!report.structural_valid());
    assert!(matches!(report.semantic, StageOutcome::SetupFailed(_)));
    assert!(artifact.path.exists());
}

#[test]
fn test_malformed_ruleset_isolated_to_semantic_stage() {
    let ws = Workspace::new();
    ws.overwrite_builtin(
        &DialectKind::Basic,
        None,
        Some("<schema xmlns=\"http://purl.oclc.org/dsdl/schematron\"><pattern>"),
    );
    let doc = ws.write("g.tbx", &tbx_document("Basic", &[("c1", "cat")]));

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(report.structural_valid());
    assert!(matches!(report.semantic, StageOutcome::SetupFailed(_)));
    assert!(!report.is_valid());
    assert!(artifact.contents.contains("Valid! Successful validation against the RNG file."));
    assert!(artifact.contents.contains("Validation against the SCH file could not be performed"));
}

#[test]
fn test_unloadable_grammar_skips_semantic_stage() {
    let ws = Workspace::new();
    ws.overwrite_builtin(&DialectKind::Core, Some("<grammar"), None);
    let doc = ws.write("g.tbx", &tbx_document("Core", &[("c1", "cat")]));

    let (report, _) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(matches!(report.structural, StageOutcome::SetupFailed(_)));
    assert!(report.semantic.is_skipped());
}

#[test]
fn test_unknown_dialect_writes_notice() {
    let ws = Workspace::new();
    let doc = ws.write("foo.tbx", &tbx_document("Foo", &[("c1", "cat")]));

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(matches!(report.detection, DetectionOutcome::Failed { .. }));
    assert!(report.structural.is_skipped() && report.semantic.is_skipped());
    assert!(artifact.contents.contains(UNRESOLVED_NOTICE));
    assert!(!report.is_valid());
}

#[test]
fn test_imported_custom_dialect_is_used() {
    let ws = Workspace::new();
    let importer = SchemaImporter::new(ws.layout.external_dir());
    importer
        .import(&ws.write("ours_TBX-Widget_v1.rng", common::GRAMMAR))
        .unwrap();
    importer
        .import(&ws.write("ours_TBX-Widget_v1.sch", common::RULESET))
        .unwrap();
    let doc = ws.write("widget.xml", &tbx_document("Widget", &[("w1", "gear")]));

    let (report, artifact) =
        pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert!(report.is_valid());
    assert_eq!(
        report.detection.descriptor().unwrap().kind,
        DialectKind::Custom("Widget".to_string())
    );
    assert!(artifact
        .contents
        .contains("automatically detected to be the custom dialect Widget."));
}

#[test]
fn test_two_runs_same_day_never_overwrite() {
    let ws = Workspace::new();
    let doc = ws.write("g.tbx", &tbx_document("Basic", &[("c1", "cat")]));
    let composer = ReportComposer::new(&ws.reports);

    let (_, first) = pipeline::run(&config(&ws), &doc, &composer).unwrap();
    let (_, second) = pipeline::run(&config(&ws), &doc, &composer).unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(ws.report_files().len(), 2);
    let second_name = second.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(second_name.ends_with("_TBXChecker-Results-0.txt"), "{}", second_name);
}

#[test]
fn test_legacy_version_uses_dtd() {
    let ws = Workspace::new();
    ws.write(
        "martif.dtd",
        "<!ELEMENT martif (#PCDATA)>\n<!ATTLIST martif type CDATA #REQUIRED xml:lang CDATA #IMPLIED>\n",
    );
    let doc = ws.write(
        "old.tbx",
        "<?xml version=\"1.0\"?>\n<!DOCTYPE martif SYSTEM \"martif.dtd\">\n<martif type=\"TBX\" xml:lang=\"en-US\">terms</martif>\n",
    );
    let mut cfg = config(&ws);
    cfg.version = TbxVersion::V2;

    let (report, artifact) = pipeline::run(&cfg, &doc, &ReportComposer::new(&ws.reports)).unwrap();

    assert_eq!(report.validator, ValidatorKind::LegacyTbx2);
    assert!(report.is_valid(), "{}", artifact.contents);
    assert!(artifact.contents.contains("Valid! Successful validation against the DTD."));
    assert!(artifact.contents.contains("Validation against the SCH file was skipped"));
}

#[test]
fn test_rejected_document_writes_no_report() {
    let ws = Workspace::new();
    let doc = ws.write("notes.txt", &tbx_document("Basic", &[("c1", "cat")]));

    assert!(pipeline::run(&config(&ws), &doc, &ReportComposer::new(&ws.reports)).is_err());
    assert!(ws.report_files().is_empty());
}
