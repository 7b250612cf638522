use std::path::Path;

use clap::Parser;
use form_intelligence::cli::config::{
    AppConfig, Cli, Commands, load_config, load_document, load_values,
};
use form_intelligence::error::ConfigError;
use form_intelligence::fill::fill_model::{AppliedValue, ApplyMethod, FailedValue, FillResult};
use form_intelligence::report::console::{
    format_fill_report, format_scan_report, format_validation_report,
};
use form_intelligence::scanner::element_model::FieldValue;
use form_intelligence::scanner::scanner::DocumentScanner;
use form_intelligence::validation::result::FormValidationResult;
use serde_json::json;

use crate::common::{build, signup_form};

mod common;

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path.to_string_lossy().into_owned()
}

// ============================================================================
// CLI Argument Parsing Tests
// ============================================================================

#[test]
fn cli_parse_scan_defaults() {
    let cli = Cli::parse_from(["form-intelligence", "scan", "--document", "page.yaml"]);
    match cli.command {
        Commands::Scan { document, format } => {
            assert_eq!(document, "page.yaml");
            assert_eq!(format, "console");
        }
        _ => panic!("Expected Scan command"),
    }
    assert_eq!(cli.verbose, 0);
    assert!(cli.config.is_none());
}

#[test]
fn cli_parse_fill_all_args() {
    let cli = Cli::parse_from([
        "form-intelligence",
        "-vv",
        "fill",
        "--document",
        "page.json",
        "--values",
        "values.yaml",
        "--smart",
        "--validate",
        "--format",
        "json",
        "--config",
        "custom.yaml",
    ]);
    match cli.command {
        Commands::Fill {
            document,
            values,
            smart,
            validate,
            format,
        } => {
            assert_eq!(document, "page.json");
            assert_eq!(values, "values.yaml");
            assert!(smart);
            assert!(validate);
            assert_eq!(format, "json");
        }
        _ => panic!("Expected Fill command"),
    }
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.config.as_deref(), Some("custom.yaml"));
}

#[test]
fn cli_parse_validate() {
    let cli = Cli::parse_from(["form-intelligence", "validate", "--document", "page.yaml"]);
    assert!(matches!(cli.command, Commands::Validate { .. }));
}

#[test]
fn cli_fill_requires_values() {
    let parsed = Cli::try_parse_from(["form-intelligence", "fill", "--document", "page.yaml"]);
    assert!(parsed.is_err());
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
fn config_missing_file_returns_defaults() {
    let config = load_config(Some("/nonexistent/form-intelligence.yaml"));
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.watch.debounce_ms, 300);
    assert!(config.fallback.prefer_full);
}

#[test]
fn config_malformed_file_returns_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write(dir.path(), "bad.yaml", "scan: [not, a, map");
    assert_eq!(load_config(Some(&path)), AppConfig::default());
}

#[test]
fn config_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write(
        dir.path(),
        "form-intelligence.yaml",
        "fill:\n  smart_matching: true\n  max_retries: 1\nwatch:\n  debounce_ms: 50\naudit:\n  path: audit.jsonl\nfallback:\n  prefer_full: false\n",
    );

    let config = load_config(Some(&path));

    assert!(config.fill.smart_matching);
    assert_eq!(config.fill.max_retries, 1);
    assert!(config.fill.skip_disabled, "unset fill fields keep defaults");
    assert_eq!(config.watch.debounce_ms, 50);
    assert_eq!(config.audit.path.as_deref(), Some("audit.jsonl"));
    assert!(!config.fallback.prefer_full);
    assert!(config.fallback.retry_apply_on_legacy);
    assert!(config.scan.traverse_shadow);
}

// ============================================================================
// Document and Values Loading Tests
// ============================================================================

#[test]
fn load_document_from_yaml_and_json() {
    let dir = tempfile::tempdir().expect("temp dir");
    let yaml = write(
        dir.path(),
        "page.yaml",
        "body:\n  - tag: form\n    attrs: {id: login}\n    children:\n      - tag: input\n        attrs: {id: user, type: text}\n",
    );
    let json_doc = json!({
        "body": [{
            "tag": "form",
            "attrs": {"id": "login"},
            "children": [{"tag": "input", "attrs": {"id": "user", "type": "text"}}]
        }]
    });
    let json_path = write(dir.path(), "page.json", &json_doc.to_string());

    for path in [yaml, json_path] {
        let doc = load_document(&path).expect("document loads");
        assert!(doc.get_element_by_id("login").is_some());
        assert!(doc.get_element_by_id("user").is_some());
    }
}

#[test]
fn load_document_errors_name_the_file() {
    let missing = load_document("/nonexistent/page.yaml").expect_err("missing file");
    assert!(matches!(missing, ConfigError::Io { .. }));

    let dir = tempfile::tempdir().expect("temp dir");
    let path = write(dir.path(), "page.json", "{ not json");
    match load_document(&path).expect_err("bad json") {
        ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn load_values_keeps_value_types() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write(
        dir.path(),
        "values.yaml",
        "email: ada@example.com\nnewsletter: true\nletters: [a, c]\nage: 42\n",
    );

    let values = load_values(&path).expect("values load");

    assert_eq!(values.get("email"), Some(&json!("ada@example.com")));
    assert_eq!(values.get("newsletter"), Some(&json!(true)));
    assert_eq!(values.get("letters"), Some(&json!(["a", "c"])));
    assert_eq!(values.get("age"), Some(&json!(42)));
}

// ============================================================================
// Console Report Tests
// ============================================================================

#[test]
fn scan_report_lists_forms_and_elements() {
    let snapshot = DocumentScanner::default().scan(&build(vec![signup_form()]), None);

    let report = format_scan_report(&snapshot);

    assert!(report.contains("=== Forms: 1 (4 elements) ==="));
    assert!(report.contains("[native] signup (post)"));
    assert!(report.contains("\"First Name\""));
    assert!(report.contains("name (2 elements)"));
}

#[test]
fn fill_report_shows_outcomes() {
    let result = FillResult {
        success: vec![AppliedValue {
            identifier: "first".to_string(),
            element_id: "first_name".to_string(),
            previous_value: FieldValue::Null,
            new_value: FieldValue::Text("Ada".to_string()),
            method: ApplyMethod::DirectAssignment,
            match_score: Some(80),
            attempt: 0,
        }],
        failed: vec![FailedValue {
            identifier: "emial".to_string(),
            element_id: None,
            reason: "no element matches this identifier".to_string(),
            suggestions: vec!["email".to_string()],
        }],
        total_attempted: 2,
        fallback_used: true,
        ..FillResult::default()
    };

    let report = format_fill_report(&result);

    assert!(report.starts_with("(served by legacy extractor)"));
    assert!(report.contains("\u{2713} first -> first_name: (empty) => \"Ada\" [fuzzy 80]"));
    assert!(report.contains("\u{2717} emial: no element matches this identifier"));
    assert!(report.contains("did you mean: email"));
    assert!(report.contains("1 applied, 1 failed (2 total)"));
}

#[test]
fn validation_report_counts_forms() {
    let results = vec![
        FormValidationResult::from_results("signup", Vec::new()),
        FormValidationResult {
            form_id: "prefs".to_string(),
            valid: false,
            results: Vec::new(),
            score: 60.0,
        },
    ];

    let report = format_validation_report(&results);

    assert!(report.contains("\u{2713} signup (score 100)"));
    assert!(report.contains("\u{2717} prefs (score 60)"));
    assert!(report.contains("1 valid, 1 invalid (2 forms)"));
}
