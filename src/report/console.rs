use crate::fill::fill_model::FillResult;
use crate::scanner::element_model::{ExtractionSnapshot, FieldValue, FormKind};
use crate::validation::result::FormValidationResult;

const PASS: &str = "\u{2713}";
const FAIL: &str = "\u{2717}";

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a scan for terminal output.
///
/// Produces output like:
/// ```text
/// === Forms: 1 (3 elements) ===
///
/// [native] signup (post)
///     email        email     "Email address" *
///     password     password  "Password" *
/// ```
pub fn format_scan_report(snapshot: &ExtractionSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== Forms: {} ({} elements) ===\n",
        snapshot.forms.len(),
        snapshot.element_count()
    ));

    for form in &snapshot.forms {
        out.push_str(&format!(
            "\n[{}] {} ({})\n",
            kind_label(form.kind),
            form.id,
            form.method
        ));
        for el in &form.elements {
            let required = if el.constraints.required { " *" } else { "" };
            out.push_str(&format!(
                "    {:<20} {:<16} {}{}\n",
                el.id,
                el.kind.as_str(),
                el.label
                    .as_deref()
                    .map(|l| format!("\"{}\"", l))
                    .unwrap_or_else(|| "-".to_string()),
                required
            ));
        }
    }

    if !snapshot.field_groups.is_empty() {
        out.push_str("\nField groups:\n");
        for group in &snapshot.field_groups {
            out.push_str(&format!(
                "  - {} ({} elements)\n",
                group.name,
                group.element_ids.len()
            ));
        }
    }

    let stats = &snapshot.statistics;
    out.push_str(&format!(
        "\n=== {} required, {} with validation, complexity {} ===\n",
        stats.required, stats.with_validation, stats.complexity_score
    ));
    out
}

/// Format the outcome of a fill.
pub fn format_fill_report(result: &FillResult) -> String {
    let mut out = String::new();
    if result.fallback_used {
        out.push_str("(served by legacy extractor)\n");
    }

    for applied in &result.success {
        let via = applied
            .match_score
            .map(|s| format!(" [fuzzy {}]", s))
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {} -> {}: {} => {}{}\n",
            PASS,
            applied.identifier,
            applied.element_id,
            display_value(&applied.previous_value),
            display_value(&applied.new_value),
            via
        ));
    }
    for failed in &result.failed {
        out.push_str(&format!("{} {}: {}\n", FAIL, failed.identifier, failed.reason));
        if !failed.suggestions.is_empty() {
            out.push_str(&format!("    did you mean: {}\n", failed.suggestions.join(", ")));
        }
    }
    for warning in &result.warnings {
        out.push_str(&format!(
            "  ! {} [{}] {}\n",
            warning.identifier, warning.code, warning.message
        ));
    }

    out.push_str(&format!(
        "\n=== Results: {} applied, {} failed ({} total) in {:.1}ms ===\n",
        result.success.len(),
        result.failed.len(),
        result.total_attempted,
        result.execution_time_ms
    ));
    out
}

/// Format per-form validation summaries.
pub fn format_validation_report(results: &[FormValidationResult]) -> String {
    let mut out = String::new();
    for form in results {
        let marker = if form.valid { PASS } else { FAIL };
        out.push_str(&format!("{} {} (score {:.0})\n", marker, form.form_id, form.score));
        for result in &form.results {
            for issue in &result.errors {
                out.push_str(&format!("    [ERROR] {}: {}\n", result.element_id, issue.message));
            }
            for issue in &result.warnings {
                out.push_str(&format!("    [WARN] {}: {}\n", result.element_id, issue.message));
            }
            for issue in &result.accessibility_issues {
                out.push_str(&format!(
                    "    [A11Y {}] {}: {}\n",
                    issue.guideline, result.element_id, issue.message
                ));
            }
        }
    }

    let valid = results.iter().filter(|f| f.valid).count();
    out.push_str(&format!(
        "\n=== Results: {} valid, {} invalid ({} forms) ===\n",
        valid,
        results.len() - valid,
        results.len()
    ));
    out
}

fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "(empty)".to_string(),
        other => format!("\"{}\"", other.as_text()),
    }
}

fn kind_label(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Native => "native",
        FormKind::Heuristic => "heuristic",
        FormKind::Standalone => "standalone",
    }
}
