use std::collections::BTreeSet;

use crate::scanner::element_model::{FormDescriptor, Statistics, ValidationRule};

const COMPLEXITY_CAP: u32 = 100;

/// Totals and a bounded complexity score over a whole snapshot.
pub fn compute_statistics(forms: &[FormDescriptor]) -> Statistics {
    let mut stats = Statistics {
        total_forms: forms.len(),
        ..Statistics::default()
    };

    for el in forms.iter().flat_map(|f| f.elements.iter()) {
        stats.total_elements += 1;
        *stats.by_type.entry(el.kind.as_str().to_string()).or_default() += 1;
        *stats.by_tag.entry(el.tag_name.clone()).or_default() += 1;
        if el.has_validation() {
            stats.with_validation += 1;
        }
        if el.has_accessibility() {
            stats.with_accessibility += 1;
        }
        if el.has_custom() {
            stats.with_custom += 1;
        }
        if el.constraints.required {
            stats.required += 1;
        }
    }

    let distinct_types = stats.by_type.len() as u32;
    stats.complexity_score = complexity_score(
        stats.total_elements as u32,
        distinct_types,
        stats.with_validation as u32,
        stats.with_accessibility as u32,
    );
    stats
}

/// Weighted sum of element count, distinct types, validated and accessible
/// elements, capped at 100.
pub fn complexity_score(elements: u32, distinct_types: u32, validated: u32, accessible: u32) -> u32 {
    let raw = elements
        .saturating_mul(2)
        .saturating_add(distinct_types.saturating_mul(5))
        .saturating_add(validated.saturating_mul(3))
        .saturating_add(accessible);
    raw.min(COMPLEXITY_CAP)
}

/// One rule entry per element that carries any constraint.
pub fn validation_rule_index(forms: &[FormDescriptor]) -> Vec<ValidationRule> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for el in forms.iter().flat_map(|f| f.elements.iter()) {
        if !el.has_validation() || !seen.insert(el.id.clone()) {
            continue;
        }
        let c = &el.constraints;
        let mut rules = Vec::new();
        if c.required {
            rules.push("required".to_string());
        }
        let pairs = [
            ("pattern", c.pattern.clone()),
            ("min", c.min.clone()),
            ("max", c.max.clone()),
            ("minlength", c.min_length.map(|v| v.to_string())),
            ("maxlength", c.max_length.map(|v| v.to_string())),
            ("step", c.step.clone()),
            ("accept", c.accept.clone()),
            ("validate", el.custom.get("validate").cloned()),
        ];
        for (name, value) in pairs {
            if let Some(v) = value {
                rules.push(format!("{}:{}", name, v));
            }
        }
        out.push(ValidationRule {
            element_id: el.id.clone(),
            rules,
        });
    }
    out
}
