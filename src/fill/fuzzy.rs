use std::collections::BTreeSet;

use crate::scanner::element_model::ElementDescriptor;

pub const SCORE_EXACT: u8 = 100;
pub const SCORE_LABEL_CONTAINS: u8 = 80;
pub const SCORE_LABEL_IN_QUERY: u8 = 60;
pub const SCORE_NAME_CONTAINS: u8 = 40;

const MAX_SUGGESTIONS: usize = 3;

/// Score how well `query` names `el`: 100 for an exact id or name, 80 when
/// the label contains the query, 60 when the query contains the label, 40
/// when the name contains the query. Case-insensitive except for the exact
/// match.
pub fn match_score(query: &str, el: &ElementDescriptor) -> u8 {
    let query = query.trim();
    if query.is_empty() {
        return 0;
    }
    if el.id == query || el.name.as_deref() == Some(query) {
        return SCORE_EXACT;
    }

    let q = query.to_lowercase();
    if let Some(label) = el.label.as_deref().map(str::to_lowercase) {
        if label.contains(&q) {
            return SCORE_LABEL_CONTAINS;
        }
        if !label.is_empty() && q.contains(&label) {
            return SCORE_LABEL_IN_QUERY;
        }
    }
    if el
        .name
        .as_deref()
        .is_some_and(|n| n.to_lowercase().contains(&q))
    {
        return SCORE_NAME_CONTAINS;
    }
    0
}

/// Elements with a positive score, best first. Ties keep document order.
pub fn ranked_matches<'a>(
    query: &str,
    elements: &'a [ElementDescriptor],
) -> Vec<(&'a ElementDescriptor, u8)> {
    let mut scored: Vec<(&ElementDescriptor, u8)> = elements
        .iter()
        .map(|el| (el, match_score(query, el)))
        .filter(|(_, score)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
}

pub fn fuzzy_resolve<'a>(
    query: &str,
    elements: &'a [ElementDescriptor],
) -> Option<(&'a ElementDescriptor, u8)> {
    ranked_matches(query, elements).into_iter().next()
}

fn bigrams(text: &str) -> BTreeSet<(char, char)> {
    let chars: Vec<char> = text.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Dice coefficient over character bigrams.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (x, y) = (bigrams(a), bigrams(b));
    if x.is_empty() || y.is_empty() {
        return 0.0;
    }
    let shared = x.intersection(&y).count();
    2.0 * shared as f64 / (x.len() + y.len()) as f64
}

/// Nearest element ids for an identifier nothing matched.
pub fn suggestions(query: &str, elements: &[ElementDescriptor]) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = elements
        .iter()
        .map(|el| {
            let best = [Some(el.id.as_str()), el.name.as_deref(), el.label.as_deref()]
                .into_iter()
                .flatten()
                .map(|candidate| similarity(query, candidate))
                .fold(0.0, f64::max);
            (best, el.id.as_str())
        })
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, id)| id.to_string())
        .collect()
}
