use sha1::{Digest, Sha1};

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize candidate label text. Returns `None` for text that is empty
/// after cleanup or is obviously script residue.
pub fn clean_label(raw: &str) -> Option<String> {
    let text = collapse_whitespace(raw);

    // Drop obvious JS blobs
    if text.contains("function(") || text.contains("document.") || text.contains("window.") {
        return None;
    }

    let text = text
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .trim_start_matches(|c: char| c == '*' || c.is_whitespace())
        .to_string();

    if text.is_empty() { None } else { Some(text) }
}

pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable generated identifier for an element without id or name.
pub fn generated_id(structural_path: &str) -> String {
    format!("fie-{}", &text_fingerprint(structural_path)[..12])
}

/// Longest run of ASCII digits in `raw`, if any.
pub fn longest_digit_run(raw: &str) -> Option<&str> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .max_by_key(|s| s.len())
}
