use crate::dom::document::{Document, NodeId, is_void_tag};
use crate::error::DocumentError;

/// Parse a small markup fragment and append the result under `parent`.
///
/// Handles start/end tags with quoted or bare attributes, self-closing
/// tags, void elements, text and the five basic entities. Unmatched end
/// tags are ignored. Used to write structured markup into editable regions.
pub fn append_fragment(
    doc: &mut Document,
    parent: NodeId,
    markup: &str,
) -> Result<Vec<NodeId>, DocumentError> {
    let mut stack: Vec<NodeId> = vec![parent];
    let mut top_level = Vec::new();
    let chars: Vec<char> = markup.chars().collect();
    let mut pos = 0;
    let mut text = String::new();

    while pos < chars.len() {
        if chars[pos] == '<' {
            let Some(end) = chars[pos..].iter().position(|c| *c == '>') else {
                text.extend(&chars[pos..]);
                break;
            };
            let tag_src: String = chars[pos + 1..pos + end].iter().collect();
            pos += end + 1;

            flush_text(doc, &mut text, &stack, parent, &mut top_level)?;

            if let Some(name) = tag_src.strip_prefix('/') {
                let name = name.trim().to_ascii_lowercase();
                if let Some(idx) = stack
                    .iter()
                    .rposition(|n| *n != parent && doc.tag(*n) == Some(name.as_str()))
                {
                    stack.truncate(idx);
                }
                continue;
            }
            if tag_src.starts_with('!') {
                continue;
            }

            let self_closing = tag_src.trim_end().ends_with('/');
            let body = tag_src.trim_end().trim_end_matches('/');
            let (name, attrs) = parse_tag(body);
            if name.is_empty() {
                continue;
            }

            let el = doc.create_element(&name);
            for (k, v) in attrs {
                doc.set_attribute(el, &k, &v)?;
            }
            let current = *stack.last().unwrap_or(&parent);
            doc.append_child(current, el)?;
            if current == parent {
                top_level.push(el);
            }
            if !self_closing && !is_void_tag(&name) {
                stack.push(el);
            }
        } else {
            text.push(chars[pos]);
            pos += 1;
        }
    }
    flush_text(doc, &mut text, &stack, parent, &mut top_level)?;
    Ok(top_level)
}

fn flush_text(
    doc: &mut Document,
    text: &mut String,
    stack: &[NodeId],
    parent: NodeId,
    top_level: &mut Vec<NodeId>,
) -> Result<(), DocumentError> {
    if text.is_empty() {
        return Ok(());
    }
    let node = doc.create_text(&decode_entities(text));
    let current = *stack.last().unwrap_or(&parent);
    doc.append_child(current, node)?;
    if current == parent {
        top_level.push(node);
    }
    text.clear();
    Ok(())
}

fn parse_tag(src: &str) -> (String, Vec<(String, String)>) {
    let src = src.trim();
    let name_end = src.find(char::is_whitespace).unwrap_or(src.len());
    let name = src[..name_end].to_ascii_lowercase();
    let mut attrs = Vec::new();

    let rest: Vec<char> = src[name_end..].chars().collect();
    let mut i = 0;
    while i < rest.len() {
        while i < rest.len() && rest[i].is_whitespace() {
            i += 1;
        }
        let start = i;
        while i < rest.len() && !rest[i].is_whitespace() && rest[i] != '=' {
            i += 1;
        }
        let key: String = rest[start..i].iter().collect();
        if key.is_empty() {
            i += 1;
            continue;
        }
        let mut value = String::new();
        if i < rest.len() && rest[i] == '=' {
            i += 1;
            if i < rest.len() && (rest[i] == '"' || rest[i] == '\'') {
                let quote = rest[i];
                i += 1;
                while i < rest.len() && rest[i] != quote {
                    value.push(rest[i]);
                    i += 1;
                }
                i += 1;
            } else {
                while i < rest.len() && !rest[i].is_whitespace() {
                    value.push(rest[i]);
                    i += 1;
                }
            }
        }
        attrs.push((key.to_ascii_lowercase(), decode_entities(&value)));
    }
    (name, attrs)
}

pub fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
