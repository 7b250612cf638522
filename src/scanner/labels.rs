use crate::dom::document::{Document, NodeId};
use crate::scanner::element_model::LabelSource;
use crate::scanner::index::ScanIndex;
use crate::scanner::normalize::{clean_label, longest_digit_run};
use crate::scanner::type_map::{classify, is_native_control};

/// How many ancestor levels the container heuristics climb.
const CONTAINER_DEPTH: usize = 3;

type LabelStep = fn(&Document, &ScanIndex, NodeId) -> Option<String>;

const CONTAINER_LABEL_PATTERNS: [&str; 5] = [
    "control-label",
    "field-label",
    "form-label",
    "label",
    "title",
];

// ============================================================================
// Label resolution cascade
// ============================================================================

/// Resolve the human-facing label of an element. Steps run in order and the
/// first non-empty result wins.
pub fn resolve_label(
    doc: &Document,
    index: &ScanIndex,
    node: NodeId,
) -> Option<(String, LabelSource)> {
    let steps: [(LabelSource, LabelStep); 11] = [
        (LabelSource::AriaLabel, |d, _, n| aria_label(d, n)),
        (LabelSource::AriaLabelledBy, |d, _, n| aria_labelledby(d, n)),
        (LabelSource::LabelFor, label_for),
        (LabelSource::WrappingLabel, |d, _, n| wrapping_label(d, n)),
        (LabelSource::Container, |d, _, n| container_heuristics(d, n)),
        (LabelSource::PrecedingText, |d, _, n| preceding_text(d, n)),
        (LabelSource::TableHeader, |d, _, n| table_header(d, n)),
        (LabelSource::NumericId, |d, _, n| numeric_id_label(d, n)),
        (LabelSource::Placeholder, |d, _, n| attr_label(d, n, "placeholder")),
        (LabelSource::Title, |d, _, n| attr_label(d, n, "title")),
        (LabelSource::NameOrId, |d, _, n| name_or_id(d, n)),
    ];

    steps
        .iter()
        .find_map(|(source, step)| step(doc, index, node).map(|label| (label, *source)))
}

/// Short cascade: `aria-label`, `label[for]`, placeholder, then name or id.
pub fn resolve_basic_label(
    doc: &Document,
    index: &ScanIndex,
    node: NodeId,
) -> Option<(String, LabelSource)> {
    let steps: [(LabelSource, LabelStep); 4] = [
        (LabelSource::AriaLabel, |d, _, n| aria_label(d, n)),
        (LabelSource::LabelFor, label_for),
        (LabelSource::Placeholder, |d, _, n| attr_label(d, n, "placeholder")),
        (LabelSource::NameOrId, |d, _, n| name_or_id(d, n)),
    ];

    steps
        .iter()
        .find_map(|(source, step)| step(doc, index, node).map(|label| (label, *source)))
}

fn attr_label(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    doc.attr(node, name).and_then(clean_label)
}

fn aria_label(doc: &Document, node: NodeId) -> Option<String> {
    attr_label(doc, node, "aria-label")
}

fn aria_labelledby(doc: &Document, node: NodeId) -> Option<String> {
    let refs = doc.attr(node, "aria-labelledby")?;
    let text = refs
        .split_whitespace()
        .filter_map(|id| doc.get_element_by_id(id))
        .map(|target| doc.text_content(target))
        .collect::<Vec<_>>()
        .join(" ");
    clean_label(&text)
}

fn label_for(doc: &Document, index: &ScanIndex, node: NodeId) -> Option<String> {
    let el = doc.element(node)?;
    if !is_native_control(el) {
        return None;
    }
    let text = index
        .labels_for(el.id()?)
        .iter()
        .map(|l| doc.text_content(*l))
        .collect::<Vec<_>>()
        .join(" ");
    clean_label(&text)
}

fn wrapping_label(doc: &Document, node: NodeId) -> Option<String> {
    let label = doc.closest(node, "label")?;
    let text: String = doc
        .descendants(label)
        .into_iter()
        .filter(|n| !doc.contains(node, *n))
        .filter_map(|n| doc.text(n))
        .collect();
    clean_label(&text)
}

/// Class/id patterns, headings, legends and titles near the control.
fn container_heuristics(doc: &Document, node: NodeId) -> Option<String> {
    for ancestor in doc.element_ancestors(node).into_iter().take(CONTAINER_DEPTH) {
        if matches!(doc.tag(ancestor), Some("body" | "form")) {
            break;
        }
        let before_control = doc
            .descendants(ancestor)
            .into_iter()
            .take_while(|n| *n != node)
            .filter(|n| doc.is_element(*n) && !doc.contains(*n, node));

        for candidate in before_control {
            if is_label_like(doc, candidate) {
                if let Some(text) = clean_label(&doc.text_content(candidate)) {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn is_label_like(doc: &Document, node: NodeId) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    if matches!(
        el.tag.as_str(),
        "legend" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    ) {
        return true;
    }
    if el.tag == "label" {
        // A label pointing at a control belongs to that control.
        return !el.has_attr("for");
    }
    let class = el.attr("class").unwrap_or("").to_lowercase();
    let id = el.attr("id").unwrap_or("").to_lowercase();
    CONTAINER_LABEL_PATTERNS
        .iter()
        .any(|p| class.contains(p) || id.contains(p))
}

fn preceding_text(doc: &Document, node: NodeId) -> Option<String> {
    for sibling in doc.previous_siblings(node) {
        if let Some(text) = doc.text(sibling) {
            if let Some(label) = clean_label(text) {
                return Some(label);
            }
            continue;
        }
        let Some(el) = doc.element(sibling) else {
            continue;
        };
        if classify(el).is_some() || el.tag == "button" {
            return None;
        }
        if let Some(label) = clean_label(&doc.text_content(sibling)) {
            return Some(label);
        }
    }
    None
}

fn table_header(doc: &Document, node: NodeId) -> Option<String> {
    let cell = doc
        .element_ancestors(node)
        .into_iter()
        .find(|a| matches!(doc.tag(*a), Some("td" | "th")))?;
    let row = doc.parent(cell).filter(|r| doc.tag(*r) == Some("tr"))?;
    let column = doc
        .element_children(row)
        .into_iter()
        .position(|c| c == cell)?;
    let table = doc.closest(row, "table")?;

    let header_row = doc
        .descendants(table)
        .into_iter()
        .filter(|n| doc.tag(*n) == Some("tr"))
        .find(|tr| {
            doc.element_children(*tr)
                .iter()
                .any(|c| doc.tag(*c) == Some("th"))
        })?;
    if header_row == row {
        return None;
    }
    let header = *doc.element_children(header_row).get(column)?;
    clean_label(&doc.text_content(header))
}

/// Ids like `field_1042` pair with a nearby label carrying the same number.
fn numeric_id_label(doc: &Document, node: NodeId) -> Option<String> {
    let id = doc.element(node)?.id()?;
    let number = longest_digit_run(id)?;
    let scope = doc
        .element_ancestors(node)
        .into_iter()
        .nth(1)
        .or_else(|| doc.parent(node))?;

    doc.descendants(scope)
        .into_iter()
        .filter(|n| *n != node && doc.tag(*n) == Some("label"))
        .find(|l| {
            ["id", "for", "class"].iter().any(|attr| {
                doc.attr(*l, attr)
                    .and_then(longest_digit_run)
                    .is_some_and(|n| n == number)
            })
        })
        .and_then(|l| clean_label(&doc.text_content(l)))
}

fn name_or_id(doc: &Document, node: NodeId) -> Option<String> {
    let el = doc.element(node)?;
    el.name().or_else(|| el.id()).and_then(clean_label)
}

/// Label for a radio/checkbox group: legend of the enclosing fieldset, or
/// the accessible name of an enclosing radiogroup/group.
pub fn group_label(doc: &Document, first_member: NodeId) -> Option<String> {
    for ancestor in doc.element_ancestors(first_member) {
        match doc.tag(ancestor) {
            Some("fieldset") => {
                let legend = doc
                    .element_children(ancestor)
                    .into_iter()
                    .find(|c| doc.tag(*c) == Some("legend"));
                if let Some(text) = legend.and_then(|l| clean_label(&doc.text_content(l))) {
                    return Some(text);
                }
            }
            Some("form") | Some("body") => break,
            _ => {}
        }
        if matches!(doc.attr(ancestor, "role"), Some("radiogroup" | "group")) {
            if let Some(text) =
                aria_label(doc, ancestor).or_else(|| aria_labelledby(doc, ancestor))
            {
                return Some(text);
            }
        }
    }
    None
}
