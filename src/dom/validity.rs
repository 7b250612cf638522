use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::document::{Document, NodeId};

pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

pub static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:\S+$").expect("static regex"));

static WEEK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-W(\d{2})$").expect("static regex"));

// ============================================================================
// Constraint validation (the browser's ValidityState)
// ============================================================================

/// One failing native constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    ValueMissing,
    TypeMismatch,
    PatternMismatch,
    TooLong,
    TooShort,
    RangeUnderflow,
    RangeOverflow,
    StepMismatch,
    BadInput,
}

impl ConstraintKind {
    pub fn code(&self) -> &'static str {
        match self {
            ConstraintKind::ValueMissing => "value_missing",
            ConstraintKind::TypeMismatch => "type_mismatch",
            ConstraintKind::PatternMismatch => "pattern_mismatch",
            ConstraintKind::TooLong => "too_long",
            ConstraintKind::TooShort => "too_short",
            ConstraintKind::RangeUnderflow => "range_underflow",
            ConstraintKind::RangeOverflow => "range_overflow",
            ConstraintKind::StepMismatch => "step_mismatch",
            ConstraintKind::BadInput => "bad_input",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityState {
    pub value_missing: bool,
    pub type_mismatch: bool,
    pub pattern_mismatch: bool,
    pub too_long: bool,
    pub too_short: bool,
    pub range_underflow: bool,
    pub range_overflow: bool,
    pub step_mismatch: bool,
    pub bad_input: bool,
}

impl ValidityState {
    pub fn valid(&self) -> bool {
        self.failures().is_empty()
    }

    /// Failing constraints in a fixed order.
    pub fn failures(&self) -> Vec<ConstraintKind> {
        [
            (self.value_missing, ConstraintKind::ValueMissing),
            (self.type_mismatch, ConstraintKind::TypeMismatch),
            (self.pattern_mismatch, ConstraintKind::PatternMismatch),
            (self.too_long, ConstraintKind::TooLong),
            (self.too_short, ConstraintKind::TooShort),
            (self.range_underflow, ConstraintKind::RangeUnderflow),
            (self.range_overflow, ConstraintKind::RangeOverflow),
            (self.step_mismatch, ConstraintKind::StepMismatch),
            (self.bad_input, ConstraintKind::BadInput),
        ]
        .into_iter()
        .filter_map(|(failed, kind)| failed.then_some(kind))
        .collect()
    }
}

/// Compute the constraint-validation state of a form control.
pub fn compute_validity(doc: &Document, id: NodeId) -> ValidityState {
    let mut state = ValidityState::default();
    let Some(el) = doc.element(id) else {
        return state;
    };
    if !matches!(el.tag.as_str(), "input" | "select" | "textarea") {
        return state;
    }
    if el.has_attr("disabled") || (el.tag != "select" && el.has_attr("readonly")) {
        return state;
    }

    let input_type = if el.is_input() {
        el.input_type()
    } else {
        el.tag.clone()
    };
    if matches!(
        input_type.as_str(),
        "hidden" | "button" | "submit" | "reset" | "image"
    ) {
        return state;
    }

    let value = el.state.value.as_str();
    let required = el.has_attr("required");

    state.value_missing = required
        && match input_type.as_str() {
            "checkbox" => !el.state.checked,
            "radio" => !radio_group_has_checked(doc, id),
            "file" => el.state.files.is_empty(),
            "select" => select_has_no_value(doc, id),
            _ => value.is_empty(),
        };

    if value.is_empty() || el.tag == "select" {
        return state;
    }

    match input_type.as_str() {
        "email" => {
            let multiple = el.has_attr("multiple");
            state.type_mismatch = if multiple {
                value.split(',').any(|v| !EMAIL_RE.is_match(v.trim()))
            } else {
                !EMAIL_RE.is_match(value)
            };
        }
        "url" => state.type_mismatch = !URL_RE.is_match(value),
        _ => {}
    }

    if is_pattern_type(&input_type) {
        if let Some(pattern) = el.attr("pattern") {
            if let Ok(re) = Regex::new(&format!("^(?:{})$", pattern)) {
                state.pattern_mismatch = !re.is_match(value);
            }
        }
    }

    let len = value.chars().count();
    if let Some(max) = el.attr("maxlength").and_then(|v| v.parse::<usize>().ok()) {
        state.too_long = len > max;
    }
    if let Some(min) = el.attr("minlength").and_then(|v| v.parse::<usize>().ok()) {
        state.too_short = len < min;
    }

    match input_type.as_str() {
        "number" | "range" => match value.trim().parse::<f64>() {
            Ok(n) => {
                let min = el.attr("min").and_then(|v| v.parse::<f64>().ok());
                let max = el.attr("max").and_then(|v| v.parse::<f64>().ok());
                state.range_underflow = min.is_some_and(|m| n < m);
                state.range_overflow = max.is_some_and(|m| n > m);
                state.step_mismatch = step_mismatch(n, min, el.attr("step"));
            }
            Err(_) => state.bad_input = true,
        },
        t if is_date_family(t) => {
            if date_family_millis(t, value).is_none() {
                state.bad_input = true;
            } else {
                // ISO forms of each family order lexicographically.
                state.range_underflow = el.attr("min").is_some_and(|m| value < m);
                state.range_overflow = el.attr("max").is_some_and(|m| value > m);
            }
        }
        _ => {}
    }

    state
}

fn step_mismatch(value: f64, min: Option<f64>, step: Option<&str>) -> bool {
    let step = match step {
        Some(s) if s.eq_ignore_ascii_case("any") => return false,
        Some(s) => s.parse::<f64>().ok().filter(|s| *s > 0.0).unwrap_or(1.0),
        None => 1.0,
    };
    let base = min.unwrap_or(0.0);
    let ratio = (value - base) / step;
    (ratio - ratio.round()).abs() > 1e-9
}

/// Radios sharing `id`'s name within its form owner (or the document when
/// it has none). An unnamed radio is a group of one.
pub fn radio_group_nodes(doc: &Document, id: NodeId) -> Vec<NodeId> {
    let Some(name) = doc.element(id).and_then(|el| el.name()) else {
        return vec![id];
    };
    let scope = doc.closest(id, "form");
    doc.composed_descendants(scope.unwrap_or(doc.root()))
        .into_iter()
        .filter(|n| {
            doc.element(*n).is_some_and(|el| {
                el.is_input() && el.input_type() == "radio" && el.name() == Some(name)
            })
        })
        .filter(|n| scope.is_some() || doc.closest(*n, "form").is_none())
        .collect()
}

fn radio_group_has_checked(doc: &Document, id: NodeId) -> bool {
    radio_group_nodes(doc, id).into_iter().any(|n| doc.checked(n))
}

fn select_has_no_value(doc: &Document, id: NodeId) -> bool {
    selected_option_values(doc, id).iter().all(|v| v.is_empty())
}

/// Effectively selected options. A single select with nothing explicitly
/// selected reports its first option, as it is what the user sees.
pub fn selected_options(doc: &Document, select: NodeId) -> Vec<NodeId> {
    let options = select_options(doc, select);
    let multiple = doc.element(select).is_some_and(|el| el.has_attr("multiple"));
    let selected: Vec<NodeId> = options.iter().copied().filter(|o| doc.selected(*o)).collect();
    if multiple {
        return selected;
    }
    match selected.last() {
        Some(last) => vec![*last],
        None => options.first().copied().into_iter().collect(),
    }
}

pub fn selected_option_values(doc: &Document, select: NodeId) -> Vec<String> {
    selected_options(doc, select)
        .into_iter()
        .map(|o| option_value(doc, o))
        .collect()
}

/// `<option>` descendants of a select, including those inside optgroups.
pub fn select_options(doc: &Document, select: NodeId) -> Vec<NodeId> {
    doc.descendants(select)
        .into_iter()
        .filter(|n| doc.tag(*n) == Some("option"))
        .collect()
}

/// Option value: the `value` attribute, else its trimmed text.
pub fn option_value(doc: &Document, option: NodeId) -> String {
    match doc.attr(option, "value") {
        Some(v) => v.to_string(),
        None => doc.text_content(option).trim().to_string(),
    }
}

pub fn is_date_family(input_type: &str) -> bool {
    matches!(
        input_type,
        "date" | "datetime-local" | "datetime" | "time" | "month" | "week"
    )
}

fn is_pattern_type(input_type: &str) -> bool {
    matches!(
        input_type,
        "text" | "search" | "url" | "tel" | "email" | "password"
    )
}

/// Parse a date/time-family value into milliseconds (months for `month`),
/// mirroring `valueAsNumber`.
pub fn date_family_millis(input_type: &str, value: &str) -> Option<i64> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_hms_opt(0, 0, 0)?;
    match input_type {
        "date" => {
            let d = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
            Some((d.and_hms_opt(0, 0, 0)? - epoch).num_milliseconds())
        }
        "datetime-local" | "datetime" => {
            let dt = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
                .ok()?;
            Some((dt - epoch).num_milliseconds())
        }
        "time" => {
            let t = NaiveTime::parse_from_str(value, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
                .ok()?;
            Some((t - NaiveTime::MIN).num_milliseconds())
        }
        "month" => {
            let d = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()?;
            Some((d.year() as i64 - 1970) * 12 + d.month() as i64 - 1)
        }
        "week" => {
            let caps = WEEK_RE.captures(value)?;
            let year: i32 = caps[1].parse().ok()?;
            let week: u32 = caps[2].parse().ok()?;
            let d = NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon)?;
            Some((d.and_hms_opt(0, 0, 0)? - epoch).num_milliseconds())
        }
        _ => None,
    }
}

/// Parse a calendar date in the formats callers commonly supply.
pub fn parse_loose_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d.%m.%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| value.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()))
}
