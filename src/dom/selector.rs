use crate::dom::document::{Document, NodeId};
use crate::error::DocumentError;

// ============================================================================
// Selector model
// ============================================================================

/// Comma-separated list of complex selectors. Matches if any member does.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    /// Compounds left to right; the combinator links a compound to the one before it.
    parts: Vec<(Compound, Combinator)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    nth_of_type: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    value: Option<String>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let mut selectors = Vec::new();
        for raw in split_top_level(input) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(invalid(input, "empty selector in list"));
            }
            selectors.push(Parser::new(trimmed, input).complex()?);
        }
        if selectors.is_empty() {
            return Err(invalid(input, "empty selector"));
        }
        Ok(Self { selectors })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|s| matches_at(doc, &s.parts, s.parts.len() - 1, node))
    }
}

fn matches_at(doc: &Document, parts: &[(Compound, Combinator)], idx: usize, node: NodeId) -> bool {
    let (compound, combinator) = &parts[idx];
    if !compound.matches(doc, node) {
        return false;
    }
    if idx == 0 {
        return true;
    }

    match combinator {
        Combinator::Child => doc
            .parent(node)
            .filter(|p| doc.is_element(*p))
            .is_some_and(|p| matches_at(doc, parts, idx - 1, p)),
        Combinator::Descendant => {
            let mut current = doc.parent(node);
            while let Some(p) = current {
                if !doc.is_element(p) {
                    return false;
                }
                if matches_at(doc, parts, idx - 1, p) {
                    return true;
                }
                current = doc.parent(p);
            }
            false
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.nth_of_type.is_none()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }
        for attr in &self.attrs {
            match (&attr.value, el.attr(&attr.name)) {
                (_, None) => return false,
                (Some(expected), Some(actual)) if expected != actual => return false,
                _ => {}
            }
        }
        if let Some(n) = self.nth_of_type {
            if doc.index_of_type(node) != n {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn invalid(selector: &str, reason: &str) -> DocumentError {
    DocumentError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

/// Split on commas outside brackets, parentheses and quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                out.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &str, source: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn complex(&mut self) -> Result<ComplexSelector, DocumentError> {
        let mut parts: Vec<(Compound, Combinator)> = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let Some(c) = self.peek() else { break };

            let combinator = if c == '>' {
                if parts.is_empty() {
                    return Err(invalid(self.source, "leading combinator"));
                }
                self.pos += 1;
                self.skip_ws();
                Combinator::Child
            } else {
                if !parts.is_empty() && !had_ws {
                    return Err(invalid(self.source, "unexpected character"));
                }
                Combinator::Descendant
            };

            let compound = self.compound()?;
            if compound.is_empty() {
                return Err(invalid(self.source, "expected a compound selector"));
            }
            parts.push((compound, combinator));
        }
        if parts.is_empty() {
            return Err(invalid(self.source, "empty selector"));
        }
        Ok(ComplexSelector { parts })
    }

    fn compound(&mut self) -> Result<Compound, DocumentError> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
            compound.tag = Some("*".into());
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }

        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                '.' => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                '[' => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                ':' => {
                    self.pos += 1;
                    compound.nth_of_type = Some(self.pseudo()?);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, DocumentError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(invalid(self.source, "expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<AttrSelector, DocumentError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                Some(self.attr_value()?)
            }
            _ => return Err(invalid(self.source, "unsupported attribute operator")),
        };
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(invalid(self.source, "unterminated attribute selector"));
        }
        self.pos += 1;
        Ok(AttrSelector { name, value })
    }

    fn attr_value(&mut self) -> Result<String, DocumentError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(invalid(self.source, "unterminated string")),
                        Some('\\') => {
                            self.pos += 1;
                            if let Some(escaped) = self.peek() {
                                out.push(escaped);
                                self.pos += 1;
                            }
                        }
                        Some(c) if c == q => {
                            self.pos += 1;
                            return Ok(out);
                        }
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                    }
                }
            }
            _ => self.ident(),
        }
    }

    fn pseudo(&mut self) -> Result<usize, DocumentError> {
        let name = self.ident()?;
        if name != "nth-of-type" || self.peek() != Some('(') {
            return Err(invalid(self.source, "only :nth-of-type(n) is supported"));
        }
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        if self.peek() != Some(')') {
            return Err(invalid(self.source, "unterminated :nth-of-type"));
        }
        self.pos += 1;
        digits
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid(self.source, "invalid :nth-of-type index"))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Whether a string can be written as a bare `#id` or `.class` token.
pub fn is_simple_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(is_ident_char)
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Quote an attribute value for use inside `[name="..."]`.
pub fn quote_attr_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
