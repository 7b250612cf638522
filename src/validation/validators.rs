use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::document::SharedDocument;
use crate::dom::selector::quote_attr_value;
use crate::dom::validity::{EMAIL_RE, URL_RE, parse_loose_date};
use crate::error::ValidatorError;
use crate::scanner::element_model::{CanonicalType, ElementDescriptor, FieldValue};
use crate::validation::result::RuleOutcome;

pub const DEFAULT_PRIORITY: i32 = 50;
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

static PHONE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9\s().\-]+$").expect("static regex"));

/// What a validator can see besides the value itself. The document is
/// shared; lock it only for synchronous reads, never across an await.
pub struct ValidationContext<'a> {
    pub document: &'a SharedDocument,
    pub element: &'a ElementDescriptor,
}

impl ValidationContext<'_> {
    /// `data-*` attribute of the element, keyed without the prefix.
    pub fn data(&self, key: &str) -> Option<&str> {
        self.element.custom.get(key).map(String::as_str)
    }

    /// Boolean `data-*` flag: present and not `"false"`.
    pub fn flag(&self, key: &str) -> bool {
        self.data(key).is_some_and(|v| v != "false")
    }
}

/// A named check run against a value. Validators are awaited one at a
/// time in ascending priority.
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Selected for this element without being listed in `data-validate`.
    fn applies_to(&self, _element: &ElementDescriptor) -> bool {
        false
    }

    async fn validate(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<RuleOutcome, ValidatorError>;
}

/// Names listed in an element's `data-validate` attribute.
pub fn requested_validators(el: &ElementDescriptor) -> Vec<String> {
    el.custom
        .get("validate")
        .map(|raw| {
            raw.split([' ', ','])
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Closure-backed validator (field rules, caller extensions)
// ============================================================================

type CheckFn =
    dyn Fn(&FieldValue, &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> + Send + Sync;

pub struct FnValidator {
    name: String,
    priority: i32,
    check: Arc<CheckFn>,
}

impl FnValidator {
    pub fn new(
        name: &str,
        check: impl Fn(&FieldValue, &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority: DEFAULT_PRIORITY,
            check: Arc::new(check),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Validator for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<RuleOutcome, ValidatorError> {
        (self.check)(value, ctx)
    }
}

// ============================================================================
// Built-ins
// ============================================================================

pub fn builtin_validators() -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(EmailValidator),
        Arc::new(PhoneValidator),
        Arc::new(UrlValidator),
        Arc::new(CreditCardValidator),
        Arc::new(PasswordValidator),
        Arc::new(DateRangeValidator),
        Arc::new(FileValidator),
        Arc::new(NumericRangeValidator),
        Arc::new(ConfirmValidator),
    ]
}

pub struct EmailValidator;

#[async_trait]
impl Validator for EmailValidator {
    fn name(&self) -> &str {
        "email"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.kind == CanonicalType::Email
    }

    async fn validate(&self, value: &FieldValue, _: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        if text.is_empty() || EMAIL_RE.is_match(text.trim()) {
            return Ok(RuleOutcome::pass());
        }
        Ok(RuleOutcome::fail("Please enter a valid email address"))
    }
}

pub struct PhoneValidator;

#[async_trait]
impl Validator for PhoneValidator {
    fn name(&self) -> &str {
        "phone"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.kind == CanonicalType::Tel
    }

    async fn validate(&self, value: &FieldValue, _: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        let text = text.trim();
        if text.is_empty() {
            return Ok(RuleOutcome::pass());
        }
        let digits = text.chars().filter(char::is_ascii_digit).count();
        if PHONE_CHARS_RE.is_match(text) && (7..=15).contains(&digits) {
            Ok(RuleOutcome::pass())
        } else {
            Ok(RuleOutcome::fail("Please enter a valid phone number"))
        }
    }
}

pub struct UrlValidator;

#[async_trait]
impl Validator for UrlValidator {
    fn name(&self) -> &str {
        "url"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.kind == CanonicalType::Url
    }

    async fn validate(&self, value: &FieldValue, _: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        if text.is_empty() || URL_RE.is_match(text.trim()) {
            return Ok(RuleOutcome::pass());
        }
        Ok(RuleOutcome::fail("Please enter a valid URL"))
    }
}

/// Luhn checksum over a digit string.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

pub struct CreditCardValidator;

#[async_trait]
impl Validator for CreditCardValidator {
    fn name(&self) -> &str {
        "credit-card"
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn validate(&self, value: &FieldValue, _: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        let compact: String = text.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
        if compact.is_empty() {
            return Ok(RuleOutcome::pass());
        }
        if !(13..=19).contains(&compact.len()) || !luhn_valid(&compact) {
            return Ok(RuleOutcome::fail("Please enter a valid card number"));
        }
        Ok(RuleOutcome::pass())
    }
}

pub struct PasswordValidator;

#[async_trait]
impl Validator for PasswordValidator {
    fn name(&self) -> &str {
        "password"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.kind == CanonicalType::Password
    }

    async fn validate(&self, value: &FieldValue, ctx: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        if text.is_empty() {
            return Ok(RuleOutcome::pass());
        }
        let min_length = match ctx.data("min-length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ValidatorError::new(self.name(), format!("bad data-min-length '{}'", raw)))?,
            None => DEFAULT_PASSWORD_MIN_LENGTH,
        };

        let mut missing = Vec::new();
        if text.chars().count() < min_length {
            missing.push(format!("at least {} characters", min_length));
        }
        let classes: [(&str, &str, fn(&char) -> bool); 4] = [
            ("require-uppercase", "an uppercase letter", |c| c.is_uppercase()),
            ("require-lowercase", "a lowercase letter", |c| c.is_lowercase()),
            ("require-digit", "a digit", char::is_ascii_digit),
            ("require-special", "a special character", is_special),
        ];
        for (flag, description, test) in classes {
            if ctx.flag(flag) && !text.chars().any(|c| test(&c)) {
                missing.push(description.to_string());
            }
        }

        if missing.is_empty() {
            Ok(RuleOutcome::pass())
        } else {
            Ok(RuleOutcome::fail(format!("Password must contain {}", missing.join(", "))))
        }
    }
}

fn is_special(c: &char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

pub struct DateRangeValidator;

impl DateRangeValidator {
    fn bound(&self, ctx: &ValidationContext<'_>, key: &str) -> Result<Option<NaiveDate>, ValidatorError> {
        match ctx.data(key) {
            None => Ok(None),
            Some(raw) => parse_loose_date(raw)
                .map(Some)
                .ok_or_else(|| ValidatorError::new(self.name(), format!("bad data-{} '{}'", key, raw))),
        }
    }
}

#[async_trait]
impl Validator for DateRangeValidator {
    fn name(&self) -> &str {
        "date-range"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        matches!(el.kind, CanonicalType::Date | CanonicalType::DatetimeLocal)
            && (el.custom.contains_key("min-date") || el.custom.contains_key("max-date"))
    }

    async fn validate(&self, value: &FieldValue, ctx: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        if text.trim().is_empty() {
            return Ok(RuleOutcome::pass());
        }
        let Some(date) = parse_loose_date(&text) else {
            return Ok(RuleOutcome::fail("Please enter a valid date"));
        };
        if let Some(min) = self.bound(ctx, "min-date")? {
            if date < min {
                return Ok(RuleOutcome::fail(format!("Date must be on or after {}", min)));
            }
        }
        if let Some(max) = self.bound(ctx, "max-date")? {
            if date > max {
                return Ok(RuleOutcome::fail(format!("Date must be on or before {}", max)));
            }
        }
        Ok(RuleOutcome::pass())
    }
}

/// Whether a file matches one `accept` token: `.ext`, `type/*` or an exact
/// MIME type.
pub fn accept_matches(token: &str, file_name: &str, mime_type: &str) -> bool {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return true;
    }
    if token.starts_with('.') {
        return file_name.to_lowercase().ends_with(&token);
    }
    if let Some(prefix) = token.strip_suffix("/*") {
        return mime_type
            .to_lowercase()
            .split('/')
            .next()
            .is_some_and(|major| major == prefix);
    }
    mime_type.eq_ignore_ascii_case(&token)
}

pub struct FileValidator;

#[async_trait]
impl Validator for FileValidator {
    fn name(&self) -> &str {
        "file"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.kind == CanonicalType::File
    }

    async fn validate(&self, value: &FieldValue, ctx: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let FieldValue::Files(files) = value else {
            return Ok(RuleOutcome::pass());
        };
        let parse = |key: &str| -> Result<Option<u64>, ValidatorError> {
            ctx.data(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| ValidatorError::new("file", format!("bad data-{} '{}'", key, raw)))
                })
                .transpose()
        };

        if let Some(max_files) = parse("max-files")? {
            if files.len() as u64 > max_files {
                return Ok(RuleOutcome::fail(format!("At most {} files are allowed", max_files)));
            }
        }
        if let Some(max_size) = parse("max-size")? {
            if let Some(big) = files.iter().find(|f| f.size > max_size) {
                return Ok(RuleOutcome::fail(format!(
                    "{} exceeds the {} byte limit",
                    big.name, max_size
                )));
            }
        }
        if let Some(accept) = ctx.element.constraints.accept.as_deref() {
            let tokens: Vec<&str> = accept.split(',').collect();
            if let Some(bad) = files
                .iter()
                .find(|f| !tokens.iter().any(|t| accept_matches(t, &f.name, &f.mime_type)))
            {
                return Ok(RuleOutcome::fail(format!("{} is not an accepted file type", bad.name)));
            }
        }
        Ok(RuleOutcome::pass())
    }
}

pub struct NumericRangeValidator;

impl NumericRangeValidator {
    fn bound(&self, ctx: &ValidationContext<'_>, key: &str) -> Result<Option<f64>, ValidatorError> {
        ctx.data(key)
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| ValidatorError::new(self.name(), format!("bad data-{} '{}'", key, raw)))
            })
            .transpose()
    }
}

#[async_trait]
impl Validator for NumericRangeValidator {
    fn name(&self) -> &str {
        "numeric-range"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        matches!(
            el.kind,
            CanonicalType::Number
                | CanonicalType::Range
                | CanonicalType::AriaSlider
                | CanonicalType::AriaSpinbutton
        ) && (el.custom.contains_key("min") || el.custom.contains_key("max"))
    }

    async fn validate(&self, value: &FieldValue, ctx: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let text = value.as_text();
        let text = text.trim();
        if text.is_empty() {
            return Ok(RuleOutcome::pass());
        }
        let Ok(number) = text.parse::<f64>() else {
            return Ok(RuleOutcome::fail("Please enter a number"));
        };
        if let Some(min) = self.bound(ctx, "min")? {
            if number < min {
                return Ok(RuleOutcome::fail(format!("Value must be at least {}", min)));
            }
        }
        if let Some(max) = self.bound(ctx, "max")? {
            if number > max {
                return Ok(RuleOutcome::fail(format!("Value must be at most {}", max)));
            }
        }
        Ok(RuleOutcome::pass())
    }
}

/// Compares the value with the field named by `data-confirm`.
pub struct ConfirmValidator;

#[async_trait]
impl Validator for ConfirmValidator {
    fn name(&self) -> &str {
        "confirm"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn applies_to(&self, el: &ElementDescriptor) -> bool {
        el.custom.contains_key("confirm")
    }

    async fn validate(&self, value: &FieldValue, ctx: &ValidationContext<'_>) -> Result<RuleOutcome, ValidatorError> {
        let Some(target) = ctx.data("confirm") else {
            return Ok(RuleOutcome::pass());
        };
        let selector = format!("[name={}]", quote_attr_value(target));
        let expected = {
            let doc = ctx.document.read();
            let other = doc
                .query_selector(doc.root(), &selector)
                .map_err(|e| ValidatorError::new(self.name(), e.to_string()))?
                .ok_or_else(|| ValidatorError::new(self.name(), format!("no field named '{}'", target)))?;
            doc.value(other).unwrap_or("").to_string()
        };
        if value.as_text() == expected {
            Ok(RuleOutcome::pass())
        } else {
            Ok(RuleOutcome::fail(format!("Value must match {}", target)))
        }
    }
}
