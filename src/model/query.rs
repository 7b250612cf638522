use std::fmt;
use std::sync::Arc;

use crate::scanner::element_model::{CanonicalType, ElementDescriptor};

type Predicate = Arc<dyn Fn(&ElementDescriptor) -> bool + Send + Sync>;

/// Filter for `SemanticModel::find_elements`. Every set criterion must hold.
#[derive(Clone, Default)]
pub struct ElementCriteria {
    pub kind: Option<CanonicalType>,
    pub tag: Option<String>,
    pub required: Option<bool>,
    pub has_validation: Option<bool>,
    pub has_accessibility: Option<bool>,
    pub has_custom: Option<bool>,
    pub value: Option<String>,
    pub class: Option<String>,
    pub predicate: Option<Predicate>,
}

impl fmt::Debug for ElementCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCriteria")
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .field("required", &self.required)
            .field("has_validation", &self.has_validation)
            .field("has_accessibility", &self.has_accessibility)
            .field("has_custom", &self.has_custom)
            .field("value", &self.value)
            .field("class", &self.class)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ElementCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: CanonicalType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_lowercase());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn has_validation(mut self, flag: bool) -> Self {
        self.has_validation = Some(flag);
        self
    }

    pub fn has_accessibility(mut self, flag: bool) -> Self {
        self.has_accessibility = Some(flag);
        self
    }

    pub fn has_custom(mut self, flag: bool) -> Self {
        self.has_custom = Some(flag);
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn predicate(
        mut self,
        predicate: impl Fn(&ElementDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches(&self, el: &ElementDescriptor) -> bool {
        let flag = |want: Option<bool>, have: bool| want.is_none_or(|w| w == have);

        self.kind.is_none_or(|k| k == el.kind)
            && self.tag.as_deref().is_none_or(|t| t == el.tag_name)
            && flag(self.required, el.constraints.required)
            && flag(self.has_validation, el.has_validation())
            && flag(self.has_accessibility, el.has_accessibility())
            && flag(self.has_custom, el.has_custom())
            && self.value.as_deref().is_none_or(|v| v == el.value.as_text())
            && self
                .class
                .as_deref()
                .is_none_or(|c| el.classes.iter().any(|have| have == c))
            && self.predicate.as_ref().is_none_or(|p| p(el))
    }
}
