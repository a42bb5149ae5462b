use std::fmt;
use std::rc::Rc;
use crate::orm::Model;
use crate::orm::inflector::{dasherize, pluralize};

pub type KeyTransform = Rc<dyn Fn(&str) -> String>;
pub type LinkagePredicate = Rc<dyn Fn(&str, &Model) -> bool>;

/// How resources of one type are rendered.
///
/// # Example
///
/// ```
/// use memorel::SerializerConfig;
///
/// let config = SerializerConfig::new()
///     .include(&["blogPosts"])
///     .always_include_linkage_data(true);
/// assert_eq!(config.included(), ["blogPosts"]);
/// ```
#[derive(Clone)]
pub struct SerializerConfig {
    key_transform: KeyTransform,
    type_key: KeyTransform,
    always_include_linkage_data: bool,
    should_include_linkage_data: Option<LinkagePredicate>,
    include: Vec<String>,
    attrs: Option<Vec<String>>,
}

impl SerializerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform applied to attribute and relationship names. Defaults to dasherizing.
    pub fn key_transform(mut self, transform: impl Fn(&str) -> String + 'static) -> Self {
        self.key_transform = Rc::new(transform);
        self
    }

    /// Maps a model name to its document `type`. Defaults to the dasherized plural.
    pub fn type_key(mut self, transform: impl Fn(&str) -> String + 'static) -> Self {
        self.type_key = Rc::new(transform);
        self
    }

    pub fn always_include_linkage_data(mut self, enabled: bool) -> Self {
        self.always_include_linkage_data = enabled;
        self
    }

    /// Per-relationship override, called with the relationship name and the resource.
    pub fn should_include_linkage_data(
        mut self,
        predicate: impl Fn(&str, &Model) -> bool + 'static,
    ) -> Self {
        self.should_include_linkage_data = Some(Rc::new(predicate));
        self
    }

    /// Relationships whose related resources are side-loaded.
    pub fn include(mut self, relationships: &[&str]) -> Self {
        self.include = relationships.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Restricts the serialized attributes to this list.
    pub fn attrs(mut self, attrs: &[&str]) -> Self {
        self.attrs = Some(attrs.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn included(&self) -> &[String] {
        &self.include
    }

    pub(crate) fn includes(&self, relationship: &str) -> bool {
        self.include.iter().any(|r| r == relationship)
    }

    pub(crate) fn key_for(&self, name: &str) -> String {
        (self.key_transform)(name)
    }

    pub(crate) fn type_for(&self, model_name: &str) -> String {
        (self.type_key)(model_name)
    }

    pub(crate) fn exposes(&self, attr: &str) -> bool {
        self.attrs
            .as_ref()
            .is_none_or(|attrs| attrs.iter().any(|a| a == attr))
    }

    pub(crate) fn wants_linkage(&self, relationship: &str, model: &Model) -> bool {
        self.always_include_linkage_data
            || self.includes(relationship)
            || self
                .should_include_linkage_data
                .as_ref()
                .is_some_and(|predicate| predicate(relationship, model))
    }
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            key_transform: Rc::new(dasherize),
            type_key: Rc::new(|model_name: &str| dasherize(&pluralize(model_name))),
            always_include_linkage_data: false,
            should_include_linkage_data: None,
            include: Vec::new(),
            attrs: None,
        }
    }
}

impl fmt::Debug for SerializerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerConfig")
            .field("always_include_linkage_data", &self.always_include_linkage_data)
            .field("should_include_linkage_data", &self.should_include_linkage_data.is_some())
            .field("include", &self.include)
            .field("attrs", &self.attrs)
            .finish()
    }
}
