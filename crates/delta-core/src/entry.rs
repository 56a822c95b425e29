//! Directory entry model.
//!
//! Entries are produced by a search and never mutated in place; updates are
//! expressed as a separate modification list (see [`crate::client::Modification`]).

use std::collections::HashMap;

/// Value of a single directory attribute.
///
/// An absent attribute is simply a missing key in the owning
/// [`AttributeMap`]. Equality for diffing uses the single-string
/// projection: the first (or only) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Single-valued attribute.
    Single(String),

    /// Multi-valued attribute, in server order.
    Multi(Vec<String>),
}

impl AttributeValue {
    /// Builds a value from a list of raw values.
    ///
    /// Returns `None` for an empty list so that "no values" and "absent"
    /// collapse into the same representation.
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => Some(Self::Single(values.remove(0))),
            _ => Some(Self::Multi(values)),
        }
    }

    /// Returns the single-string projection: the first (or only) value.
    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Returns all values as a slice.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// Attribute map with case-insensitive keys.
///
/// Directory attribute names are case-insensitive; keys are normalized
/// (lower-cased) on both insertion and lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    inner: HashMap<String, AttributeValue>,
}

impl AttributeMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value under the normalized attribute name.
    pub fn insert(&mut self, name: &str, value: AttributeValue) {
        self.inner.insert(name.to_lowercase(), value);
    }

    /// Looks up an attribute regardless of the case of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.inner.get(&name.to_lowercase())
    }

    /// Returns the single-string projection of an attribute, if present.
    #[must_use]
    pub fn single(&self, name: &str) -> Option<&str> {
        self.get(name).map(AttributeValue::first)
    }

    /// Returns true when the attribute is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_lowercase())
    }

    /// Number of attributes in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true when the map holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over `(normalized name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.inner.iter()
    }
}

/// A single record in a directory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name, unique within its directory.
    pub dn: String,

    /// Case-insensitive view of the entry's attributes.
    pub attributes: AttributeMap,
}

impl DirectoryEntry {
    /// Creates an entry from a DN and its attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Returns the single-string projection of an attribute, if present.
    #[must_use]
    pub fn single_value(&self, name: &str) -> Option<&str> {
        self.attributes.single(name)
    }
}
