//! Connector Framework operation types
//!
//! Value types shared by directory reads and change events: UIDs, attribute
//! sets, resolved objects and search filters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a directory entry.
///
/// Depending on configuration this is either the Distinguished Name or an
/// immutable attribute such as `entryUUID` or a changelog `targetGUID`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    /// The attribute name used as the identifier (e.g., "dn", "id", "uid").
    attribute_name: String,
    /// The actual value of the identifier.
    value: String,
}

impl Uid {
    /// Create a new UID with the given attribute name and value.
    pub fn new(attribute_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
        }
    }

    /// Create a UID using the default "uid" attribute name.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self::new("uid", value)
    }

    /// Create a UID for LDAP Distinguished Name.
    pub fn from_dn(dn: impl Into<String>) -> Self {
        Self::new("dn", dn)
    }

    /// Get the attribute name.
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    /// Get the value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute_name, self.value)
    }
}

/// A set of attributes read from a directory entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    /// Map of attribute name to attribute value(s).
    #[serde(flatten)]
    attributes: HashMap<String, AttributeValue>,
}

impl AttributeSet {
    /// Create a new empty attribute set.
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Set an attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get a single-valued string attribute.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_string())
    }

    /// Get the string values of an attribute, single or multi-valued.
    pub fn get_strings(&self, name: &str) -> Option<Vec<&str>> {
        self.get(name).map(|value| match value {
            AttributeValue::String(s) => vec![s.as_str()],
            AttributeValue::Array(values) => {
                values.iter().filter_map(AttributeValue::as_string).collect()
            }
            AttributeValue::Binary(_) => Vec::new(),
        })
    }

    /// Check if an attribute exists.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    /// Find the stored name of an attribute, ignoring ASCII case.
    ///
    /// Directory attribute names are case-insensitive, so `mail` and `Mail`
    /// refer to the same attribute.
    pub fn find_name(&self, name: &str) -> Option<&str> {
        self.attributes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Get an attribute value, ignoring ASCII case of the name.
    pub fn get_ignore_case(&self, name: &str) -> Option<&AttributeValue> {
        self.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Check if an attribute exists, ignoring ASCII case of the name.
    pub fn has_ignore_case(&self, name: &str) -> bool {
        self.find_name(name).is_some()
    }

    /// Remove an attribute, ignoring ASCII case of the name.
    pub fn remove_ignore_case(&mut self, name: &str) -> Option<AttributeValue> {
        let key = self.find_name(name)?.to_string();
        self.attributes.remove(&key)
    }

    /// Get all attribute names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(|s| s.as_str())
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Convert to a HashMap.
    pub fn into_map(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// A value for an attribute, which may be single or multi-valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single string value.
    String(String),
    /// Binary data.
    Binary(Vec<u8>),
    /// Multiple values.
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Get as a string if this is a single string value.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        AttributeValue::Binary(bytes)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(vec: Vec<T>) -> Self {
        AttributeValue::Array(vec.into_iter().map(Into::into).collect())
    }
}

/// Filter for search operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match objects where attribute equals value.
    Equals { attribute: String, value: String },

    /// Match objects where attribute is greater than or equal to value.
    GreaterThanOrEquals { attribute: String, value: String },

    /// Match objects where attribute is less than or equal to value.
    LessThanOrEquals { attribute: String, value: String },

    /// Match objects where attribute exists (has any value).
    Present { attribute: String },

    /// Logical AND of multiple filters.
    And { filters: Vec<Filter> },

    /// Logical OR of multiple filters.
    Or { filters: Vec<Filter> },
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than-or-equals filter.
    pub fn ge(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::GreaterThanOrEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a less-than-or-equals filter.
    pub fn le(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::LessThanOrEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a present (attribute exists) filter.
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }
}

/// An entry as resolved from the directory.
///
/// `uid` may be absent when the configured identifier attribute is not
/// available for the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorObject {
    /// The object class the entry was resolved as (e.g., "inetOrgPerson").
    pub object_class: String,

    /// Identifier of the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,

    /// Distinguished name of the entry.
    pub name: String,

    /// Account status, when the directory exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Attribute values of the entry.
    #[serde(default)]
    pub attributes: AttributeSet,
}

impl ConnectorObject {
    /// Create a new object with an empty attribute set.
    pub fn new(object_class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_class: object_class.into(),
            uid: None,
            name: name.into(),
            enabled: None,
            attributes: AttributeSet::new(),
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_uid(mut self, uid: Option<Uid>) -> Self {
        self.uid = uid;
        self
    }

    /// Set the account status.
    #[must_use]
    pub fn with_enabled(mut self, enabled: Option<bool>) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set an attribute using builder pattern.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.set(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_creation() {
        let uid = Uid::new("dn", "cn=john,ou=users,dc=example,dc=com");
        assert_eq!(uid.attribute_name(), "dn");
        assert_eq!(uid.value(), "cn=john,ou=users,dc=example,dc=com");
        assert_eq!(uid.to_string(), "dn=cn=john,ou=users,dc=example,dc=com");
    }

    #[test]
    fn test_attribute_set() {
        let attrs = AttributeSet::new()
            .with("email", "john@example.com")
            .with("jpegPhoto", vec![0xFFu8, 0xD8]);

        assert_eq!(attrs.get_string("email"), Some("john@example.com"));
        assert_eq!(
            attrs.get("jpegPhoto"),
            Some(&AttributeValue::Binary(vec![0xFF, 0xD8]))
        );
        assert_eq!(attrs.get_string("jpegPhoto"), None);
        assert!(!attrs.has("nonexistent"));
    }

    #[test]
    fn test_multi_valued_attribute() {
        let mut attrs = AttributeSet::new();
        attrs.set(
            "groups",
            AttributeValue::Array(vec![
                AttributeValue::String("admins".to_string()),
                AttributeValue::String("users".to_string()),
            ]),
        );

        let groups = attrs.get_strings("groups").unwrap();
        assert_eq!(groups, vec!["admins", "users"]);
    }

    #[test]
    fn test_filter_construction() {
        let filter = Filter::and(vec![
            Filter::eq("objectClass", "changeLogEntry"),
            Filter::ge("changeNumber", "10"),
            Filter::le("changeNumber", "19"),
        ]);

        if let Filter::And { filters } = filter {
            assert_eq!(filters.len(), 3);
            assert_eq!(filters[1], Filter::ge("changeNumber", "10"));
        } else {
            panic!("Expected AND filter");
        }
    }

    #[test]
    fn test_attribute_set_ignore_case() {
        let mut attrs = AttributeSet::new()
            .with("objectClass", "person")
            .with("mail", "john@example.com");

        assert!(attrs.has_ignore_case("OBJECTCLASS"));
        assert_eq!(attrs.find_name("objectclass"), Some("objectClass"));
        assert_eq!(
            attrs.get_ignore_case("Mail").and_then(|v| v.as_string()),
            Some("john@example.com")
        );

        assert!(attrs.remove_ignore_case("objectclass").is_some());
        assert!(!attrs.has("objectClass"));
        assert!(attrs.remove_ignore_case("objectclass").is_none());
    }

    #[test]
    fn test_connector_object_builder() {
        let object = ConnectorObject::new("inetOrgPerson", "cn=john,dc=example,dc=com")
            .with_uid(Some(Uid::new("entryUUID", "1234")))
            .with_attribute("cn", "john");

        assert_eq!(object.uid.as_ref().map(Uid::value), Some("1234"));
        assert_eq!(object.attributes.get_string("cn"), Some("john"));
        assert_eq!(object.name, "cn=john,dc=example,dc=com");
    }

    #[test]
    fn test_attribute_set_serialization() {
        let attrs = AttributeSet::new()
            .with("email", "john@example.com")
            .with("memberOf", vec!["admins", "users"]);

        let json = serde_json::to_string(&attrs).unwrap();
        let parsed: AttributeSet = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.get_string("email"), Some("john@example.com"));
        assert_eq!(parsed.get_strings("memberOf"), Some(vec!["admins", "users"]));
    }
}
