//! Interpretation of a changelog LDIF fragment into a [`ChangeMap`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use dirsync_connector::error::ConnectorError;
use dirsync_connector::operation::AttributeValue;

use super::ldif::{decode_value, tokenize, Token};

/// Change type of a changelog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// Entry added.
    Add,
    /// Attributes modified.
    Modify,
    /// Entry renamed (`modrdn`).
    ModRdn,
    /// Entry renamed or moved (`moddn`).
    ModDn,
    /// Entry deleted.
    Delete,
}

impl ChangeType {
    /// Whether the change renames or moves the entry.
    #[must_use]
    pub fn is_rename(&self) -> bool {
        matches!(self, ChangeType::ModRdn | ChangeType::ModDn)
    }

    /// Get the LDIF keyword of this change type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Modify => "modify",
            ChangeType::ModRdn => "modrdn",
            ChangeType::ModDn => "moddn",
            ChangeType::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(ChangeType::Add),
            "modify" => Ok(ChangeType::Modify),
            "modrdn" => Ok(ChangeType::ModRdn),
            "moddn" => Ok(ChangeType::ModDn),
            "delete" => Ok(ChangeType::Delete),
            _ => Err(ConnectorError::InvalidData {
                message: format!("unknown change type '{s}'"),
            }),
        }
    }
}

/// Attribute values asserted by one change.
///
/// A `None` value marks an attribute removed by a `modify` change.
/// Names keep the case used by the directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeMap(HashMap<String, Option<Vec<AttributeValue>>>);

impl ChangeMap {
    /// Create an empty change map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the values of an attribute, replacing earlier ones.
    pub fn put(&mut self, name: impl Into<String>, values: Option<Vec<AttributeValue>>) {
        self.0.insert(name.into(), values);
    }

    /// Get the entry for an attribute, by exact name.
    pub fn get(&self, name: &str) -> Option<&Option<Vec<AttributeValue>>> {
        self.0.get(name)
    }

    fn find(&self, name: &str) -> Option<&Option<Vec<AttributeValue>>> {
        self.0.get(name).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Get the values of an attribute, ignoring ASCII case of the name.
    ///
    /// Returns `None` for absent and removed attributes alike.
    pub fn values(&self, name: &str) -> Option<&[AttributeValue]> {
        self.find(name).and_then(Option::as_deref)
    }

    /// Get the first string value of an attribute, ignoring ASCII case.
    pub fn first_string(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.iter().find_map(AttributeValue::as_string))
    }

    /// Whether the change removed the attribute.
    pub fn is_removed(&self, name: &str) -> bool {
        matches!(self.find(name), Some(None))
    }

    /// Whether the change mentions the attribute.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Number of attributes mentioned.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attribute is mentioned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<Vec<AttributeValue>>)> {
        self.0.iter()
    }

    /// Convert to a HashMap.
    pub fn into_map(self) -> HashMap<String, Option<Vec<AttributeValue>>> {
        self.0
    }
}

/// Build the change map of a changelog record.
///
/// Unknown change types yield an empty map. Values that fail to decode are
/// left out.
pub fn interpret(change_type: &str, ldif: &str) -> ChangeMap {
    match change_type.parse::<ChangeType>() {
        Ok(change_type) => interpret_change(change_type, ldif),
        Err(_) => ChangeMap::new(),
    }
}

/// Build the change map for a known change type.
pub fn interpret_change(change_type: ChangeType, ldif: &str) -> ChangeMap {
    let tokens = tokenize(ldif);
    match change_type {
        ChangeType::Add => added(&tokens),
        ChangeType::Modify => modified(&tokens),
        ChangeType::ModRdn | ChangeType::ModDn => renamed(&tokens),
        ChangeType::Delete => ChangeMap::new(),
    }
}

fn to_value(raw_value: &str) -> Option<AttributeValue> {
    let bytes = decode_value(raw_value)?;
    Some(match String::from_utf8(bytes) {
        Ok(text) => AttributeValue::String(text),
        Err(e) => AttributeValue::Binary(e.into_bytes()),
    })
}

fn added(tokens: &[Token]) -> ChangeMap {
    let mut values: HashMap<String, Vec<AttributeValue>> = HashMap::new();
    for token in tokens {
        if let Token::Pair { name, raw_value } = token {
            if let Some(value) = to_value(raw_value) {
                values.entry(name.clone()).or_default().push(value);
            }
        }
    }
    ChangeMap(values.into_iter().map(|(k, v)| (k, Some(v))).collect())
}

fn modified(tokens: &[Token]) -> ChangeMap {
    let mut changes = ChangeMap::new();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        let Token::Pair { name, raw_value } = token else {
            continue;
        };
        let operation = name.to_lowercase();
        if !matches!(operation.as_str(), "add" | "delete" | "replace") {
            continue;
        }
        let Some(AttributeValue::String(attribute)) = to_value(raw_value) else {
            continue;
        };

        let mut values = Vec::new();
        for token in iter.by_ref() {
            match token {
                Token::Pair { raw_value, .. } => values.extend(to_value(raw_value)),
                // Some directories put blank lines inside a modify block.
                Token::RecordSeparator => continue,
                Token::AttributeSeparator => break,
            }
        }

        if !values.is_empty() {
            changes.put(attribute, Some(values));
        } else if operation == "delete" {
            changes.put(attribute, None);
        }
    }

    changes
}

fn renamed(tokens: &[Token]) -> ChangeMap {
    let mut changes = ChangeMap::new();
    for token in tokens {
        if let Token::Pair { name, raw_value } = token {
            if let Some(value) = to_value(raw_value) {
                changes.put(name.clone(), Some(vec![value]));
            }
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Option<Vec<AttributeValue>> {
        Some(values.iter().map(|v| AttributeValue::from(*v)).collect())
    }

    #[test]
    fn test_change_type_parsing() {
        assert_eq!("MODIFY".parse::<ChangeType>().unwrap(), ChangeType::Modify);
        assert_eq!(" modrdn ".parse::<ChangeType>().unwrap(), ChangeType::ModRdn);
        assert_eq!("ModDN".parse::<ChangeType>().unwrap(), ChangeType::ModDn);
        assert!("rename".parse::<ChangeType>().is_err());
        assert!(ChangeType::ModDn.is_rename());
        assert!(!ChangeType::Modify.is_rename());
    }

    #[test]
    fn test_add_collects_every_pair() {
        let changes = interpret("add", "cn: Alice\nmail: a@x.com");

        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get("cn"), Some(&strings(&["Alice"])));
        assert_eq!(changes.get("mail"), Some(&strings(&["a@x.com"])));
    }

    #[test]
    fn test_add_accumulates_repeated_attributes() {
        let changes = interpret(
            "ADD",
            "objectClass: top\nobjectClass: person\n-\ncn: Alice\n\nsn: Smith",
        );

        assert_eq!(changes.get("objectClass"), Some(&strings(&["top", "person"])));
        assert_eq!(changes.get("sn"), Some(&strings(&["Smith"])));
    }

    #[test]
    fn test_modify_accumulates_values() {
        let changes = interpret("modify", "replace: mail\nmail: a@x.com\nmail: b@x.com\n-");

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("mail"), Some(&strings(&["a@x.com", "b@x.com"])));
    }

    #[test]
    fn test_modify_delete_without_values_marks_removal() {
        let changes = interpret("modify", "delete: mail\n-");

        assert_eq!(changes.get("mail"), Some(&None));
        assert!(changes.is_removed("MAIL"));
        assert!(changes.values("mail").is_none());
    }

    #[test]
    fn test_modify_delete_with_values_lists_them() {
        let changes = interpret("modify", "delete: member\nmember: cn=a\n-");
        assert_eq!(changes.get("member"), Some(&strings(&["cn=a"])));
    }

    #[test]
    fn test_modify_empty_replace_is_ignored() {
        let changes = interpret("modify", "replace: description\n-\nadd: cn\ncn: b\n-");
        assert!(!changes.contains("description"));
        assert_eq!(changes.get("cn"), Some(&strings(&["b"])));
    }

    #[test]
    fn test_modify_tolerates_record_separators_inside_block() {
        let changes = interpret(
            "modify",
            "replace: mail\nmail: a@x.com\n\nmail: b@x.com\n-\n\nadd: sn\nsn: Smith\n-\n",
        );

        assert_eq!(changes.get("mail"), Some(&strings(&["a@x.com", "b@x.com"])));
        assert_eq!(changes.get("sn"), Some(&strings(&["Smith"])));
    }

    #[test]
    fn test_modify_several_blocks_and_trailing_block_without_separator() {
        let changes = interpret(
            "modify",
            "replace: cn\ncn: Bob\n-\ndelete: description\n-\nadd: telephoneNumber\ntelephoneNumber: 123",
        );

        assert_eq!(changes.get("cn"), Some(&strings(&["Bob"])));
        assert_eq!(changes.get("description"), Some(&None));
        assert_eq!(changes.get("telephoneNumber"), Some(&strings(&["123"])));
    }

    #[test]
    fn test_modify_base64_values() {
        let changes = interpret("modify", "replace: cn\ncn:: QWxpY2U=\n-");
        assert_eq!(changes.first_string("cn"), Some("Alice"));
    }

    #[test]
    fn test_rename_last_value_wins() {
        let changes = interpret("modrdn", "newRdn: cn=Bob\nnewSuperior: ou=People");

        assert_eq!(changes.get("newRdn"), Some(&strings(&["cn=Bob"])));
        assert_eq!(changes.get("newSuperior"), Some(&strings(&["ou=People"])));

        let changes = interpret("moddn", "newrdn: cn=Bob\nnewrdn: cn=Robert");
        assert_eq!(changes.get("newrdn"), Some(&strings(&["cn=Robert"])));
        assert_eq!(changes.first_string("newRdn"), Some("cn=Robert"));
    }

    #[test]
    fn test_delete_and_unknown_yield_empty_map() {
        assert!(interpret("delete", "cn: Alice").is_empty());
        assert!(interpret("frobnicate", "cn: Alice").is_empty());
    }

    #[test]
    fn test_malformed_base64_value_is_dropped() {
        let changes = interpret("add", "cn: Alice\nphoto:: %%%not-base64%%%\nmail: a@x.com");

        assert_eq!(changes.len(), 2);
        assert!(!changes.contains("photo"));
        assert_eq!(changes.first_string("mail"), Some("a@x.com"));

        let changes = interpret(
            "modify",
            "replace: mail\nmail:: !!!\nmail: b@x.com\n-\nreplace: sn\nsn: Smith\n-",
        );
        assert_eq!(changes.get("mail"), Some(&strings(&["b@x.com"])));
        assert_eq!(changes.get("sn"), Some(&strings(&["Smith"])));
    }

    #[test]
    fn test_binary_values_stay_binary() {
        // 0xFF 0xD8 is not valid UTF-8.
        let changes = interpret("add", "jpegPhoto:: /9g=");
        assert_eq!(
            changes.values("jpegPhoto"),
            Some(&[AttributeValue::Binary(vec![0xFF, 0xD8])][..])
        );
    }
}
