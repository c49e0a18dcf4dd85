//! Directory entries and attribute modifications.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::dn::Dn;

/// A directory entry: a DN plus a multi-valued attribute map.
///
/// Attribute types are matched case-insensitively; attribute values keep
/// their original spelling but compare case-insensitively where the data
/// model calls for it (object classes, member references).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    dn: Dn,
    attributes: HashMap<String, Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Attribute {
    /// Attribute type as first written (for display).
    name: String,
    values: Vec<String>,
}

impl Entry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: HashMap::new(),
        }
    }

    /// Creates a new builder for the given DN.
    #[must_use]
    pub fn builder(dn: Dn) -> EntryBuilder {
        EntryBuilder { entry: Entry::new(dn) }
    }

    /// The entry's distinguished name.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Re-homes the entry under a new DN, keeping all attributes.
    #[must_use]
    pub fn with_dn(mut self, dn: Dn) -> Self {
        self.dn = dn;
        self
    }

    /// All values of the attribute, or an empty slice if absent.
    #[must_use]
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(&attribute.to_ascii_lowercase())
            .map_or(&[], |attr| attr.values.as_slice())
    }

    /// The first value of the attribute, if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute).first().map(String::as_str)
    }

    /// Returns true if the attribute holds the value (case-insensitive).
    #[must_use]
    pub fn has_value(&self, attribute: &str, value: &str) -> bool {
        self.values(attribute)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Returns true if the attribute is present with at least one value.
    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        !self.values(attribute).is_empty()
    }

    /// Returns true if the entry carries the given object class.
    #[must_use]
    pub fn has_object_class(&self, object_class: &str) -> bool {
        self.has_value("objectClass", object_class)
    }

    /// Sets (replaces) all values of an attribute. Removes it when empty.
    pub fn set_values<I, V>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let key = attribute.to_ascii_lowercase();
        if values.is_empty() {
            self.attributes.remove(&key);
        } else {
            self.attributes.insert(
                key,
                Attribute {
                    name: attribute.to_string(),
                    values,
                },
            );
        }
    }

    /// Applies a single modification in place.
    ///
    /// # Errors
    ///
    /// Returns [`ModifyRejection`] when the change is not applicable:
    /// adding a value that already exists, or deleting one that does not.
    pub fn apply(&mut self, modification: &Modification) -> Result<(), ModifyRejection> {
        match modification {
            Modification::Add { attribute, values } => {
                let mut current = self.values(attribute).to_vec();
                for value in values {
                    if current.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                        return Err(ModifyRejection::DuplicateValue {
                            attribute: attribute.clone(),
                            value: value.clone(),
                        });
                    }
                    current.push(value.clone());
                }
                self.set_values(attribute, current);
                Ok(())
            }
            Modification::Delete { attribute, values } => {
                if !self.has_attribute(attribute) {
                    return Err(ModifyRejection::NoSuchAttribute {
                        attribute: attribute.clone(),
                    });
                }
                if values.is_empty() {
                    self.set_values(attribute, Vec::<String>::new());
                    return Ok(());
                }
                let mut current = self.values(attribute).to_vec();
                for value in values {
                    let before = current.len();
                    current.retain(|v| !v.eq_ignore_ascii_case(value));
                    if current.len() == before {
                        return Err(ModifyRejection::NoSuchValue {
                            attribute: attribute.clone(),
                            value: value.clone(),
                        });
                    }
                }
                self.set_values(attribute, current);
                Ok(())
            }
            Modification::Replace { attribute, values } => {
                self.set_values(attribute, values.clone());
                Ok(())
            }
        }
    }
}

/// Builder for [`Entry`].
#[derive(Debug)]
pub struct EntryBuilder {
    entry: Entry,
}

impl EntryBuilder {
    /// Sets all values of an attribute.
    #[must_use]
    pub fn attr<I, V>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entry.set_values(attribute, values);
        self
    }

    /// Builds the [`Entry`].
    #[must_use]
    pub fn build(self) -> Entry {
        self.entry
    }
}

/// An attribute change request against a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values (empty deletes the whole attribute).
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete.
        values: Vec<String>,
    },
    /// Replace all attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

impl Modification {
    /// Convenience constructor for a single-value add.
    #[must_use]
    pub fn add_value(attribute: &str, value: impl Into<String>) -> Self {
        Self::Add {
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }

    /// Convenience constructor for a single-value delete.
    #[must_use]
    pub fn delete_value(attribute: &str, value: impl Into<String>) -> Self {
        Self::Delete {
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }
}

/// Reason an attribute modification was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyRejection {
    /// The value to add is already present.
    DuplicateValue {
        /// Attribute that was targeted.
        attribute: String,
        /// Offending value.
        value: String,
    },
    /// The value to delete is not present.
    NoSuchValue {
        /// Attribute that was targeted.
        attribute: String,
        /// Missing value.
        value: String,
    },
    /// The attribute to delete from is not present at all.
    NoSuchAttribute {
        /// Attribute that was targeted.
        attribute: String,
    },
}

impl fmt::Display for ModifyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateValue { attribute, value } => {
                write!(f, "attribute {attribute} already has value {value}")
            }
            Self::NoSuchValue { attribute, value } => {
                write!(f, "attribute {attribute} has no value {value}")
            }
            Self::NoSuchAttribute { attribute } => {
                write!(f, "attribute {attribute} is not present")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        Entry::builder(Dn::parse("cn=admins,ou=Groups,o=test").unwrap())
            .attr("objectClass", ["top", "groupOfNames"])
            .attr("cn", ["admins"])
            .attr("member", ["uid=u1,ou=People,o=test"])
            .build()
    }

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = sample_entry();
        assert_eq!(entry.first("CN"), Some("admins"));
        assert!(entry.has_object_class("groupofnames"));
        assert!(entry.has_value("Member", "UID=U1,ou=People,o=test"));
        assert!(!entry.has_attribute("memberURL"));
    }

    #[test]
    fn add_rejects_duplicate_value() {
        let mut entry = sample_entry();
        let result = entry.apply(&Modification::add_value("member", "uid=U1,ou=People,o=test"));
        assert!(matches!(
            result,
            Err(ModifyRejection::DuplicateValue { .. })
        ));

        entry
            .apply(&Modification::add_value("member", "uid=u2,ou=People,o=test"))
            .unwrap();
        assert_eq!(entry.values("member").len(), 2);
    }

    #[test]
    fn delete_rejects_missing_value() {
        let mut entry = sample_entry();
        let result = entry.apply(&Modification::delete_value("member", "uid=ghost,o=test"));
        assert!(matches!(result, Err(ModifyRejection::NoSuchValue { .. })));

        let result = entry.apply(&Modification::delete_value("seeAlso", "cn=x,o=test"));
        assert!(matches!(
            result,
            Err(ModifyRejection::NoSuchAttribute { .. })
        ));

        entry
            .apply(&Modification::delete_value("member", "uid=u1,ou=People,o=test"))
            .unwrap();
        assert!(!entry.has_attribute("member"));
    }

    #[test]
    fn delete_with_no_values_removes_attribute() {
        let mut entry = sample_entry();
        entry
            .apply(&Modification::Delete {
                attribute: "member".to_string(),
                values: Vec::new(),
            })
            .unwrap();
        assert!(!entry.has_attribute("member"));
    }

    #[test]
    fn replace_overwrites_values() {
        let mut entry = sample_entry();
        entry
            .apply(&Modification::Replace {
                attribute: "member".to_string(),
                values: vec!["uid=u3,ou=People,o=test".to_string()],
            })
            .unwrap();
        assert_eq!(entry.values("member"), ["uid=u3,ou=People,o=test"]);
    }

    #[test]
    fn serde_round_trip() {
        let entry = sample_entry();
        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
