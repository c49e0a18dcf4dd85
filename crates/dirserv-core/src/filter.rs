//! LDAP search filters: parsing and evaluation against entries.
//!
//! Covers the portion of RFC 4515 the server uses for group definition
//! filters and membership URLs: AND, OR, NOT, equality, ordering
//! (`>=` / `<=`), presence and substring assertions. Extensible matching
//! rules are out of scope.

use std::fmt;
use thiserror::Error;

use crate::entry::Entry;
use crate::error::Error as CoreError;

/// Errors that can occur when parsing a search filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter string was empty.
    #[error("search filter cannot be empty")]
    Empty,
    /// Parentheses were unbalanced.
    #[error("unbalanced parentheses in filter: {0}")]
    Unbalanced(String),
    /// A component was not a valid assertion.
    #[error("invalid filter component: {0}")]
    InvalidComponent(String),
    /// An escape sequence was not two hex digits.
    #[error("invalid escape sequence in filter value: {0}")]
    InvalidEscape(String),
}

impl From<FilterError> for CoreError {
    fn from(err: FilterError) -> Self {
        CoreError::InvalidFilter(err.to_string())
    }
}

/// A parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// Every subordinate filter must match. `(&)` matches everything.
    And(Vec<SearchFilter>),
    /// At least one subordinate filter must match. `(|)` matches nothing.
    Or(Vec<SearchFilter>),
    /// The subordinate filter must not match.
    Not(Box<SearchFilter>),
    /// The attribute holds the value (case-insensitive).
    Equality {
        /// Attribute type.
        attribute: String,
        /// Assertion value.
        value: String,
    },
    /// Some value of the attribute is >= the assertion value.
    GreaterOrEqual {
        /// Attribute type.
        attribute: String,
        /// Assertion value.
        value: String,
    },
    /// Some value of the attribute is <= the assertion value.
    LessOrEqual {
        /// Attribute type.
        attribute: String,
        /// Assertion value.
        value: String,
    },
    /// The attribute is present with at least one value.
    Present {
        /// Attribute type.
        attribute: String,
    },
    /// Substring assertion, e.g. `(cn=ad*in*s)`.
    Substring {
        /// Attribute type.
        attribute: String,
        /// Required prefix, if any.
        leading: Option<String>,
        /// Required interior fragments, in order.
        middle: Vec<String>,
        /// Required suffix, if any.
        trailing: Option<String>,
    },
}

impl SearchFilter {
    /// Parses a filter from its string form. Outer parentheses are optional.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the input is empty or syntactically
    /// invalid.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, FilterError> {
        let text = input.as_ref().trim();
        if text.is_empty() {
            return Err(FilterError::Empty);
        }
        let (filter, rest) = parse_filter(text)?;
        if !rest.trim().is_empty() {
            return Err(FilterError::InvalidComponent(text.to_string()));
        }
        Ok(filter)
    }

    /// The filter that matches every entry.
    #[must_use]
    pub fn object_class_present() -> Self {
        Self::Present {
            attribute: "objectClass".to_string(),
        }
    }

    /// An equality assertion on an object class.
    #[must_use]
    pub fn object_class(value: impl Into<String>) -> Self {
        Self::Equality {
            attribute: "objectClass".to_string(),
            value: value.into(),
        }
    }

    /// The conjunction of `self` and `other`.
    #[must_use]
    pub fn and_with(self, other: SearchFilter) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Evaluates the filter against an entry.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|f| f.matches(entry)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(entry)),
            Self::Not(inner) => !inner.matches(entry),
            Self::Equality { attribute, value } => entry.has_value(attribute, value),
            Self::GreaterOrEqual { attribute, value } => entry
                .values(attribute)
                .iter()
                .any(|v| compare_values(v, value).is_ge()),
            Self::LessOrEqual { attribute, value } => entry
                .values(attribute)
                .iter()
                .any(|v| compare_values(v, value).is_le()),
            Self::Present { attribute } => entry.has_attribute(attribute),
            Self::Substring {
                attribute,
                leading,
                middle,
                trailing,
            } => entry
                .values(attribute)
                .iter()
                .any(|v| substring_matches(v, leading.as_deref(), middle, trailing.as_deref())),
        }
    }
}

/// Ordering comparison: numeric when both sides are integers, otherwise
/// case-insensitive lexicographic.
fn compare_values(value: &str, assertion: &str) -> std::cmp::Ordering {
    if let (Ok(a), Ok(b)) = (value.parse::<i64>(), assertion.parse::<i64>()) {
        return a.cmp(&b);
    }
    value
        .to_ascii_lowercase()
        .cmp(&assertion.to_ascii_lowercase())
}

fn substring_matches(
    value: &str,
    leading: Option<&str>,
    middle: &[String],
    trailing: Option<&str>,
) -> bool {
    let haystack = value.to_ascii_lowercase();
    let mut position = 0;

    if let Some(prefix) = leading {
        let prefix = prefix.to_ascii_lowercase();
        if !haystack.starts_with(&prefix) {
            return false;
        }
        position = prefix.len();
    }

    for fragment in middle {
        let fragment = fragment.to_ascii_lowercase();
        match haystack[position..].find(&fragment) {
            Some(offset) => position += offset + fragment.len(),
            None => return false,
        }
    }

    if let Some(suffix) = trailing {
        let suffix = suffix.to_ascii_lowercase();
        return haystack.len() >= position + suffix.len() && haystack.ends_with(&suffix);
    }
    true
}

/// Parses one filter from the front of `text`, returning the remainder.
fn parse_filter(text: &str) -> Result<(SearchFilter, &str), FilterError> {
    let text = text.trim_start();
    let Some(body) = text.strip_prefix('(') else {
        // Tolerate a bare assertion with no enclosing parentheses.
        let filter = parse_item(text)?;
        return Ok((filter, ""));
    };

    let body = body.trim_start();
    if let Some(rest) = body.strip_prefix('&') {
        let (parts, rest) = parse_filter_list(rest)?;
        Ok((SearchFilter::And(parts), rest))
    } else if let Some(rest) = body.strip_prefix('|') {
        let (parts, rest) = parse_filter_list(rest)?;
        Ok((SearchFilter::Or(parts), rest))
    } else if let Some(rest) = body.strip_prefix('!') {
        let (inner, rest) = parse_filter(rest)?;
        let rest = rest
            .trim_start()
            .strip_prefix(')')
            .ok_or_else(|| FilterError::Unbalanced(text.to_string()))?;
        Ok((SearchFilter::Not(Box::new(inner)), rest))
    } else {
        let close = find_unescaped_close(body)
            .ok_or_else(|| FilterError::Unbalanced(text.to_string()))?;
        let filter = parse_item(&body[..close])?;
        Ok((filter, &body[close + 1..]))
    }
}

/// Parses zero or more parenthesized filters followed by the closing `)`.
fn parse_filter_list(mut text: &str) -> Result<(Vec<SearchFilter>, &str), FilterError> {
    let mut parts = Vec::new();
    loop {
        let trimmed = text.trim_start();
        if let Some(rest) = trimmed.strip_prefix(')') {
            return Ok((parts, rest));
        }
        if !trimmed.starts_with('(') {
            return Err(FilterError::Unbalanced(trimmed.to_string()));
        }
        let (filter, rest) = parse_filter(trimmed)?;
        parts.push(filter);
        text = rest;
    }
}

/// Index of the `)` closing a simple assertion (no nesting inside items).
fn find_unescaped_close(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ')' {
            return Some(i);
        }
    }
    None
}

fn parse_item(text: &str) -> Result<SearchFilter, FilterError> {
    let text = text.trim();
    let eq = text
        .find('=')
        .ok_or_else(|| FilterError::InvalidComponent(text.to_string()))?;
    if eq == 0 {
        return Err(FilterError::InvalidComponent(text.to_string()));
    }

    let (attr_part, raw_value) = (&text[..eq], &text[eq + 1..]);
    let (attribute, operator) = match attr_part.as_bytes()[attr_part.len() - 1] {
        b'>' => (&attr_part[..attr_part.len() - 1], Operator::Ge),
        b'<' => (&attr_part[..attr_part.len() - 1], Operator::Le),
        _ => (attr_part, Operator::Eq),
    };
    let attribute = attribute.trim();
    if attribute.is_empty() {
        return Err(FilterError::InvalidComponent(text.to_string()));
    }

    match operator {
        Operator::Ge => Ok(SearchFilter::GreaterOrEqual {
            attribute: attribute.to_string(),
            value: unescape_value(raw_value)?,
        }),
        Operator::Le => Ok(SearchFilter::LessOrEqual {
            attribute: attribute.to_string(),
            value: unescape_value(raw_value)?,
        }),
        Operator::Eq => {
            if raw_value == "*" {
                return Ok(SearchFilter::Present {
                    attribute: attribute.to_string(),
                });
            }
            if raw_value.contains('*') {
                return parse_substring(attribute, raw_value);
            }
            Ok(SearchFilter::Equality {
                attribute: attribute.to_string(),
                value: unescape_value(raw_value)?,
            })
        }
    }
}

enum Operator {
    Eq,
    Ge,
    Le,
}

fn parse_substring(attribute: &str, raw_value: &str) -> Result<SearchFilter, FilterError> {
    let pieces: Vec<&str> = raw_value.split('*').collect();
    let leading = match pieces[0] {
        "" => None,
        piece => Some(unescape_value(piece)?),
    };
    let trailing = match pieces[pieces.len() - 1] {
        "" => None,
        piece => Some(unescape_value(piece)?),
    };
    let mut middle = Vec::new();
    for piece in &pieces[1..pieces.len() - 1] {
        if !piece.is_empty() {
            middle.push(unescape_value(piece)?);
        }
    }
    Ok(SearchFilter::Substring {
        attribute: attribute.to_string(),
        leading,
        middle,
        trailing,
    })
}

/// Decodes RFC 4515 `\XX` hex escapes.
fn unescape_value(value: &str) -> Result<String, FilterError> {
    if !value.contains('\\') {
        return Ok(value.to_string());
    }
    let bytes = value.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| FilterError::InvalidEscape(value.to_string()))?;
            let hex = std::str::from_utf8(hex)
                .map_err(|_| FilterError::InvalidEscape(value.to_string()))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| FilterError::InvalidEscape(value.to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(result).map_err(|_| FilterError::InvalidEscape(value.to_string()))
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(parts) => {
                write!(f, "(&")?;
                for part in parts {
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
            Self::Or(parts) => {
                write!(f, "(|")?;
                for part in parts {
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
            Self::Not(inner) => write!(f, "(!{inner})"),
            Self::Equality { attribute, value } => {
                write!(f, "({attribute}={})", escape_value(value))
            }
            Self::GreaterOrEqual { attribute, value } => {
                write!(f, "({attribute}>={})", escape_value(value))
            }
            Self::LessOrEqual { attribute, value } => {
                write!(f, "({attribute}<={})", escape_value(value))
            }
            Self::Present { attribute } => write!(f, "({attribute}=*)"),
            Self::Substring {
                attribute,
                leading,
                middle,
                trailing,
            } => {
                write!(f, "({attribute}=")?;
                if let Some(prefix) = leading {
                    write!(f, "{}", escape_value(prefix))?;
                }
                for fragment in middle {
                    write!(f, "*{}", escape_value(fragment))?;
                }
                write!(f, "*")?;
                if let Some(suffix) = trailing {
                    write!(f, "{}", escape_value(suffix))?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::Dn;

    fn person(sn: &str) -> Entry {
        Entry::builder(Dn::parse(&format!("uid=user.{sn},ou=People,o=test")).unwrap())
            .attr("objectClass", ["top", "person"])
            .attr("sn", [sn])
            .attr("cn", [format!("User {sn}")])
            .build()
    }

    #[test]
    fn equality_is_case_insensitive() {
        let filter = SearchFilter::parse("(objectClass=PERSON)").unwrap();
        assert!(filter.matches(&person("1")));
    }

    #[test]
    fn presence() {
        let filter = SearchFilter::parse("(sn=*)").unwrap();
        assert!(filter.matches(&person("1")));
        let filter = SearchFilter::parse("(mail=*)").unwrap();
        assert!(!filter.matches(&person("1")));
    }

    #[test]
    fn ordering_is_numeric_for_integers() {
        let filter = SearchFilter::parse("(sn<=2)").unwrap();
        assert!(filter.matches(&person("1")));
        assert!(filter.matches(&person("2")));
        assert!(!filter.matches(&person("3")));
        // "10" <= "2" lexically but not numerically.
        assert!(!filter.matches(&person("10")));

        let filter = SearchFilter::parse("(sn>=2)").unwrap();
        assert!(!filter.matches(&person("1")));
        assert!(filter.matches(&person("2")));
        assert!(filter.matches(&person("10")));
    }

    #[test]
    fn boolean_combinations() {
        let filter = SearchFilter::parse("(&(objectClass=person)(sn=1))").unwrap();
        assert!(filter.matches(&person("1")));
        assert!(!filter.matches(&person("2")));

        let filter = SearchFilter::parse("(|(sn=1)(sn=2))").unwrap();
        assert!(filter.matches(&person("2")));
        assert!(!filter.matches(&person("3")));

        let filter = SearchFilter::parse("(!(sn=3))").unwrap();
        assert!(filter.matches(&person("1")));
        assert!(!filter.matches(&person("3")));
    }

    #[test]
    fn nested_combinations() {
        let filter =
            SearchFilter::parse("(&(objectClass=person)(|(sn=1)(!(cn=User 3))))").unwrap();
        assert!(filter.matches(&person("1")));
        assert!(filter.matches(&person("2")));
        assert!(!filter.matches(&person("3")));
    }

    #[test]
    fn substring_assertions() {
        let entry = person("1");
        assert!(SearchFilter::parse("(cn=User*)").unwrap().matches(&entry));
        assert!(SearchFilter::parse("(cn=*1)").unwrap().matches(&entry));
        assert!(SearchFilter::parse("(cn=u*er*1)").unwrap().matches(&entry));
        assert!(!SearchFilter::parse("(cn=x*)").unwrap().matches(&entry));
    }

    #[test]
    fn empty_and_or() {
        let entry = person("1");
        assert!(SearchFilter::parse("(&)").unwrap().matches(&entry));
        assert!(!SearchFilter::parse("(|)").unwrap().matches(&entry));
    }

    #[test]
    fn bare_assertion_without_parens() {
        let filter = SearchFilter::parse("objectClass=person").unwrap();
        assert!(filter.matches(&person("1")));
    }

    #[test]
    fn escaped_values() {
        let entry = Entry::builder(Dn::parse("cn=star,o=test").unwrap())
            .attr("description", ["a*b"])
            .build();
        let filter = SearchFilter::parse("(description=a\\2ab)").unwrap();
        assert!(filter.matches(&entry));
        assert_eq!(filter.to_string(), "(description=a\\2ab)");
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(SearchFilter::parse("").is_err());
        assert!(SearchFilter::parse("(&(sn=1)").is_err());
        assert!(SearchFilter::parse("(sn=1))").is_err());
        assert!(SearchFilter::parse("(malformed)").is_err());
        assert!(SearchFilter::parse("(=value)").is_err());
    }

    #[test]
    fn display_round_trip() {
        for text in [
            "(&(objectClass=person)(sn<=2))",
            "(|(sn=1)(sn=2))",
            "(!(sn=3))",
            "(cn=ad*min*s)",
            "(sn=*)",
        ] {
            let filter = SearchFilter::parse(text).unwrap();
            assert_eq!(SearchFilter::parse(filter.to_string()).unwrap(), filter);
        }
    }
}
