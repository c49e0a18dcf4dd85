//! Distinguished name handling.
//!
//! Directory identities are DNs. Registry keys and membership comparisons
//! are case-insensitive, so every [`Dn`] keeps a normalized form alongside
//! the canonical display string; equality and hashing use only the
//! normalized form. Parsing is intentionally strict to surface malformed
//! DNs early.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error as CoreError;

/// Errors that can occur when parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component could not be split into attribute and value.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component had no attribute type before the `=`.
    #[error("component missing attribute type: {0}")]
    MissingAttribute(String),
    /// A component had no value after the `=`.
    #[error("component missing value for attribute {0}")]
    MissingValue(String),
    /// The name ended in the middle of an escape sequence.
    #[error("unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::InvalidDn(err.to_string())
    }
}

/// A single attribute/value assertion within an RDN.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    fn normalized(&self) -> String {
        format!(
            "{}={}",
            self.attribute.to_ascii_lowercase(),
            self.value.to_ascii_lowercase()
        )
    }

    fn display(&self) -> String {
        format!("{}={}", self.attribute, escape_value(&self.value))
    }
}

/// A relative distinguished name: one or more `+`-joined assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    avas: Vec<Ava>,
    norm: String,
}

impl Rdn {
    fn new(mut avas: Vec<Ava>) -> Self {
        // Multi-valued RDNs compare independent of assertion order.
        let mut keys: Vec<String> = avas.iter().map(Ava::normalized).collect();
        keys.sort_unstable();
        let norm = keys.join("+");
        avas.shrink_to_fit();
        Self { avas, norm }
    }

    /// Attribute type of the first assertion (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.avas[0].attribute
    }

    /// Value of the first assertion.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.avas[0].value
    }

    fn display(&self) -> String {
        self.avas
            .iter()
            .map(Ava::display)
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// A distinguished name, ordered leaf-first (as written in LDAP).
///
/// `Eq` and `Hash` are defined over the normalized (case-folded) form, so
/// `CN=Admins,O=Test` and `cn=admins,o=test` are the same identity.
#[derive(Debug, Clone)]
pub struct Dn {
    raw: String,
    norm: String,
    rdns: Vec<Rdn>,
}

impl Dn {
    /// Parses a distinguished name from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] if the input is empty or syntactically invalid.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DnError> {
        let text = input.as_ref().trim();
        if text.is_empty() {
            return Err(DnError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_unescaped(text, ',')? {
            let mut avas = Vec::new();
            for part in split_unescaped(&component, '+')? {
                avas.push(parse_ava(&part)?);
            }
            rdns.push(Rdn::new(avas));
        }

        Ok(Self::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Self {
        let raw = rdns.iter().map(Rdn::display).collect::<Vec<_>>().join(",");
        let norm = rdns
            .iter()
            .map(|rdn| rdn.norm.clone())
            .collect::<Vec<_>>()
            .join(",");
        Self { raw, norm, rdns }
    }

    /// Canonical string form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalized form used for identity comparison.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.norm
    }

    /// The relative distinguished names, leaf first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Number of RDN components.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.rdns.len()
    }

    /// The immediate superior of this name, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.len() <= 1 {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// Returns true if `self` is strictly below `base` in the tree.
    #[must_use]
    pub fn is_descendant_of(&self, base: &Dn) -> bool {
        let extra = match self.rdns.len().checked_sub(base.rdns.len()) {
            Some(0) | None => return false,
            Some(n) => n,
        };
        self.rdns[extra..]
            .iter()
            .zip(base.rdns.iter())
            .all(|(a, b)| a.norm == b.norm)
    }

    /// Returns true if `self` equals `base` or sits below it.
    #[must_use]
    pub fn is_under(&self, base: &Dn) -> bool {
        self == base || self.is_descendant_of(base)
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.norm == other.norm
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm.hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Dn {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Dn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(D::Error::custom)
    }
}

fn split_unescaped(input: &str, delimiter: char) -> std::result::Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delimiter {
            parts.push(std::mem::take(&mut current).trim().to_string());
        } else {
            current.push(ch);
        }
    }
    if escaped {
        return Err(DnError::UnterminatedEscape);
    }
    parts.push(current.trim().to_string());

    if parts.iter().any(String::is_empty) {
        return Err(DnError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn parse_ava(component: &str) -> std::result::Result<Ava, DnError> {
    let mut escaped = false;
    let mut split_at = None;
    for (i, ch) in component.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '=' {
            split_at = Some(i);
            break;
        }
    }
    let idx = split_at.ok_or_else(|| DnError::InvalidComponent(component.to_string()))?;

    let attribute = component[..idx].trim();
    if attribute.is_empty() {
        return Err(DnError::MissingAttribute(component.to_string()));
    }
    let value = unescape_value(component[idx + 1..].trim_start())?;
    if value.is_empty() {
        return Err(DnError::MissingValue(attribute.to_string()));
    }

    Ok(Ava {
        attribute: attribute.to_string(),
        value,
    })
}

fn unescape_value(value: &str) -> std::result::Result<String, DnError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            result.push(chars.next().ok_or(DnError::UnterminatedEscape)?);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());
    for (idx, ch) in chars.iter().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && (*ch == ' ' || *ch == '#'))
            || (idx == chars.len() - 1 && *ch == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }
    escaped
}
