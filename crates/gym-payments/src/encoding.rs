//! Canonical Query Encoding
//!
//! Builds the byte-exact query string that is both signed and sent to the
//! gateway. There is exactly one encoder in this crate; the signing payload
//! and the redirect query are the same `String`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Field name to final string value, iterated in ascending byte order of names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(BTreeMap<String, String>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Keep only fields whose name satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in canonical (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a raw `a=1&b=2` query string.
    ///
    /// `+` is read as a space before percent-decoding, so both form-encoded
    /// and RFC 3986 encoded callbacks parse to the same values. A later
    /// duplicate name replaces an earlier one.
    pub fn from_query(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut fields = Self::new();

        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            fields.insert(decode_form_component(name)?, decode_form_component(value)?);
        }

        Ok(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Percent-encode a single value.
///
/// Everything outside the RFC 3986 unreserved set (`A-Z a-z 0-9 - _ . ~`) is
/// written as `%XX` with uppercase hex over its UTF-8 bytes. In particular
/// space becomes `%20` and `! ' ( ) *` are always escaped.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn decode_form_component(value: &str) -> Result<String> {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| PaymentError::Validation(format!("query is not valid UTF-8: {e}")))
}

/// Build the canonical query string: `name=encoded_value` pairs sorted by
/// name and joined with `&`.
///
/// Names are emitted verbatim. The result depends only on the contents of
/// `fields`, never on insertion order.
pub fn canonical_query(fields: &FieldSet) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{name}={}", encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}
