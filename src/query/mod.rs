//! Query-string encoding and decoding.

use crate::errors::{NationBuilderError, NationBuilderResult};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Request parameters as a flat JSON object.
pub type Params = serde_json::Map<String, Value>;

/// Characters escaped in a query component.
///
/// Everything except the RFC 3986 unreserved set: `A-Z a-z 0-9 - _ . ~`.
const QUERY_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Separator used when an array value is flattened into one query parameter.
pub const LIST_SEPARATOR: &str = ",";

/// Converts between parameter maps and query strings.
pub struct QueryCodec;

impl QueryCodec {
    /// Serializes `params` into a query string with default escaping.
    pub fn encode(params: &Params) -> NationBuilderResult<String> {
        Self::encode_with(params, &BTreeSet::new(), "")
    }

    /// Serializes `params` into a query string.
    ///
    /// Pairs are ordered by key. `null` values are omitted. Keys listed in
    /// `skip_encoding_keys` keep their values verbatim, and any character in
    /// `leave_unescaped` is never escaped.
    pub fn encode_with(
        params: &Params,
        skip_encoding_keys: &BTreeSet<String>,
        leave_unescaped: &str,
    ) -> NationBuilderResult<String> {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();

        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match params.get(key) {
                Some(v) => Self::value_to_query(key, v)?,
                None => None,
            };
            let Some(value) = value else {
                continue;
            };
            let escaped_value = if skip_encoding_keys.contains(key) {
                value
            } else {
                Self::percent_escape(&value, leave_unescaped)
            };
            pairs.push(format!(
                "{}={}",
                Self::percent_escape(key, leave_unescaped),
                escaped_value
            ));
        }

        Ok(pairs.join("&"))
    }

    /// Parses a query string (or URL fragment) into a map.
    ///
    /// A leading `?` or `#` is ignored. For duplicate keys the last occurrence wins.
    pub fn decode(query: &str) -> BTreeMap<String, String> {
        let query = query.trim_start_matches(['?', '#']);
        let mut params = BTreeMap::new();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = Self::percent_unescape(key);
            if key.is_empty() {
                continue;
            }
            params.insert(key, Self::percent_unescape(value));
        }

        params
    }

    /// Percent-escapes a query component.
    pub fn percent_escape(input: &str, leave_unescaped: &str) -> String {
        if leave_unescaped.is_empty() {
            return utf8_percent_encode(input, QUERY_COMPONENT_SET).to_string();
        }
        let mut escaped = String::with_capacity(input.len());
        let mut buf = [0u8; 4];
        for c in input.chars() {
            if c.is_ascii() && c != '%' && leave_unescaped.contains(c) {
                escaped.push(c);
            } else {
                escaped.extend(utf8_percent_encode(c.encode_utf8(&mut buf), QUERY_COMPONENT_SET));
            }
        }
        escaped
    }

    /// Reverses percent-escaping. Invalid UTF-8 sequences are replaced.
    pub fn percent_unescape(input: &str) -> String {
        percent_decode_str(input).decode_utf8_lossy().into_owned()
    }

    /// Returns true if `input` is a non-empty run of ASCII digits.
    pub fn is_numeric(input: &str) -> bool {
        !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit())
    }

    fn value_to_query(key: &str, value: &Value) -> NationBuilderResult<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::Array(_) | Value::Object(_) => {
                            return Err(NationBuilderError::invalid_argument(format!(
                                "Query parameter '{}' contains a nested collection",
                                key
                            )))
                        }
                        scalar => parts.push(Self::scalar_to_string(scalar)),
                    }
                }
                Ok(Some(parts.join(LIST_SEPARATOR)))
            }
            Value::Object(_) => Err(NationBuilderError::invalid_argument(format!(
                "Query parameter '{}' cannot be an object",
                key
            ))),
            scalar => Ok(Some(Self::scalar_to_string(scalar))),
        }
    }

    fn scalar_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
