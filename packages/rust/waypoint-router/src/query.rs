//! Query-string parsing and serialization.
//!
//! Queries are kept as insertion-ordered maps so that a route's full path is
//! stable across serializations. Equality between two queries ignores order.

use crate::logger::Logger;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

static LOGGER: Logger = Logger::const_new("query");

/// A single query value.
///
/// Serializes untagged, so a query converts naturally to and from JSON:
/// `Null` is `null`, `Value` a string and `List` an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// A key without `=`, e.g. `?flag`.
    Null,
    Value(String),
    /// A repeated key, e.g. `?tag=a&tag=b`.
    List(Vec<String>),
}

impl QueryValue {
    /// The first value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Null => None,
            QueryValue::Value(value) => Some(value),
            QueryValue::List(values) => values.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: Option<String>) {
        let value = value.unwrap_or_default();
        match self {
            QueryValue::List(values) => values.push(value),
            QueryValue::Value(existing) => {
                *self = QueryValue::List(vec![std::mem::take(existing), value]);
            }
            QueryValue::Null => {
                *self = QueryValue::List(vec![String::new(), value]);
            }
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Value(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Value(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::List(values)
    }
}

/// Parsed query mapping.
pub type Query = IndexMap<String, QueryValue>;

/// Converts query strings to [`Query`] maps and back.
///
/// The router uses [`DefaultQueryCodec`] unless a custom codec is supplied
/// through `RouterOptions::query_codec`.
pub trait QueryCodec: Send + Sync {
    /// Parses a raw query string. A leading `?`, `#` or `&` is ignored.
    fn parse(&self, query: &str) -> Query;

    /// Serializes a query, including the leading `?` when non-empty.
    fn stringify(&self, query: &Query) -> String;
}

impl fmt::Debug for dyn QueryCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryCodec")
    }
}

/// `application/x-www-form-urlencoded`-style codec with repeated keys as lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryCodec;

impl QueryCodec for DefaultQueryCodec {
    fn parse(&self, query: &str) -> Query {
        let mut res = Query::new();
        let query = query.trim();
        let query = query.strip_prefix(&['?', '#', '&'][..]).unwrap_or(query);
        if query.is_empty() {
            return res;
        }

        for param in query.split('&') {
            let param = param.replace('+', " ");
            let (key, value) = match param.split_once('=') {
                Some((key, value)) => (decode(key), Some(decode(value))),
                None => (decode(&param), None),
            };

            match res.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    let value = value.map_or(QueryValue::Null, QueryValue::Value);
                    res.insert(key, value);
                }
            }
        }

        res
    }

    fn stringify(&self, query: &Query) -> String {
        let parts: Vec<String> = query
            .iter()
            .map(|(key, value)| match value {
                QueryValue::Null => encode(key),
                QueryValue::Value(value) => format!("{}={}", encode(key), encode(value)),
                QueryValue::List(values) => values
                    .iter()
                    .map(|value| format!("{}={}", encode(key), encode(value)))
                    .collect::<Vec<_>>()
                    .join("&"),
            })
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}

/// Percent-encodes a query component. Commas are left readable.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).replace("%2C", ",")
}

/// Percent-decodes a component, keeping the raw text when it is not valid UTF-8.
pub fn decode(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            LOGGER.warn(format!("Error decoding \"{}\". Leaving it intact. ({})", value, err));
            value.to_string()
        }
    }
}

/// Parses `query` with `codec` and lays the explicit `extra` entries on top.
pub fn resolve_query(query: &str, extra: Option<&Query>, codec: &dyn QueryCodec) -> Query {
    let mut parsed = codec.parse(query);
    if let Some(extra) = extra {
        for (key, value) in extra {
            parsed.insert(key.clone(), value.clone());
        }
    }
    parsed
}
