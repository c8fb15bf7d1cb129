//! Navigation targets and their normalization.

use crate::logger::Logger;
use crate::params::{fill_params, Params};
use crate::path::{parse_path, resolve_path};
use crate::query::{resolve_query, Query, QueryCodec, QueryValue};
use crate::route::Route;

static LOGGER: Logger = Logger::const_new("location");

/// A navigation target as requested by the caller.
///
/// Either a path (possibly relative, possibly carrying a query and a
/// fragment), a route name with params, or params alone to re-fill the
/// current route.
///
/// # Examples
///
/// ```
/// use waypoint_router::RawLocation;
///
/// let by_path = RawLocation::from("/user/7?tab=posts#top");
/// let by_name = RawLocation::named("User").param("id", "7");
/// let relative = RawLocation::params_only().param("id", "8");
/// let sibling = RawLocation::path("settings").appending().replacing();
/// # let _ = (by_path, by_name, relative, sibling);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLocation {
    pub path: Option<String>,
    pub name: Option<String>,
    pub params: Option<Params>,
    pub query: Option<Query>,
    pub hash: Option<String>,
    /// Resolve a relative path below the current path instead of beside it.
    pub append: bool,
    /// When returned from a guard, replace the history entry instead of pushing one.
    pub replace: bool,
}

impl RawLocation {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A location that only changes params of the current route.
    pub fn params_only() -> Self {
        Self {
            params: Some(Params::new()),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Params::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query
            .get_or_insert_with(Query::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// True when a guard returning this location redirects the navigation.
    pub(crate) fn is_target(&self) -> bool {
        self.path.is_some() || self.name.is_some()
    }
}

impl From<&str> for RawLocation {
    fn from(path: &str) -> Self {
        RawLocation::path(path)
    }
}

impl From<String> for RawLocation {
    fn from(path: String) -> Self {
        RawLocation::path(path)
    }
}

impl From<&String> for RawLocation {
    fn from(path: &String) -> Self {
        RawLocation::path(path.as_str())
    }
}

/// A location ready for matching.
///
/// Path targets carry an absolute path and a parsed query, with the hash
/// starting with `#`. Named targets are passed through as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
    pub name: Option<String>,
    pub path: Option<String>,
    pub params: Option<Params>,
    pub query: Option<Query>,
    pub hash: Option<String>,
}

impl Location {
    pub(crate) fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

/// Normalizes `raw` relative to `current`.
pub fn normalize_location(
    raw: RawLocation,
    current: Option<&Route>,
    append: bool,
    codec: &dyn QueryCodec,
) -> Location {
    if raw.name.as_deref().is_some_and(|name| !name.is_empty()) {
        return Location {
            name: raw.name,
            path: raw.path,
            params: raw.params,
            query: raw.query,
            hash: raw.hash,
        };
    }

    let has_path = raw.path.as_deref().is_some_and(|path| !path.is_empty());
    if let (false, Some(params), Some(current)) = (has_path, raw.params.as_ref(), current) {
        let mut merged = current.params().clone();
        for (key, value) in params {
            merged.insert(key.clone(), value.clone());
        }

        let mut next = Location {
            name: None,
            path: raw.path.clone(),
            params: raw.params.clone(),
            query: raw.query,
            hash: raw.hash,
        };
        if let Some(name) = current.name() {
            next.name = Some(name.to_string());
            next.params = Some(merged);
        } else if let Some(record) = current.matched().last() {
            let context = format!("path {}", current.path());
            next.path = Some(fill_params(record.path(), &merged, &context));
        } else {
            LOGGER.warn("relative params navigation requires a current route.");
        }
        return next;
    }

    let parsed = parse_path(raw.path.as_deref().unwrap_or_default());
    let base = current.map_or("/", |route| route.path());
    let path = if parsed.path.is_empty() {
        base.to_string()
    } else {
        resolve_path(&parsed.path, base, append || raw.append)
    };

    let query = resolve_query(&parsed.query, raw.query.as_ref(), codec);

    let mut hash = match raw.hash {
        Some(hash) if !hash.is_empty() => hash,
        _ => parsed.hash,
    };
    if !hash.is_empty() && !hash.starts_with('#') {
        hash.insert(0, '#');
    }

    Location {
        name: None,
        path: Some(path),
        params: None,
        query: Some(query),
        hash: Some(hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DefaultQueryCodec;

    #[test]
    fn test_normalize_path_location() {
        let location = normalize_location(
            RawLocation::from("/user/7?tab=posts").hash("top"),
            None,
            false,
            &DefaultQueryCodec,
        );

        assert_eq!(location.path.as_deref(), Some("/user/7"));
        assert_eq!(location.hash.as_deref(), Some("#top"));
        assert_eq!(
            location
                .query
                .as_ref()
                .and_then(|q| q.get("tab"))
                .and_then(QueryValue::as_str),
            Some("posts")
        );
        assert!(location.name.is_none());
    }

    #[test]
    fn test_normalize_merges_explicit_query() {
        let location = normalize_location(
            RawLocation::from("/search?q=rust&page=1").query("page", "2"),
            None,
            false,
            &DefaultQueryCodec,
        );
        let query = location.query.unwrap();
        assert_eq!(query.get("q").and_then(QueryValue::as_str), Some("rust"));
        assert_eq!(query.get("page").and_then(QueryValue::as_str), Some("2"));
    }

    #[test]
    fn test_normalize_named_location_passes_through() {
        let raw = RawLocation::named("User").param("id", "7").hash("top");
        let location = normalize_location(raw, None, false, &DefaultQueryCodec);

        assert_eq!(location.name.as_deref(), Some("User"));
        assert_eq!(
            location.params.unwrap().get("id").map(String::as_str),
            Some("7")
        );
        assert_eq!(location.hash.as_deref(), Some("top"));
        assert!(location.path.is_none());
    }

    #[test]
    fn test_empty_path_resolves_to_root() {
        let location = normalize_location(RawLocation::default(), None, false, &DefaultQueryCodec);
        assert_eq!(location.path.as_deref(), Some("/"));
        assert_eq!(location.hash.as_deref(), Some(""));
    }

    #[test]
    fn test_guard_target_detection() {
        assert!(RawLocation::from("/a").is_target());
        assert!(RawLocation::named("A").is_target());
        assert!(!RawLocation::params_only().is_target());
    }
}
