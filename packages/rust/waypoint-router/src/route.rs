//! Resolved routes.

use crate::config::Meta;
use crate::location::Location;
use crate::params::Params;
use crate::query::{Query, QueryCodec};
use crate::record::RouteRecord;
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    /// The route every history starts on, standing for "nowhere".
    ///
    /// Compared by identity: a route equal to it in content is not it.
    pub static ref START: Arc<Route> = Arc::new(Route::start());
}

/// An immutable navigation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    name: Option<String>,
    meta: Meta,
    path: String,
    hash: String,
    query: Query,
    params: Params,
    full_path: String,
    matched: Vec<Arc<RouteRecord>>,
    redirected_from: Option<String>,
}

impl Route {
    /// Builds a route for `record` at `location`.
    ///
    /// `matched` is the record chain from root to `record`.
    pub(crate) fn new(
        record: Option<&Arc<RouteRecord>>,
        location: &Location,
        redirected_from: Option<&Location>,
        matched: Vec<Arc<RouteRecord>>,
        codec: &dyn QueryCodec,
    ) -> Self {
        let query = location.query.clone().unwrap_or_default();
        let path = match location.path.as_deref() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => "/".to_string(),
        };
        let hash = location.hash.clone().unwrap_or_default();

        Self {
            name: location
                .name
                .clone()
                .or_else(|| record.and_then(|r| r.name.clone())),
            meta: record.map(|r| r.meta.clone()).unwrap_or_default(),
            full_path: full_path(&path, &query, &hash, codec),
            path,
            hash,
            query,
            params: location.params.clone().unwrap_or_default(),
            matched,
            redirected_from: redirected_from.map(|from| {
                let path = from.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");
                let query = from.query.clone().unwrap_or_default();
                full_path(path, &query, from.hash.as_deref().unwrap_or_default(), codec)
            }),
        }
    }

    fn start() -> Self {
        Self {
            name: None,
            meta: Meta::new(),
            path: "/".to_string(),
            hash: String::new(),
            query: Query::new(),
            params: Params::new(),
            full_path: "/".to_string(),
            matched: Vec::new(),
            redirected_from: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Path plus serialized query plus hash.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Matched records, root first. The last one is the precise match.
    pub fn matched(&self) -> &[Arc<RouteRecord>] {
        &self.matched
    }

    pub fn redirected_from(&self) -> Option<&str> {
        self.redirected_from.as_deref()
    }

    pub fn is_start(&self) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&START))
    }

    /// Props for the view in `slot` of the record at nesting `depth`.
    pub fn resolve_props(&self, depth: usize, slot: &str) -> Option<serde_json::Value> {
        self.matched.get(depth)?.props(slot)?.resolve(self)
    }
}

fn full_path(path: &str, query: &Query, hash: &str, codec: &dyn QueryCodec) -> String {
    format!("{}{}{}", path, codec.stringify(query), hash)
}

fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Whether `a` and `b` describe the same location.
///
/// Paths compare without a trailing slash. Routes without a path compare by
/// name and params. [`START`] is only ever the same as itself.
pub fn is_same_route(a: &Route, b: &Route) -> bool {
    if b.is_start() {
        return std::ptr::eq(a, b);
    }
    if !a.path.is_empty() && !b.path.is_empty() {
        return strip_trailing_slash(&a.path) == strip_trailing_slash(&b.path)
            && a.hash == b.hash
            && a.query == b.query;
    }
    match (&a.name, &b.name) {
        (Some(a_name), Some(b_name)) => {
            a_name == b_name && a.hash == b.hash && a.query == b.query && a.params == b.params
        }
        _ => false,
    }
}

/// Delivers queued "entered" callbacks to the instances now mounted for `route`.
pub fn handle_route_entered(route: &Route) {
    for record in &route.matched {
        record.deliver_entered();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DefaultQueryCodec, QueryValue};

    fn route(path: &str, query: &[(&str, &str)], hash: &str) -> Route {
        let mut q = Query::new();
        for (k, v) in query {
            q.insert(k.to_string(), QueryValue::from(*v));
        }
        let location = Location {
            path: Some(path.to_string()),
            query: Some(q),
            hash: Some(hash.to_string()),
            ..Location::default()
        };
        Route::new(None, &location, None, Vec::new(), &DefaultQueryCodec)
    }

    #[test]
    fn test_full_path() {
        let route = route("/search", &[("q", "a b")], "#results");
        assert_eq!(route.full_path(), "/search?q=a%20b#results");
        assert!(route.matched().is_empty());
        assert_eq!(route.name(), None);
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let route = route("", &[], "");
        assert_eq!(route.path(), "/");
        assert_eq!(route.full_path(), "/");
    }

    #[test]
    fn test_is_same_route() {
        assert!(is_same_route(
            &route("/a/", &[("x", "1"), ("y", "2")], "#h"),
            &route("/a", &[("y", "2"), ("x", "1")], "#h"),
        ));
        assert!(!is_same_route(&route("/a", &[], "#h"), &route("/a", &[], "")));
        assert!(!is_same_route(&route("/a", &[("x", "1")], ""), &route("/a", &[], "")));
    }

    #[test]
    fn test_start_is_compared_by_identity() {
        let root = route("/", &[], "");
        assert!(!is_same_route(&root, &START));
        assert!(is_same_route(&START, &START));
        assert!(START.is_start());
        assert!(!root.is_start());
    }

    #[test]
    fn test_redirected_from_is_full_path() {
        let location = Location::with_path("/login");
        let from = Location {
            path: Some("/dashboard".to_string()),
            hash: Some("#x".to_string()),
            ..Location::default()
        };
        let route = Route::new(None, &location, Some(&from), Vec::new(), &DefaultQueryCodec);
        assert_eq!(route.redirected_from(), Some("/dashboard#x"));
    }
}
