//! Resolves locations into routes.
//!
//! Matching never fails for an unknown target: it yields a route without
//! matched records. The only error is a redirect function returning `Err`,
//! which is propagated to the caller.

use crate::config::{Redirect, RouteConfig};
use crate::error::RouterError;
use crate::location::{normalize_location, Location, RawLocation};
use crate::logger::Logger;
use crate::params::{fill_params, Params};
use crate::path::resolve_path;
use crate::query::QueryCodec;
use crate::record::RouteRecord;
use crate::route::Route;
use crate::route_map::RouteMap;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("matcher");

#[derive(Clone)]
pub struct Matcher {
    map: RouteMap,
    codec: Arc<dyn QueryCodec>,
}

impl Matcher {
    pub fn new(routes: &[RouteConfig], codec: Arc<dyn QueryCodec>) -> Self {
        Self {
            map: RouteMap::new(routes),
            codec,
        }
    }

    pub fn route_map(&self) -> &RouteMap {
        &self.map
    }

    pub fn codec(&self) -> &dyn QueryCodec {
        self.codec.as_ref()
    }

    pub fn add_routes(&mut self, routes: &[RouteConfig]) {
        self.map.add_routes(routes, None);
    }

    pub fn add_route(&mut self, route: &RouteConfig) {
        self.map.add_routes(std::slice::from_ref(route), None);
    }

    pub fn add_child_route(&mut self, parent_name: &str, route: &RouteConfig) {
        self.map.add_child_route(parent_name, route);
    }

    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.map.get_routes()
    }

    /// Resolves `raw` relative to `current`.
    pub fn match_route(&self, raw: RawLocation, current: Option<&Route>) -> Result<Route, RouterError> {
        let location = normalize_location(raw, current, false, self.codec());
        self.match_location(location, current, None)
    }

    fn match_location(
        &self,
        mut location: Location,
        current: Option<&Route>,
        redirected_from: Option<&Location>,
    ) -> Result<Route, RouterError> {
        if let Some(name) = location.name.clone().filter(|name| !name.is_empty()) {
            let Some(record) = self.map.by_name(&name).cloned() else {
                LOGGER.warn(format!("Route with name '{}' does not exist", name));
                return Ok(self.build(None, &location, None));
            };

            let params = location.params.get_or_insert_with(Params::new);
            if let (Some(current), Some(regex)) = (current, record.regex()) {
                for key in regex.required_names() {
                    if params.contains_key(key) {
                        continue;
                    }
                    if let Some(value) = current.params().get(key) {
                        params.insert(key.to_string(), value.clone());
                    }
                }
            }

            let context = format!("named route \"{}\"", name);
            location.path = Some(fill_params(record.path(), params, &context));
            return self.create_route(Some(&record), location, redirected_from);
        }

        if let Some(path) = location.path.clone().filter(|path| !path.is_empty()) {
            let found = self.map.records_in_order().find_map(|record| {
                record
                    .captures(&path)
                    .map(|params| (Arc::clone(record), params))
            });
            if let Some((record, params)) = found {
                location.params = Some(params);
                return self.create_route(Some(&record), location, redirected_from);
            }
            location.params = Some(Params::new());
        }

        Ok(self.build(None, &location, None))
    }

    fn create_route(
        &self,
        record: Option<&Arc<RouteRecord>>,
        location: Location,
        redirected_from: Option<&Location>,
    ) -> Result<Route, RouterError> {
        if let Some(record) = record {
            if let Some(redirect) = record.redirect() {
                let trigger = redirected_from.cloned().unwrap_or(location);
                return self.redirect(record, redirect, trigger);
            }
            if let Some(match_as) = record.match_as() {
                return self.alias(match_as, location);
            }
        }
        Ok(self.build(record, &location, redirected_from))
    }

    fn redirect(
        &self,
        record: &Arc<RouteRecord>,
        redirect: &Redirect,
        location: Location,
    ) -> Result<Route, RouterError> {
        let target = match redirect {
            Redirect::To(target) => Some(target.clone()),
            Redirect::With(resolve) => {
                let trigger = self.build(Some(record), &location, None);
                resolve(&trigger).map_err(|err| RouterError::RedirectFailed {
                    path: record.path().to_string(),
                    reason: Arc::from(err),
                })?
            }
        };

        let Some(target) = target else {
            LOGGER.warn("invalid redirect option: redirect function returned nothing");
            return Ok(self.build(None, &location, None));
        };

        let query = target.query.clone().or_else(|| location.query.clone());
        let hash = target.hash.clone().or_else(|| location.hash.clone());
        let params = target.params.clone().or_else(|| location.params.clone());

        if let Some(name) = target.name.clone().filter(|name| !name.is_empty()) {
            if self.map.by_name(&name).is_none() {
                LOGGER.warn(format!("redirect failed: named route \"{}\" not found.", name));
            }
            let next = Location {
                name: Some(name),
                path: None,
                params,
                query,
                hash,
            };
            return self.match_location(next, None, Some(&location));
        }

        if let Some(path) = target.path.clone().filter(|path| !path.is_empty()) {
            let parent_path = record
                .parent()
                .and_then(|id| self.map.record(id))
                .map_or("/", |parent| parent.path());
            let raw_path = resolve_path(&path, parent_path, true);
            let context = format!("redirect route with path \"{}\"", raw_path);
            let filled = fill_params(&raw_path, &params.unwrap_or_default(), &context);
            let next = Location {
                name: None,
                path: Some(filled),
                params: None,
                query,
                hash,
            };
            return self.match_location(next, None, Some(&location));
        }

        LOGGER.warn(format!("invalid redirect option: {:?}", target));
        Ok(self.build(None, &location, None))
    }

    fn alias(&self, match_as: &str, location: Location) -> Result<Route, RouterError> {
        let params = location.params.clone().unwrap_or_default();
        let context = format!("aliased route with path \"{}\"", match_as);
        let aliased_path = fill_params(match_as, &params, &context);

        let aliased = self.match_location(Location::with_path(aliased_path), None, None)?;
        match aliased.matched().last() {
            Some(record) => {
                let record = Arc::clone(record);
                self.create_route(Some(&record), location, None)
            }
            None => Ok(self.build(None, &location, None)),
        }
    }

    fn build(
        &self,
        record: Option<&Arc<RouteRecord>>,
        location: &Location,
        redirected_from: Option<&Location>,
    ) -> Route {
        let matched = record.map(|record| self.map.chain(record)).unwrap_or_default();
        Route::new(record, location, redirected_from, matched, self.codec())
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("map", &self.map)
            .field("codec", &self.codec)
            .finish()
    }
}
