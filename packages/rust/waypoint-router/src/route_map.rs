//! The compiled route table.
//!
//! Records live in an append-only arena; parents are referenced by
//! [`RecordId`]. Lookups go through the ordered path list (matching order),
//! the path map and the name map. The first record registered for a path or
//! a name wins.

use crate::config::RouteConfig;
use crate::constants::names;
use crate::logger::Logger;
use crate::params::RouteRegex;
use crate::path::clean_path;
use crate::record::{RecordId, RouteRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("route_map");

#[derive(Debug, Default, Clone)]
pub struct RouteMap {
    records: Vec<Arc<RouteRecord>>,
    path_list: Vec<String>,
    path_map: HashMap<String, RecordId>,
    name_map: HashMap<String, RecordId>,
}

impl RouteMap {
    pub fn new(routes: &[RouteConfig]) -> Self {
        let mut map = Self::default();
        map.add_routes(routes, None);
        map
    }

    /// Appends `routes`, optionally below `parent`.
    pub fn add_routes(&mut self, routes: &[RouteConfig], parent: Option<RecordId>) {
        for route in routes {
            self.add_route_record(route, parent, None);
        }
        self.finish_batch();
    }

    /// Appends `route` below the record named `parent_name`, re-expanding it
    /// under each of the parent's aliases.
    pub fn add_child_route(&mut self, parent_name: &str, route: &RouteConfig) {
        let Some(parent) = self.by_name(parent_name).cloned() else {
            LOGGER.warn(format!(
                "Cannot find a parent route with name \"{}\". Adding \"{}\" at the root.",
                parent_name, route.path
            ));
            self.add_routes(std::slice::from_ref(route), None);
            return;
        };

        self.add_route_record(route, Some(parent.id), None);

        let grandparent_path = parent
            .parent
            .and_then(|id| self.record(id))
            .map(|record| record.path.clone());
        let base = if parent.path.is_empty() { "/" } else { parent.path.as_str() };
        for alias in &parent.alias {
            let alias_path = normalize_path(alias, grandparent_path.as_deref(), false);
            let Some(alias_record) = self.by_path(&alias_path).filter(|r| r.is_alias()) else {
                continue;
            };
            let alias_id = alias_record.id;
            let match_as = clean_path(&format!("{}/{}", base, route.path));
            self.add_route_record(route, Some(alias_id), Some(match_as));
        }

        self.finish_batch();
    }

    /// Concrete records in matching order; alias expansions are left out.
    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.records_in_order()
            .filter(|record| !record.is_alias())
            .cloned()
            .collect()
    }

    /// Every record reachable from the path list, in matching order.
    pub fn records_in_order(&self) -> impl Iterator<Item = &Arc<RouteRecord>> {
        self.path_list.iter().filter_map(|path| self.by_path(path))
    }

    pub fn path_list(&self) -> &[String] {
        &self.path_list
    }

    pub fn record(&self, id: RecordId) -> Option<&Arc<RouteRecord>> {
        self.records.get(id.0)
    }

    pub fn by_path(&self, path: &str) -> Option<&Arc<RouteRecord>> {
        self.path_map.get(path).and_then(|id| self.record(*id))
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<RouteRecord>> {
        self.name_map.get(name).and_then(|id| self.record(*id))
    }

    /// The record chain from the root down to `record`.
    pub fn chain(&self, record: &Arc<RouteRecord>) -> Vec<Arc<RouteRecord>> {
        let mut chain = vec![Arc::clone(record)];
        let mut parent = record.parent;
        while let Some(record) = parent.and_then(|id| self.record(id)) {
            chain.push(Arc::clone(record));
            parent = record.parent;
        }
        chain.reverse();
        chain
    }

    fn add_route_record(
        &mut self,
        route: &RouteConfig,
        parent: Option<RecordId>,
        match_as: Option<String>,
    ) {
        let path = &route.path;
        if !path.is_ascii() {
            LOGGER.warn(format!(
                "Route with path \"{}\" contains unencoded characters, make sure your path is correctly encoded before passing it to the router.",
                path
            ));
        }

        let mut options = route.path_options;
        let parent_path = parent.and_then(|id| self.record(id)).map(|r| r.path.clone());
        let normalized = normalize_path(path, parent_path.as_deref(), options.strict);
        if let Some(sensitive) = route.case_sensitive {
            options.sensitive = sensitive;
        }

        let regex = match RouteRegex::compile(&normalized, &options) {
            Ok(regex) => {
                let mut seen = HashSet::new();
                if regex.keys().iter().any(|key| !seen.insert(key.name.as_str())) {
                    LOGGER.warn(format!(
                        "Duplicate param keys in route with path: \"{}\"",
                        normalized
                    ));
                }
                Some(regex)
            }
            Err(err) => {
                LOGGER.warn(format!(
                    "Invalid path pattern \"{}\", the route will never match: {}",
                    normalized, err
                ));
                None
            }
        };

        let id = RecordId(self.records.len());
        let record = Arc::new(RouteRecord::new(
            id,
            normalized,
            regex,
            route.components.clone(),
            route.alias.clone(),
            route.name.clone(),
            parent,
            match_as.clone(),
            route.redirect.clone(),
            route.before_enter.clone(),
            route.meta.clone(),
            route.props.clone(),
        ));
        self.records.push(Arc::clone(&record));

        if !route.children.is_empty() {
            if let Some(name) = &route.name {
                let has_default_child = route
                    .children
                    .iter()
                    .any(|child| child.path.is_empty() || child.path == "/");
                if route.redirect.is_none() && has_default_child {
                    LOGGER.warn(format!(
                        "Named Route '{}' has a default child route. When navigating to this named route, the default child route will not be rendered. Remove the name from this route and use the name of the default child route for named links instead.",
                        name
                    ));
                }
            }
            for child in &route.children {
                let child_match_as = match_as
                    .as_ref()
                    .map(|base| clean_path(&format!("{}/{}", base, child.path)));
                self.add_route_record(child, Some(id), child_match_as);
            }
        }

        if !self.path_map.contains_key(&record.path) {
            self.path_list.push(record.path.clone());
            self.path_map.insert(record.path.clone(), id);
        }

        for alias in &route.alias {
            if alias == path {
                LOGGER.warn(format!(
                    "Found an alias with the same value as the path: \"{}\". You have to remove that alias. It will be ignored.",
                    path
                ));
                continue;
            }
            let alias_route = RouteConfig::new(alias.clone()).children(route.children.clone());
            let target = if record.path.is_empty() {
                "/".to_string()
            } else {
                record.path.clone()
            };
            self.add_route_record(&alias_route, parent, Some(target));
        }

        if let Some(name) = &route.name {
            if !self.name_map.contains_key(name) {
                self.name_map.insert(name.clone(), id);
            } else if match_as.is_none() {
                LOGGER.warn(format!(
                    "Duplicate named routes definition: {{ name: \"{}\", path: \"{}\" }}",
                    name, record.path
                ));
            }
        }
    }

    fn finish_batch(&mut self) {
        if let Some(index) = self
            .path_list
            .iter()
            .position(|path| path == names::WILDCARD_PATH)
        {
            let wildcard = self.path_list.remove(index);
            self.path_list.push(wildcard);
        }

        let missing: Vec<String> = self
            .path_list
            .iter()
            .filter(|path| !path.is_empty() && !path.starts_with('*') && !path.starts_with('/'))
            .map(|path| format!("- {}", path))
            .collect();
        if !missing.is_empty() {
            LOGGER.warn(format!(
                "Non-nested routes must include a leading slash character. Fix the following routes: \n{}",
                missing.join("\n")
            ));
        }
    }
}

/// Makes `path` absolute against `parent_path`; a trailing slash is dropped
/// unless `strict`.
fn normalize_path(path: &str, parent_path: Option<&str>, strict: bool) -> String {
    let path = if strict {
        path
    } else {
        path.strip_suffix('/').unwrap_or(path)
    };
    if path.starts_with('/') {
        return path.to_string();
    }
    match parent_path {
        None => path.to_string(),
        Some(parent) => clean_path(&format!("{}/{}", parent, path)),
    }
}
