use super::html5::location;
use super::{History, HistoryBackend};
use crate::logger::Logger;
use crate::mode::HistoryMode;
use crate::path::clean_path;
use crate::platform::{ListenerId, Platform, PlatformEvent, PlatformListener};
use crate::route::Route;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("history.hash");

/// Persists routes in the fragment of the address (`/#/users/7`).
///
/// Without push-state support entries are created by assigning the
/// fragment, and corrected by replacing the whole address.
pub struct HashHistory {
    platform: Arc<dyn Platform>,
    base: String,
    listeners: Mutex<Vec<ListenerId>>,
}

impl HashHistory {
    /// Creates the backend and normalizes the current address.
    ///
    /// `fallback` is set when `history` mode degraded to this one: a path
    /// address is then rewritten to `base/#path` instead of having a slash
    /// forced onto its fragment.
    pub fn new(platform: Arc<dyn Platform>, base: String, fallback: bool) -> Self {
        let history = Self {
            platform,
            base,
            listeners: Mutex::new(Vec::new()),
        };
        if !(fallback && history.check_fallback()) {
            history.ensure_slash();
        }
        history
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn check_fallback(&self) -> bool {
        let location = location(self.platform.as_ref(), &self.base);
        if location.starts_with("/#") {
            return false;
        }
        let target = clean_path(&format!("{}/#{}", self.base, location));
        LOGGER.debug(format!("rewriting {} to {}", location, target));
        self.platform.replace_location(&target);
        true
    }

    /// Makes sure the fragment starts with `/`. Returns false if it had to
    /// be corrected.
    fn ensure_slash(&self) -> bool {
        let path = self.hash();
        if path.starts_with('/') {
            return true;
        }
        self.replace_hash(&format!("/{}", path));
        false
    }

    fn hash(&self) -> String {
        let href = self.platform.href();
        href.split_once('#')
            .map(|(_, hash)| hash.to_string())
            .unwrap_or_default()
    }

    fn url(&self, path: &str) -> String {
        let href = self.platform.href();
        let base = href.split_once('#').map_or(href.as_str(), |(base, _)| base);
        format!("{}#{}", base, path)
    }

    fn push_hash(&self, path: &str) {
        if self.platform.supports_push_state() {
            self.platform.push_state(&self.url(path));
        } else {
            self.platform.set_hash(path);
        }
    }

    fn replace_hash(&self, path: &str) {
        if self.platform.supports_push_state() {
            self.platform.replace_state(&self.url(path));
        } else {
            self.platform.replace_location(&self.url(path));
        }
    }
}

#[async_trait]
impl HistoryBackend for HashHistory {
    fn mode(&self) -> HistoryMode {
        HistoryMode::Hash
    }

    fn push_entry(&self, route: &Arc<Route>) {
        self.push_hash(route.full_path());
    }

    fn replace_entry(&self, route: &Arc<Route>) {
        self.replace_hash(route.full_path());
    }

    async fn go(&self, _history: &History, n: i32) {
        self.platform.go(n);
    }

    fn ensure_url(&self, current: &Route, push: bool) {
        if self.hash() == current.full_path() {
            return;
        }
        if push {
            self.push_hash(current.full_path());
        } else {
            self.replace_hash(current.full_path());
        }
    }

    fn current_location(&self) -> String {
        self.hash()
    }

    fn setup_listeners(&self, sink: PlatformListener) {
        let mut listeners = self.listeners.lock();
        if !listeners.is_empty() {
            return;
        }
        // Fragment navigations fire both events; listening to one avoids
        // handling them twice.
        let event = if self.platform.supports_push_state() {
            PlatformEvent::PopState
        } else {
            PlatformEvent::HashChange
        };
        listeners.push(self.platform.add_listener(event, sink));
    }

    fn teardown(&self) {
        for id in self.listeners.lock().drain(..) {
            self.platform.remove_listener(id);
        }
    }

    fn event_target(&self, _current: &Route) -> Option<String> {
        if !self.ensure_slash() {
            return None;
        }
        Some(self.hash())
    }

    fn on_event_committed(&self, route: &Route) {
        if !self.platform.supports_push_state() {
            self.replace_hash(route.full_path());
        }
    }
}
