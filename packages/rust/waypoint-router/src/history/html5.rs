use super::{History, HistoryBackend};
use crate::logger::Logger;
use crate::mode::HistoryMode;
use crate::path::clean_path;
use crate::platform::{ListenerId, Platform, PlatformEvent, PlatformListener};
use crate::route::Route;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

static LOGGER: Logger = Logger::const_new("history.html5");

/// Persists routes as the path of the address, below `base`.
pub struct PathHistory {
    platform: Arc<dyn Platform>,
    base: String,
    start_location: String,
    listeners: Mutex<Vec<ListenerId>>,
}

impl PathHistory {
    pub fn new(platform: Arc<dyn Platform>, base: String) -> Self {
        let start_location = location(platform.as_ref(), &base);
        Self {
            platform,
            base,
            start_location,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url_for(&self, route: &Route) -> String {
        clean_path(&format!("{}{}", self.base, route.full_path()))
    }
}

#[async_trait]
impl HistoryBackend for PathHistory {
    fn mode(&self) -> HistoryMode {
        HistoryMode::History
    }

    fn push_entry(&self, route: &Arc<Route>) {
        self.platform.push_state(&self.url_for(route));
    }

    fn replace_entry(&self, route: &Arc<Route>) {
        self.platform.replace_state(&self.url_for(route));
    }

    async fn go(&self, _history: &History, n: i32) {
        self.platform.go(n);
    }

    fn ensure_url(&self, current: &Route, push: bool) {
        if location(self.platform.as_ref(), &self.base) == current.full_path() {
            return;
        }
        let url = self.url_for(current);
        if push {
            self.platform.push_state(&url);
        } else {
            self.platform.replace_state(&url);
        }
    }

    fn current_location(&self) -> String {
        location(self.platform.as_ref(), &self.base)
    }

    fn setup_listeners(&self, sink: PlatformListener) {
        let mut listeners = self.listeners.lock();
        if !listeners.is_empty() {
            return;
        }
        listeners.push(self.platform.add_listener(PlatformEvent::PopState, sink));
    }

    fn teardown(&self) {
        for id in self.listeners.lock().drain(..) {
            self.platform.remove_listener(id);
        }
    }

    fn event_target(&self, current: &Route) -> Option<String> {
        let location = location(self.platform.as_ref(), &self.base);
        // Some engines fire popstate on initial load.
        if current.is_start() && location == self.start_location {
            return None;
        }
        Some(location)
    }
}

/// The address relative to `base`: path, search and hash.
pub(crate) fn location(platform: &dyn Platform, base: &str) -> String {
    let href = platform.href();
    let url = match Url::parse(&href) {
        Ok(url) => url,
        Err(err) => {
            LOGGER.warn(format!("cannot read location from \"{}\": {}", href, err));
            return "/".to_string();
        }
    };

    let mut path = url.path();
    let lower = path.to_lowercase();
    let base_lower = base.to_lowercase();
    if !base.is_empty()
        && (lower == base_lower || lower.starts_with(&clean_path(&format!("{}/", base_lower))))
    {
        path = path.get(base.len()..).unwrap_or_default();
    }

    let mut location = if path.is_empty() { "/".to_string() } else { path.to_string() };
    if let Some(query) = url.query().filter(|query| !query.is_empty()) {
        location.push('?');
        location.push_str(query);
    }
    if let Some(fragment) = url.fragment().filter(|fragment| !fragment.is_empty()) {
        location.push('#');
        location.push_str(fragment);
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedBrowser;

    #[test]
    fn test_location_strips_base() {
        let browser = SimulatedBrowser::new("https://example.com/App/users?x=1#top").unwrap();
        assert_eq!(location(&browser, "/app"), "/users?x=1#top");
        assert_eq!(location(&browser, ""), "/App/users?x=1#top");
        assert_eq!(location(&browser, "/ap"), "/App/users?x=1#top");

        let browser = SimulatedBrowser::new("https://example.com/app").unwrap();
        assert_eq!(location(&browser, "/app"), "/");
    }

    #[test]
    fn test_listeners_are_idempotent() {
        let browser = Arc::new(SimulatedBrowser::new("https://example.com/").unwrap());
        let history = PathHistory::new(browser.clone(), String::new());

        history.setup_listeners(Arc::new(|_| {}));
        history.setup_listeners(Arc::new(|_| {}));
        assert_eq!(browser.listener_count(), 1);

        history.teardown();
        assert_eq!(browser.listener_count(), 0);
    }
}
