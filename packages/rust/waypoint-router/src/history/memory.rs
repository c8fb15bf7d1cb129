use super::{History, HistoryBackend, Interrupted};
use crate::error::NavigationError;
use crate::logger::Logger;
use crate::mode::HistoryMode;
use crate::platform::PlatformListener;
use crate::route::Route;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("history.memory");

#[derive(Default)]
struct Stack {
    entries: Vec<Arc<Route>>,
    index: Option<usize>,
}

/// Keeps routes in an in-memory stack; there is no address to sync.
#[derive(Default)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full paths of the stacked routes, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.stack
            .lock()
            .entries
            .iter()
            .map(|route| route.full_path().to_string())
            .collect()
    }

    /// Position of the current entry, `None` before the first navigation.
    pub fn index(&self) -> Option<usize> {
        self.stack.lock().index
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistory {
    fn mode(&self) -> HistoryMode {
        HistoryMode::Abstract
    }

    fn push_entry(&self, route: &Arc<Route>) {
        let mut stack = self.stack.lock();
        let keep = stack.index.map_or(0, |index| index + 1);
        stack.entries.truncate(keep);
        stack.entries.push(Arc::clone(route));
        stack.index = Some(keep);
    }

    fn replace_entry(&self, route: &Arc<Route>) {
        let mut stack = self.stack.lock();
        let index = stack.index.unwrap_or(0);
        stack.entries.truncate(index);
        stack.entries.push(Arc::clone(route));
        stack.index = Some(index);
    }

    /// Replays the stored route through the guard pipeline without
    /// re-matching it. Out-of-range moves are ignored.
    async fn go(&self, history: &History, n: i32) {
        let (target, route) = {
            let stack = self.stack.lock();
            let target = stack.index.map_or(-1, |index| index as i64) + i64::from(n);
            if target < 0 || target >= stack.entries.len() as i64 {
                LOGGER.debug(format!("ignoring go({}): out of range", n));
                return;
            }
            let target = target as usize;
            (target, Arc::clone(&stack.entries[target]))
        };

        let commit = |route: &Arc<Route>| {
            let prev = history.current();
            self.stack.lock().index = Some(target);
            history.update_route(route);
            history.run_after_hooks(route, &prev);
        };

        match history.confirm_transition(route, commit).await {
            Ok(()) => {}
            Err(Interrupted { error, redirect }) => {
                if matches!(error, NavigationError::Duplicated { .. }) {
                    self.stack.lock().index = Some(target);
                }
                if let Some(target) = redirect {
                    history.follow_redirect(target).await;
                }
            }
        }
    }

    fn ensure_url(&self, _current: &Route, _push: bool) {}

    fn current_location(&self) -> String {
        self.stack
            .lock()
            .entries
            .last()
            .map_or_else(|| "/".to_string(), |route| route.full_path().to_string())
    }

    fn setup_listeners(&self, _sink: PlatformListener) {}

    fn teardown(&self) {}

    fn event_target(&self, _current: &Route) -> Option<String> {
        None
    }
}
