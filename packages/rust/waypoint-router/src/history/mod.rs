//! Navigation state machine and history backends.
//!
//! [`History`] owns the `current`/`pending` pair and runs every transition
//! through the guard pipeline. How an address is persisted is left to a
//! [`HistoryBackend`]:
//!
//! - [`PathHistory`]: the full path of the address, below a base prefix
//! - [`HashHistory`]: the fragment of the address
//! - [`MemoryHistory`]: an in-memory stack with no address at all
//!
//! # Transition pipeline
//!
//! 1. Match the target against `current`.
//! 2. Abort as duplicated if the target is the current route.
//! 3. Run the leave guards of deactivated views (innermost first), the
//!    `before_each` hooks, the update guards of reused views, the
//!    `before_enter` guards of activated records and finally load lazy
//!    views.
//! 4. Run the enter guards of activated views and the `before_resolve`
//!    hooks.
//! 5. Commit: replace `current`, persist the address, run `after_each`.
//!
//! Before each step the pipeline checks that its route is still the pending
//! one; a newer navigation cancels it.

mod hash;
mod html5;
mod memory;

pub use hash::HashHistory;
pub use html5::PathHistory;
pub use memory::MemoryHistory;

use crate::config::{Component, LazyComponent, View};
use crate::error::NavigationError;
use crate::guard::{GuardOutcome, NavigationGuard};
use crate::location::RawLocation;
use crate::logger::Logger;
use crate::mode::HistoryMode;
use crate::platform::{Platform, PlatformEvent, PlatformListener};
use crate::record::RouteRecord;
use crate::route::{handle_route_entered, is_same_route, Route, START};
use crate::router::RouterContext;
use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("history");

lazy_static! {
    static ref ORIGIN: Regex = Regex::new(r"^https?://[^/]+").unwrap();
}

/// Called with every error that is not a navigation control signal.
pub type ErrorCallback = Arc<dyn Fn(&NavigationError) + Send + Sync>;

/// Called once with the route of the first committed navigation.
pub type ReadyCallback = Box<dyn FnOnce(&Route) + Send>;

/// Called once if the initial navigation fails.
pub type ReadyErrorCallback = Box<dyn FnOnce(&NavigationError) + Send>;

/// Receives every committed route.
pub type RouteListener = Arc<dyn Fn(&Arc<Route>) + Send + Sync>;

/// How a committed transition is written to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    /// Add a new entry.
    Push,
    /// Overwrite the current entry.
    Replace,
    /// The address already reflects the route (native traversal).
    None,
}

/// Address persistence strategy.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    fn mode(&self) -> HistoryMode;

    /// Records `route` as a new entry.
    fn push_entry(&self, route: &Arc<Route>);

    /// Records `route` over the current entry.
    fn replace_entry(&self, route: &Arc<Route>);

    /// Moves `n` entries through the history.
    async fn go(&self, history: &History, n: i32);

    /// Makes the address reflect `current`, pushing a new entry when `push`.
    fn ensure_url(&self, current: &Route, push: bool);

    /// The location the address currently points at.
    fn current_location(&self) -> String;

    /// Subscribes to native notifications. Calling it twice is a no-op.
    fn setup_listeners(&self, sink: PlatformListener);

    fn teardown(&self);

    /// The location a native notification navigates to, if any.
    fn event_target(&self, current: &Route) -> Option<String>;

    /// Runs after a navigation triggered by a native notification commits.
    fn on_event_committed(&self, _route: &Route) {}
}

/// Why a transition stopped before committing.
#[derive(Debug)]
pub(crate) struct Interrupted {
    pub(crate) error: NavigationError,
    /// Target of a guard redirect, to be navigated to next.
    pub(crate) redirect: Option<RawLocation>,
}

struct HistoryState {
    current: Arc<Route>,
    pending: Option<Arc<Route>>,
    ready: bool,
    ready_cbs: Vec<ReadyCallback>,
    ready_error_cbs: Vec<ReadyErrorCallback>,
    error_cbs: Vec<ErrorCallback>,
    listener: Option<RouteListener>,
}

enum Step {
    /// A guard, with the record and view slot an enter guard is bound to.
    Guard(NavigationGuard, Option<(Arc<RouteRecord>, String)>),
    LoadViews(Vec<(String, Arc<LazyComponent>)>),
}

pub struct History {
    context: Arc<RouterContext>,
    backend: Box<dyn HistoryBackend>,
    state: Mutex<HistoryState>,
    events: Arc<Mutex<VecDeque<PlatformEvent>>>,
    /// Number of address writes in progress. Notifications they fire are
    /// echoes of our own navigation and are not queued.
    writing: Arc<AtomicUsize>,
}

impl History {
    pub(crate) fn new(context: Arc<RouterContext>, backend: Box<dyn HistoryBackend>) -> Self {
        Self {
            context,
            backend,
            state: Mutex::new(HistoryState {
                current: START.clone(),
                pending: None,
                ready: false,
                ready_cbs: Vec::new(),
                ready_error_cbs: Vec::new(),
                error_cbs: Vec::new(),
                listener: None,
            }),
            events: Arc::new(Mutex::new(VecDeque::new())),
            writing: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn mode(&self) -> HistoryMode {
        self.backend.mode()
    }

    /// The last committed route.
    pub fn current(&self) -> Arc<Route> {
        Arc::clone(&self.state.lock().current)
    }

    /// The route currently being transitioned to.
    pub fn pending(&self) -> Option<Arc<Route>> {
        self.state.lock().pending.clone()
    }

    pub fn current_location(&self) -> String {
        self.backend.current_location()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub(crate) fn listen(&self, listener: RouteListener) {
        self.state.lock().listener = Some(listener);
    }

    pub(crate) fn on_ready(&self, callback: ReadyCallback, on_error: Option<ReadyErrorCallback>) {
        let current = {
            let mut state = self.state.lock();
            if !state.ready {
                state.ready_cbs.push(callback);
                if let Some(on_error) = on_error {
                    state.ready_error_cbs.push(on_error);
                }
                return;
            }
            Arc::clone(&state.current)
        };
        callback(&current);
    }

    pub(crate) fn on_error(&self, callback: ErrorCallback) {
        self.state.lock().error_cbs.push(callback);
    }

    pub(crate) fn push(&self, location: RawLocation) -> BoxFuture<'_, Result<Arc<Route>, NavigationError>> {
        self.transition_to(location, Persist::Push)
    }

    pub(crate) fn replace(&self, location: RawLocation) -> BoxFuture<'_, Result<Arc<Route>, NavigationError>> {
        self.transition_to(location, Persist::Replace)
    }

    pub(crate) async fn go(&self, n: i32) {
        self.backend.go(self, n).await;
        self.handle_platform_events().await;
    }

    /// Resolves `location` and runs the full transition to it.
    ///
    /// A guard redirect is followed before the returned future completes;
    /// the result is still `Err(Redirected)` for the original target.
    pub(crate) fn transition_to(
        &self,
        location: RawLocation,
        persist: Persist,
    ) -> BoxFuture<'_, Result<Arc<Route>, NavigationError>> {
        Box::pin(async move {
            let prev = self.current();
            let route = match self.context.match_route(location, Some(&prev)) {
                Ok(route) => Arc::new(route),
                Err(err) => {
                    let error = NavigationError::from(err);
                    self.notify_error(&error);
                    return Err(error);
                }
            };

            let commit = |route: &Arc<Route>| self.commit(route, &prev, persist);
            match self.confirm_transition(Arc::clone(&route), commit).await {
                Ok(()) => Ok(route),
                Err(Interrupted { error, redirect }) => {
                    self.fail_ready(&error, &prev);
                    if let Some(target) = redirect {
                        self.follow_redirect(target).await;
                    }
                    Err(error)
                }
            }
        })
    }

    /// Runs the guard pipeline for `route` and calls `commit` if it succeeds.
    pub(crate) async fn confirm_transition<F>(&self, route: Arc<Route>, commit: F) -> Result<(), Interrupted>
    where
        F: FnOnce(&Arc<Route>) + Send,
    {
        let current = {
            let mut state = self.state.lock();
            state.pending = Some(Arc::clone(&route));
            Arc::clone(&state.current)
        };

        if is_same_route(&route, &current)
            && route.matched().len() == current.matched().len()
            && route.matched().last() == current.matched().last()
        {
            self.write_address(|backend| backend.ensure_url(&current, false));
            return Err(self.interrupt(
                NavigationError::Duplicated {
                    from: current.full_path().to_string(),
                    to: route.full_path().to_string(),
                },
                None,
            ));
        }

        let mut split = 0;
        while split < route.matched().len().max(current.matched().len())
            && route.matched().get(split) == current.matched().get(split)
        {
            split += 1;
        }
        let updated = &route.matched()[..split];
        let activated = &route.matched()[split..];
        let deactivated = &current.matched()[split.min(current.matched().len())..];

        let mut leave = instance_guards(deactivated, Component::leave_guard);
        leave.reverse();

        let mut queue = leave;
        queue.extend(self.context.hooks.read().before_each().into_iter().map(|g| Step::Guard(g, None)));
        queue.extend(instance_guards(updated, Component::update_guard));
        queue.extend(
            activated
                .iter()
                .filter_map(|record| record.before_enter().cloned())
                .map(|g| Step::Guard(g, None)),
        );
        queue.push(Step::LoadViews(lazy_views(activated)));
        self.run_queue(queue, &route, &current).await?;

        let mut queue = enter_guards(activated);
        queue.extend(self.context.hooks.read().before_resolve().into_iter().map(|g| Step::Guard(g, None)));
        self.run_queue(queue, &route, &current).await?;

        self.settle_pending(&route, &current)?;
        commit(&route);
        handle_route_entered(&route);
        Ok(())
    }

    async fn run_queue(&self, queue: Vec<Step>, route: &Arc<Route>, current: &Arc<Route>) -> Result<(), Interrupted> {
        for step in queue {
            self.check_pending(route, current)?;
            match step {
                Step::Guard(guard, bound) => {
                    match guard(Arc::clone(route), Arc::clone(current)).await {
                        GuardOutcome::Continue => {}
                        GuardOutcome::ContinueWith(callback) => {
                            if let Some((record, slot)) = bound {
                                record.queue_entered(&slot, callback);
                            }
                        }
                        GuardOutcome::Abort => {
                            self.restore_address();
                            return Err(self.interrupt(
                                NavigationError::Aborted {
                                    from: current.full_path().to_string(),
                                    to: route.full_path().to_string(),
                                },
                                None,
                            ));
                        }
                        GuardOutcome::Error(err) => {
                            self.restore_address();
                            return Err(self.interrupt(NavigationError::Guard(Arc::from(err)), None));
                        }
                        GuardOutcome::Redirect(target) if target.is_target() => {
                            return Err(self.interrupt(
                                NavigationError::Redirected {
                                    from: current.full_path().to_string(),
                                    to: route.full_path().to_string(),
                                },
                                Some(target),
                            ));
                        }
                        GuardOutcome::Redirect(_) => {}
                    }
                }
                Step::LoadViews(views) => {
                    let loads = views.iter().map(|(slot, lazy)| async move {
                        lazy.load().await.map_err(|err| (slot.clone(), err))
                    });
                    if let Err((view, reason)) = try_join_all(loads).await {
                        self.restore_address();
                        return Err(self.interrupt(
                            NavigationError::AsyncComponent {
                                view,
                                reason: Arc::from(reason),
                            },
                            None,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_pending(&self, route: &Arc<Route>, current: &Arc<Route>) -> Result<(), Interrupted> {
        let stale = !matches!(&self.state.lock().pending, Some(pending) if Arc::ptr_eq(pending, route));
        if stale {
            return Err(self.cancelled(route, current));
        }
        Ok(())
    }

    fn cancelled(&self, route: &Arc<Route>, current: &Arc<Route>) -> Interrupted {
        self.interrupt(
            NavigationError::Cancelled {
                from: current.full_path().to_string(),
                to: route.full_path().to_string(),
            },
            None,
        )
    }

    /// Clears `pending` if it is still `route`, under one lock.
    fn settle_pending(&self, route: &Arc<Route>, current: &Arc<Route>) -> Result<(), Interrupted> {
        {
            let mut state = self.state.lock();
            if matches!(&state.pending, Some(pending) if Arc::ptr_eq(pending, route)) {
                state.pending = None;
                return Ok(());
            }
        }
        Err(self.cancelled(route, current))
    }

    fn interrupt(&self, error: NavigationError, redirect: Option<RawLocation>) -> Interrupted {
        if error.is_error() {
            self.notify_error(&error);
        } else {
            LOGGER.debug(error.to_string());
        }
        Interrupted { error, redirect }
    }

    fn write_address(&self, write: impl FnOnce(&dyn HistoryBackend)) {
        self.writing.fetch_add(1, Ordering::SeqCst);
        write(self.backend.as_ref());
        self.writing.fetch_sub(1, Ordering::SeqCst);
    }

    /// Points the address back at `current` after a navigation stopped.
    fn restore_address(&self) {
        let current = self.current();
        self.write_address(|backend| backend.ensure_url(&current, true));
    }

    fn notify_error(&self, error: &NavigationError) {
        let callbacks = self.state.lock().error_cbs.clone();
        if callbacks.is_empty() {
            LOGGER.warn(format!("uncaught error during route navigation: {}", error));
            return;
        }
        for callback in callbacks {
            callback(error);
        }
    }

    fn commit(&self, route: &Arc<Route>, prev: &Arc<Route>, persist: Persist) {
        self.update_route(route);
        self.write_address(|backend| {
            match persist {
                Persist::Push => backend.push_entry(route),
                Persist::Replace => backend.replace_entry(route),
                Persist::None => {}
            }
            backend.ensure_url(route, false);
        });
        self.run_after_hooks(route, prev);

        let ready_cbs = {
            let mut state = self.state.lock();
            if state.ready {
                Vec::new()
            } else {
                state.ready = true;
                state.ready_error_cbs.clear();
                std::mem::take(&mut state.ready_cbs)
            }
        };
        for callback in ready_cbs {
            callback(route);
        }
        LOGGER.debug(format!("navigated to {}", route.full_path()));
    }

    fn fail_ready(&self, error: &NavigationError, prev: &Arc<Route>) {
        if matches!(error, NavigationError::Duplicated { .. }) {
            return;
        }
        let callbacks = {
            let mut state = self.state.lock();
            if state.ready {
                return;
            }
            if matches!(error, NavigationError::Redirected { .. }) && prev.is_start() {
                return;
            }
            state.ready = true;
            state.ready_cbs.clear();
            std::mem::take(&mut state.ready_error_cbs)
        };
        for callback in callbacks {
            callback(error);
        }
    }

    /// Replaces `current` and notifies the route listener.
    pub(crate) fn update_route(&self, route: &Arc<Route>) {
        let listener = {
            let mut state = self.state.lock();
            state.current = Arc::clone(route);
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener(route);
        }
    }

    pub(crate) fn run_after_hooks(&self, route: &Route, prev: &Route) {
        let hooks = self.context.hooks.read().after_each();
        for hook in hooks {
            hook(route, prev);
        }
    }

    /// Navigates to a guard's redirect target.
    pub(crate) async fn follow_redirect(&self, target: RawLocation) {
        let result = if target.replace {
            self.replace(target).await
        } else {
            self.push(target).await
        };
        if let Err(err) = result {
            LOGGER.debug(format!("redirect navigation did not complete: {}", err));
        }
    }

    pub(crate) fn setup_listeners(&self) {
        let events = Arc::clone(&self.events);
        let writing = Arc::clone(&self.writing);
        self.backend.setup_listeners(Arc::new(move |event| {
            if writing.load(Ordering::SeqCst) == 0 {
                events.lock().push_back(event);
            }
        }));
    }

    /// Turns queued native notifications into transitions.
    ///
    /// Returns how many of them started a navigation.
    pub(crate) async fn handle_platform_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let Some(event) = self.events.lock().pop_front() else {
                break;
            };
            let Some(target) = self.backend.event_target(&self.current()) else {
                LOGGER.debug(format!("ignoring {}", event));
                continue;
            };
            handled += 1;
            match self.transition_to(RawLocation::from(target), Persist::None).await {
                Ok(route) => self.write_address(|backend| backend.on_event_committed(&route)),
                Err(err) => LOGGER.debug(format!("{} navigation did not complete: {}", event, err)),
            }
        }
        handled
    }

    /// Detaches native listeners and resets to the start route.
    pub(crate) fn teardown(&self) {
        self.backend.teardown();
        self.events.lock().clear();
        let mut state = self.state.lock();
        state.current = START.clone();
        state.pending = None;
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("History")
            .field("mode", &self.backend.mode())
            .field("current", &state.current.full_path())
            .field("pending", &state.pending.as_ref().map(|r| r.full_path().to_string()))
            .field("ready", &state.ready)
            .finish()
    }
}

/// Guards of views that currently have a live instance.
fn instance_guards(
    records: &[Arc<RouteRecord>],
    pick: fn(&Component) -> Option<&NavigationGuard>,
) -> Vec<Step> {
    let mut steps = Vec::new();
    for record in records {
        for (slot, view) in record.components() {
            if record.instance(slot).is_none() {
                continue;
            }
            let Some(component) = view.component() else { continue };
            if let Some(guard) = pick(component.as_ref()) {
                steps.push(Step::Guard(Arc::clone(guard), None));
            }
        }
    }
    steps
}

fn enter_guards(activated: &[Arc<RouteRecord>]) -> Vec<Step> {
    let mut steps = Vec::new();
    for record in activated {
        for (slot, view) in record.components() {
            let Some(component) = view.component() else { continue };
            if let Some(guard) = component.enter_guard() {
                steps.push(Step::Guard(
                    Arc::clone(guard),
                    Some((Arc::clone(record), slot.clone())),
                ));
            }
        }
    }
    steps
}

fn lazy_views(activated: &[Arc<RouteRecord>]) -> Vec<(String, Arc<LazyComponent>)> {
    activated
        .iter()
        .flat_map(|record| record.components().iter())
        .filter_map(|(slot, view)| match view {
            View::Lazy(lazy) if lazy.resolved().is_none() => Some((slot.clone(), Arc::clone(lazy))),
            _ => None,
        })
        .collect()
}

/// Resolves the base prefix used by the address backends.
///
/// Without an explicit base the platform's `<base href>` is used with its
/// origin stripped. The result starts with `/` and has no trailing slash.
pub fn normalize_base(base: Option<&str>, platform: Option<&dyn Platform>) -> String {
    let mut base = match base.filter(|base| !base.is_empty()) {
        Some(base) => base.to_string(),
        None => platform
            .and_then(|platform| platform.base_href())
            .filter(|href| !href.is_empty())
            .map(|href| ORIGIN.replace(&href, "").into_owned())
            .unwrap_or_else(|| crate::constants::defaults::BASE.to_string()),
    };
    if !base.starts_with('/') {
        base.insert(0, '/');
    }
    if base.ends_with('/') {
        base.pop();
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::error::NavigationFailureType;
    use crate::platform::SimulatedBrowser;
    use crate::router::{Router, RouterOptions};

    #[test]
    fn test_settle_pending_keeps_newer_navigation() {
        let router = Router::new(RouterOptions::default());
        let history = router.history();
        let start = START.clone();
        let older = Arc::new(router.match_route("/a", None).unwrap());
        let newer = Arc::new(router.match_route("/b", None).unwrap());
        history.state.lock().pending = Some(Arc::clone(&newer));

        let interrupted = history.settle_pending(&older, &start).unwrap_err();
        assert!(interrupted
            .error
            .is_navigation_failure(Some(NavigationFailureType::Cancelled)));
        assert!(history.pending().is_some_and(|pending| Arc::ptr_eq(&pending, &newer)));

        history.settle_pending(&newer, &start).unwrap();
        assert!(history.pending().is_none());
    }

    #[tokio::test]
    async fn test_own_address_writes_are_not_queued() {
        let browser = Arc::new(
            SimulatedBrowser::new("https://example.com/#/")
                .unwrap()
                .with_push_state_support(false),
        );
        let router = Router::new(
            RouterOptions::builder()
                .route(RouteConfig::new("/"))
                .route(RouteConfig::new("/a"))
                .route(RouteConfig::new("/b"))
                .mode(HistoryMode::Hash)
                .platform(browser.clone())
                .build(),
        );
        router.start().await.unwrap();

        router.push("/a").await.unwrap();
        router.push("/b").await.unwrap();
        router.replace("/").await.unwrap();
        assert_eq!(browser.entries().len(), 3);
        assert!(router.history().events.lock().is_empty());

        browser.go(-1);
        assert_eq!(router.history().events.lock().len(), 1);
        assert_eq!(router.handle_platform_events().await, 1);
        assert_eq!(router.current_route().path(), "/a");
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base(None, None), "");
        assert_eq!(normalize_base(Some("/app/"), None), "/app");
        assert_eq!(normalize_base(Some("app"), None), "/app");

        let browser = SimulatedBrowser::new("https://example.com/")
            .unwrap()
            .with_base_href("https://example.com/shop/");
        assert_eq!(normalize_base(None, Some(&browser as &dyn Platform)), "/shop");
        assert_eq!(normalize_base(Some("/explicit"), Some(&browser as &dyn Platform)), "/explicit");
    }
}
