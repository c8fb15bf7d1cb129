//! The composed router.
//!
//! [`Router`] ties the route table, the global hooks and one history
//! backend together. It is the only type most applications touch.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_router::{Component, Platform, RouteConfig, Router, RouterOptions, SimulatedBrowser};
//!
//! # futures::executor::block_on(async {
//! let browser = Arc::new(SimulatedBrowser::new("https://example.com/").unwrap());
//! let router = Router::new(
//!     RouterOptions::builder()
//!         .route(RouteConfig::new("/").name("Home").component(Component::new("Home")))
//!         .route(RouteConfig::new("/user/:id").name("User").component(Component::new("User")))
//!         .platform(browser.clone())
//!         .build(),
//! );
//!
//! router.start().await.unwrap();
//! let route = router.push("/user/7").await.unwrap();
//! assert_eq!(route.param("id"), Some("7"));
//! assert_eq!(browser.href(), "https://example.com/#/user/7");
//! # });
//! ```

use crate::config::RouteConfig;
use crate::constants::defaults;
use crate::error::{NavigationError, RouterError};
use crate::guard::{AfterHook, HookId, Hooks, NavigationGuard};
use crate::history::{
    normalize_base, HashHistory, History, HistoryBackend, MemoryHistory, PathHistory, Persist,
};
use crate::location::RawLocation;
use crate::logger::Logger;
use crate::matcher::Matcher;
use crate::mode::HistoryMode;
use crate::platform::Platform;
use crate::query::{DefaultQueryCodec, QueryCodec};
use crate::record::RouteRecord;
use crate::route::Route;
use bon::Builder;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("router");

/// State shared between the router and its history.
pub(crate) struct RouterContext {
    /// Copy on write: matching works on a snapshot, so redirect functions
    /// run without a lock held and may call back into the router.
    matcher: RwLock<Arc<Matcher>>,
    pub(crate) hooks: RwLock<Hooks>,
}

impl RouterContext {
    pub(crate) fn matcher(&self) -> Arc<Matcher> {
        Arc::clone(&*self.matcher.read())
    }

    fn update_matcher(&self, update: impl FnOnce(&mut Matcher)) {
        let mut matcher = self.matcher.write();
        update(Arc::make_mut(&mut *matcher));
    }

    pub(crate) fn match_route(&self, raw: RawLocation, current: Option<&Route>) -> Result<Route, RouterError> {
        self.matcher().match_route(raw, current)
    }
}

/// Configuration for [`Router::new`].
///
/// # Examples
///
/// ```
/// use waypoint_router::{HistoryMode, RouteConfig, RouterOptions};
///
/// let options = RouterOptions::builder()
///     .routes(vec![RouteConfig::new("/"), RouteConfig::new("/about")])
///     .mode(HistoryMode::History)
///     .base("/app")
///     .build();
/// assert!(options.fallback);
/// ```
#[derive(Builder)]
pub struct RouterOptions {
    #[builder(field)]
    routes: Vec<RouteConfig>,

    /// Requested history mode.
    ///
    /// `WAYPOINT_HISTORY_MODE` overrides it. `History` without push-state
    /// support becomes `Hash` when `fallback` is set, and every mode becomes
    /// `Abstract` without a platform.
    ///
    /// Default: `Hash`
    pub mode: Option<HistoryMode>,

    /// Prefix of every address in `History` mode.
    ///
    /// Default: the platform's `<base href>`, else `/`
    #[builder(into)]
    pub base: Option<String>,

    /// Degrade `History` to `Hash` on platforms without push-state support.
    ///
    /// Default: `true`
    #[builder(default = defaults::FALLBACK)]
    pub fallback: bool,

    /// The address bar to drive. Without one the router keeps its history
    /// in memory.
    pub platform: Option<Arc<dyn Platform>>,

    /// Parses and serializes query strings.
    ///
    /// Default: [`DefaultQueryCodec`]
    pub query_codec: Option<Arc<dyn QueryCodec>>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<S: router_options_builder::State> RouterOptionsBuilder<S> {
    /// Adds one route to the table.
    pub fn route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds routes to the table, in order.
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteConfig>) -> Self {
        self.routes.extend(routes);
        self
    }
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("routes", &self.routes)
            .field("mode", &self.mode)
            .field("base", &self.base)
            .field("fallback", &self.fallback)
            .field("platform", &self.platform)
            .field("query_codec", &self.query_codec)
            .finish()
    }
}

pub struct Router {
    context: Arc<RouterContext>,
    history: History,
    base: String,
    fell_back: bool,
}

impl Router {
    pub fn new(options: RouterOptions) -> Self {
        let RouterOptions {
            routes,
            mode,
            base,
            fallback,
            platform,
            query_codec,
        } = options;

        let supports_push_state = platform
            .as_ref()
            .is_some_and(|platform| platform.supports_push_state());
        let requested = HistoryMode::resolve(mode);
        let mode = requested.effective(platform.is_some(), supports_push_state, fallback);
        let fell_back = requested == HistoryMode::History && !supports_push_state && fallback;

        let codec = query_codec.unwrap_or_else(|| Arc::new(DefaultQueryCodec));
        let context = Arc::new(RouterContext {
            matcher: RwLock::new(Arc::new(Matcher::new(&routes, codec))),
            hooks: RwLock::new(Hooks::default()),
        });

        let base = normalize_base(base.as_deref(), platform.as_deref());
        let backend: Box<dyn HistoryBackend> = match (mode, platform) {
            (HistoryMode::History, Some(platform)) => Box::new(PathHistory::new(platform, base.clone())),
            (HistoryMode::Hash, Some(platform)) => {
                Box::new(HashHistory::new(platform, base.clone(), fell_back))
            }
            _ => Box::new(MemoryHistory::new()),
        };
        LOGGER.debug(format!("Router.new: {} mode, base \"{}\"", backend.mode(), base));

        let history = History::new(Arc::clone(&context), backend);
        Self {
            context,
            history,
            base,
            fell_back,
        }
    }

    /// The effective history mode.
    pub fn mode(&self) -> HistoryMode {
        self.history.mode()
    }

    /// The normalized base prefix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether `History` mode was requested but degraded to `Hash`.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current_route(&self) -> Arc<Route> {
        self.history.current()
    }

    /// Resolves `location` without navigating.
    ///
    /// Relative locations resolve against `current`; pass `None` to resolve
    /// from the root. Only a failing redirect function produces an error.
    pub fn match_route(
        &self,
        location: impl Into<RawLocation>,
        current: Option<&Route>,
    ) -> Result<Route, RouterError> {
        self.context.match_route(location.into(), current)
    }

    /// Concrete route records in matching order.
    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.context.matcher().get_routes()
    }

    pub fn add_route(&self, route: RouteConfig) {
        self.context.update_matcher(|matcher| matcher.add_route(&route));
    }

    /// Adds `route` as a child of the route named `parent_name`.
    ///
    /// The child is also reachable below each alias of the parent. An
    /// unknown parent adds the route at the root.
    pub fn add_child_route(&self, parent_name: &str, route: RouteConfig) {
        self.context
            .update_matcher(|matcher| matcher.add_child_route(parent_name, &route));
    }

    pub fn add_routes(&self, routes: Vec<RouteConfig>) {
        self.context.update_matcher(|matcher| matcher.add_routes(&routes));
    }

    /// Re-resolves the current location, e.g. after routes were added.
    ///
    /// Does nothing before the first navigation.
    pub async fn refresh(&self) -> Result<Arc<Route>, NavigationError> {
        let current = self.history.current();
        if current.is_start() {
            return Ok(current);
        }
        let location = self.history.current_location();
        self.history
            .transition_to(RawLocation::from(location), Persist::None)
            .await
    }

    /// Navigates to `location`, adding a history entry.
    ///
    /// The future resolves once the navigation is settled: on success the
    /// route listener, the `after_each` hooks and any pending ready callbacks
    /// have already run with the new route. A guard redirect is followed
    /// before it resolves, with `Err(Redirected)` for the original target.
    pub fn push(&self, location: impl Into<RawLocation>) -> BoxFuture<'_, Result<Arc<Route>, NavigationError>> {
        self.history.push(location.into())
    }

    /// Navigates to `location`, replacing the current history entry.
    ///
    /// Settles like [`Router::push`].
    pub fn replace(&self, location: impl Into<RawLocation>) -> BoxFuture<'_, Result<Arc<Route>, NavigationError>> {
        self.history.replace(location.into())
    }

    /// Moves `n` entries through the history.
    pub async fn go(&self, n: i32) {
        self.history.go(n).await;
    }

    pub async fn back(&self) {
        self.go(-1).await;
    }

    pub async fn forward(&self) {
        self.go(1).await;
    }

    /// Performs the initial navigation to the platform's address and starts
    /// listening for native navigation.
    ///
    /// In abstract mode there is no address; the current route is returned.
    pub async fn start(&self) -> Result<Arc<Route>, NavigationError> {
        if self.mode() == HistoryMode::Abstract {
            return Ok(self.history.current());
        }
        let location = self.history.current_location();
        let result = self
            .history
            .transition_to(RawLocation::from(location), Persist::None)
            .await;
        self.history.setup_listeners();
        result
    }

    /// Processes queued native navigation notifications.
    ///
    /// Returns how many of them started a navigation.
    pub async fn handle_platform_events(&self) -> usize {
        self.history.handle_platform_events().await
    }

    /// Detaches native listeners and resets to the start route.
    pub fn teardown(&self) {
        self.history.teardown();
    }

    /// Registers the callback receiving every committed route.
    pub fn listen<F>(&self, listener: F)
    where
        F: Fn(&Arc<Route>) + Send + Sync + 'static,
    {
        self.history.listen(Arc::new(listener));
    }

    /// Runs `callback` once the initial navigation commits, or right away if
    /// it already has.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(&Route) + Send + 'static,
    {
        self.history.on_ready(Box::new(callback), None);
    }

    /// Like [`Router::on_ready`], with a callback for a failed initial
    /// navigation.
    pub fn on_ready_with_error<F, E>(&self, callback: F, on_error: E)
    where
        F: FnOnce(&Route) + Send + 'static,
        E: FnOnce(&NavigationError) + Send + 'static,
    {
        self.history.on_ready(Box::new(callback), Some(Box::new(on_error)));
    }

    /// Registers a callback for navigation errors.
    ///
    /// Control signals (redirected, aborted, cancelled, duplicated) are
    /// not reported.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&NavigationError) + Send + Sync + 'static,
    {
        self.history.on_error(Arc::new(callback));
    }

    pub fn before_each(&self, guard: NavigationGuard) -> HookId {
        self.context.hooks.write().add_before_each(guard)
    }

    /// Registers a guard that runs after every enter guard.
    pub fn before_resolve(&self, guard: NavigationGuard) -> HookId {
        self.context.hooks.write().add_before_resolve(guard)
    }

    pub fn after_each<F>(&self, hook: F) -> HookId
    where
        F: Fn(&Route, &Route) + Send + Sync + 'static,
    {
        let hook: AfterHook = Arc::new(hook);
        self.context.hooks.write().add_after_each(hook)
    }

    /// Removes a hook. Returns false if it was not registered.
    pub fn remove_hook(&self, id: HookId) -> bool {
        self.context.hooks.write().remove(id)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("history", &self.history)
            .field("base", &self.base)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}
