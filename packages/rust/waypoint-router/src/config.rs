//! Declarative route configuration.
//!
//! A route tree is described with [`RouteConfig`] values and handed to the
//! router once at construction, or appended later with `add_route`.
//!
//! # Examples
//!
//! ```
//! use waypoint_router::{Component, RouteConfig};
//!
//! let routes = vec![
//!     RouteConfig::new("/").name("Home").component(Component::new("HomeView")),
//!     RouteConfig::new("/user/:id")
//!         .name("User")
//!         .component(Component::new("UserView"))
//!         .props(true)
//!         .children(vec![RouteConfig::new("posts").component(Component::new("PostsView"))]),
//!     RouteConfig::new("/dashboard").redirect("/login"),
//!     RouteConfig::new("/login").alias("/signin").component(Component::new("LoginView")),
//! ];
//! # let _ = routes;
//! ```

use crate::constants::names;
use crate::error::BoxError;
use crate::guard::NavigationGuard;
use crate::location::RawLocation;
use crate::params::PathOptions;
use crate::route::Route;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

/// Metadata attached to a route record.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Computes a redirect target from the route that triggered it.
///
/// Returning `Ok(None)` is treated as an invalid redirect and resolves to an
/// empty route. Returning an error aborts matching.
pub type RedirectFn = Arc<dyn Fn(&Route) -> Result<Option<RawLocation>, BoxError> + Send + Sync>;

/// Loads a view component on first activation.
pub type ComponentFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Component, BoxError>> + Send + Sync>;

/// Computes the props handed to a view.
pub type PropsFn = Arc<dyn Fn(&Route) -> serde_json::Value + Send + Sync>;

/// Where a matched record sends the navigation instead.
#[derive(Clone)]
pub enum Redirect {
    To(RawLocation),
    With(RedirectFn),
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirect::To(location) => f.debug_tuple("To").field(location).finish(),
            Redirect::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

/// How the props of one view slot are derived from the route.
#[derive(Clone)]
pub enum PropsRule {
    /// `true` hands the route params over as props.
    Bool(bool),
    Static(serde_json::Map<String, serde_json::Value>),
    Fn(PropsFn),
}

impl PropsRule {
    /// Resolves the props for `route`, `None` when the rule yields nothing.
    pub fn resolve(&self, route: &Route) -> Option<serde_json::Value> {
        match self {
            PropsRule::Bool(true) => serde_json::to_value(route.params()).ok(),
            PropsRule::Bool(false) => None,
            PropsRule::Static(props) => Some(serde_json::Value::Object(props.clone())),
            PropsRule::Fn(resolve) => Some(resolve(route)),
        }
    }
}

impl From<bool> for PropsRule {
    fn from(value: bool) -> Self {
        PropsRule::Bool(value)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for PropsRule {
    fn from(value: serde_json::Map<String, serde_json::Value>) -> Self {
        PropsRule::Static(value)
    }
}

impl fmt::Debug for PropsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropsRule::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            PropsRule::Static(props) => f.debug_tuple("Static").field(props).finish(),
            PropsRule::Fn(_) => f.write_str("Fn(<fn>)"),
        }
    }
}

/// A view component as seen by the router.
///
/// The router never renders anything. It only reads the in-component guards
/// and hands the component (with its opaque `payload`) to the renderer.
#[derive(Clone, Default)]
pub struct Component {
    name: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    before_route_enter: Option<NavigationGuard>,
    before_route_update: Option<NavigationGuard>,
    before_route_leave: Option<NavigationGuard>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attaches renderer-specific data.
    pub fn with_payload(mut self, payload: impl Any + Send + Sync) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Guard run before the component's route is entered. It has no live
    /// instance yet; a callback passed through `GuardOutcome::ContinueWith`
    /// receives the instance once it registers.
    pub fn before_route_enter(mut self, guard: NavigationGuard) -> Self {
        self.before_route_enter = Some(guard);
        self
    }

    /// Guard run when the route changes but this component stays mounted.
    pub fn before_route_update(mut self, guard: NavigationGuard) -> Self {
        self.before_route_update = Some(guard);
        self
    }

    /// Guard run before the component's route is left.
    pub fn before_route_leave(mut self, guard: NavigationGuard) -> Self {
        self.before_route_leave = Some(guard);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.payload.as_ref()
    }

    pub(crate) fn enter_guard(&self) -> Option<&NavigationGuard> {
        self.before_route_enter.as_ref()
    }

    pub(crate) fn update_guard(&self) -> Option<&NavigationGuard> {
        self.before_route_update.as_ref()
    }

    pub(crate) fn leave_guard(&self) -> Option<&NavigationGuard> {
        self.before_route_leave.as_ref()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("payload", &self.payload.is_some())
            .field("before_route_enter", &self.before_route_enter.is_some())
            .field("before_route_update", &self.before_route_update.is_some())
            .field("before_route_leave", &self.before_route_leave.is_some())
            .finish()
    }
}

/// A lazily loaded component. The factory runs at most until it succeeds.
pub struct LazyComponent {
    factory: ComponentFactory,
    resolved: OnceLock<Arc<Component>>,
}

impl LazyComponent {
    pub fn resolved(&self) -> Option<&Arc<Component>> {
        self.resolved.get()
    }

    pub(crate) async fn load(&self) -> Result<Arc<Component>, BoxError> {
        if let Some(component) = self.resolved.get() {
            return Ok(Arc::clone(component));
        }
        let component = Arc::new((self.factory)().await?);
        Ok(Arc::clone(self.resolved.get_or_init(|| component)))
    }
}

/// What a view slot of a record renders.
#[derive(Clone)]
pub enum View {
    Ready(Arc<Component>),
    Lazy(Arc<LazyComponent>),
}

impl View {
    /// Wraps an async factory; it runs when the route is first activated.
    pub fn lazy<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Component, BoxError>> + Send + 'static,
    {
        let factory: ComponentFactory = Arc::new(move || Box::pin(factory()));
        View::Lazy(Arc::new(LazyComponent {
            factory,
            resolved: OnceLock::new(),
        }))
    }

    /// The component, if it is available without loading.
    pub fn component(&self) -> Option<Arc<Component>> {
        match self {
            View::Ready(component) => Some(Arc::clone(component)),
            View::Lazy(lazy) => lazy.resolved().cloned(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            View::Ready(_) => true,
            View::Lazy(lazy) => lazy.resolved().is_some(),
        }
    }
}

impl From<Component> for View {
    fn from(component: Component) -> Self {
        View::Ready(Arc::new(component))
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Ready(component) => f.debug_tuple("Ready").field(component).finish(),
            View::Lazy(lazy) => f
                .debug_tuple("Lazy")
                .field(&lazy.resolved().map(|c| c.name().to_string()))
                .finish(),
        }
    }
}

/// One entry of the route tree.
#[derive(Clone, Default)]
pub struct RouteConfig {
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) components: IndexMap<String, View>,
    pub(crate) children: Vec<RouteConfig>,
    pub(crate) redirect: Option<Redirect>,
    pub(crate) alias: Vec<String>,
    pub(crate) before_enter: Option<NavigationGuard>,
    pub(crate) meta: Meta,
    pub(crate) props: IndexMap<String, PropsRule>,
    pub(crate) case_sensitive: Option<bool>,
    pub(crate) path_options: PathOptions,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the view rendered in the default slot.
    pub fn component(mut self, view: impl Into<View>) -> Self {
        self.components
            .insert(names::DEFAULT_VIEW.to_string(), view.into());
        self
    }

    /// Adds a named view. Props set with [`RouteConfig::props`] then apply
    /// to the default slot only; use [`RouteConfig::view_props`] for others.
    pub fn view(mut self, slot: impl Into<String>, view: impl Into<View>) -> Self {
        self.components.insert(slot.into(), view.into());
        self
    }

    pub fn children(mut self, children: Vec<RouteConfig>) -> Self {
        self.children = children;
        self
    }

    pub fn child(mut self, child: RouteConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Redirects to a fixed target.
    pub fn redirect(mut self, target: impl Into<RawLocation>) -> Self {
        self.redirect = Some(Redirect::To(target.into()));
        self
    }

    /// Redirects to a target computed from the matched route.
    pub fn redirect_with<F>(mut self, redirect: F) -> Self
    where
        F: Fn(&Route) -> Result<Option<RawLocation>, BoxError> + Send + Sync + 'static,
    {
        self.redirect = Some(Redirect::With(Arc::new(redirect)));
        self
    }

    /// Adds an alternative path resolving to this route. May be called repeatedly.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    pub fn before_enter(mut self, guard: NavigationGuard) -> Self {
        self.before_enter = Some(guard);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Props rule for the default view.
    pub fn props(mut self, rule: impl Into<PropsRule>) -> Self {
        self.props
            .insert(names::DEFAULT_VIEW.to_string(), rule.into());
        self
    }

    /// Props rule computed by a function, for the default view.
    pub fn props_with<F>(self, resolve: F) -> Self
    where
        F: Fn(&Route) -> serde_json::Value + Send + Sync + 'static,
    {
        self.props(PropsRule::Fn(Arc::new(resolve)))
    }

    /// Props rule for a named view.
    pub fn view_props(mut self, slot: impl Into<String>, rule: impl Into<PropsRule>) -> Self {
        self.props.insert(slot.into(), rule.into());
        self
    }

    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = Some(sensitive);
        self
    }

    /// Path-compile options. `case_sensitive`, when set, wins over `sensitive`.
    pub fn path_options(mut self, options: PathOptions) -> Self {
        self.path_options = options;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("components", &self.components)
            .field("children", &self.children)
            .field("redirect", &self.redirect)
            .field("alias", &self.alias)
            .field("before_enter", &self.before_enter.is_some())
            .field("meta", &self.meta)
            .field("props", &self.props)
            .finish()
    }
}
