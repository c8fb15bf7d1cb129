//! Navigation guards and hooks.
//!
//! A guard is an async function of `(to, from)` resolving to a
//! [`GuardOutcome`]. Guards run strictly one after another; a guard that
//! needs to wait (for a confirmation dialog, a permission check, ...) simply
//! awaits before returning its outcome.
//!
//! # Examples
//!
//! ```
//! use waypoint_router::{guard_fn, GuardOutcome, RawLocation};
//!
//! let require_login = guard_fn(|to, _from| async move {
//!     if to.meta().get("requires_auth").is_some() {
//!         GuardOutcome::Redirect(RawLocation::from("/login"))
//!     } else {
//!         GuardOutcome::Continue
//!     }
//! });
//! # let _ = require_login;
//! ```

use crate::error::BoxError;
use crate::location::RawLocation;
use crate::record::EnteredCallback;
use crate::route::Route;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a guard decided.
pub enum GuardOutcome {
    /// Proceed with the navigation.
    Continue,
    /// Proceed, and hand the callback the component instance once it mounts.
    /// Only meaningful for `before_route_enter`; other guards just continue.
    ContinueWith(EnteredCallback),
    /// Stop the navigation and restore the current address.
    Abort,
    /// Stop the navigation and report the error.
    Error(BoxError),
    /// Stop the navigation and navigate to this location instead. A target
    /// with `replace` set replaces the history entry.
    Redirect(RawLocation),
}

impl GuardOutcome {
    /// Wraps a callback for `ContinueWith`.
    pub fn continue_with<F>(callback: F) -> Self
    where
        F: FnOnce(&crate::record::ViewInstance) + Send + 'static,
    {
        GuardOutcome::ContinueWith(Box::new(callback))
    }
}

impl fmt::Debug for GuardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardOutcome::Continue => f.write_str("Continue"),
            GuardOutcome::ContinueWith(_) => f.write_str("ContinueWith(<fn>)"),
            GuardOutcome::Abort => f.write_str("Abort"),
            GuardOutcome::Error(err) => f.debug_tuple("Error").field(err).finish(),
            GuardOutcome::Redirect(location) => f.debug_tuple("Redirect").field(location).finish(),
        }
    }
}

impl<E> From<Result<(), E>> for GuardOutcome
where
    E: Into<BoxError>,
{
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => GuardOutcome::Continue,
            Err(err) => GuardOutcome::Error(err.into()),
        }
    }
}

/// A navigation guard: `(to, from) -> outcome`.
pub type NavigationGuard = Arc<dyn Fn(Arc<Route>, Arc<Route>) -> BoxFuture<'static, GuardOutcome> + Send + Sync>;

/// Observer called after every committed navigation with `(to, from)`.
pub type AfterHook = Arc<dyn Fn(&Route, &Route) + Send + Sync>;

/// Boxes an async closure into a [`NavigationGuard`].
pub fn guard_fn<F, Fut>(guard: F) -> NavigationGuard
where
    F: Fn(Arc<Route>, Arc<Route>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GuardOutcome> + Send + 'static,
{
    Arc::new(move |to, from| Box::pin(guard(to, from)) as BoxFuture<'static, GuardOutcome>)
}

/// Identifies a registered global hook for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);

/// Global hooks, in registration order.
#[derive(Default)]
pub(crate) struct Hooks {
    next_id: u64,
    pub(crate) before_each: Vec<(HookId, NavigationGuard)>,
    pub(crate) before_resolve: Vec<(HookId, NavigationGuard)>,
    pub(crate) after_each: Vec<(HookId, AfterHook)>,
}

impl Hooks {
    fn next_id(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }

    pub(crate) fn add_before_each(&mut self, guard: NavigationGuard) -> HookId {
        let id = self.next_id();
        self.before_each.push((id, guard));
        id
    }

    pub(crate) fn add_before_resolve(&mut self, guard: NavigationGuard) -> HookId {
        let id = self.next_id();
        self.before_resolve.push((id, guard));
        id
    }

    pub(crate) fn add_after_each(&mut self, hook: AfterHook) -> HookId {
        let id = self.next_id();
        self.after_each.push((id, hook));
        id
    }

    pub(crate) fn remove(&mut self, id: HookId) -> bool {
        let before = self.before_each.len() + self.before_resolve.len() + self.after_each.len();
        self.before_each.retain(|(hook, _)| *hook != id);
        self.before_resolve.retain(|(hook, _)| *hook != id);
        self.after_each.retain(|(hook, _)| *hook != id);
        before != self.before_each.len() + self.before_resolve.len() + self.after_each.len()
    }

    pub(crate) fn before_each(&self) -> Vec<NavigationGuard> {
        self.before_each.iter().map(|(_, g)| Arc::clone(g)).collect()
    }

    pub(crate) fn before_resolve(&self) -> Vec<NavigationGuard> {
        self.before_resolve.iter().map(|(_, g)| Arc::clone(g)).collect()
    }

    pub(crate) fn after_each(&self) -> Vec<AfterHook> {
        self.after_each.iter().map(|(_, h)| Arc::clone(h)).collect()
    }
}
