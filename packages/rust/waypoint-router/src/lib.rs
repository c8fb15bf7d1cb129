//! Client-side routing for single-page applications.
//!
//! This crate maps addresses to nested route records, runs navigations
//! through an ordered pipeline of async guards, and keeps the browser
//! address (or an in-memory stack) in sync with the current route.
//!
//! # Architecture
//!
//! - [`route_map`] and [`matcher`]: compile route configurations into records
//!   and resolve locations into [`Route`]s, following redirects and aliases
//! - [`history`]: the navigation state machine and its backends
//! - [`platform`]: the address-bar abstraction the backends drive
//! - [`router`]: the composed [`Router`]
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_router::{guard_fn, Component, GuardOutcome, RouteConfig, Router, RouterOptions};
//!
//! # futures::executor::block_on(async {
//! let router = Router::new(
//!     RouterOptions::builder()
//!         .route(RouteConfig::new("/").component(Component::new("Home")))
//!         .route(
//!             RouteConfig::new("/admin")
//!                 .component(Component::new("Admin"))
//!                 .meta("requires_auth", true),
//!         )
//!         .route(RouteConfig::new("/login").component(Component::new("Login")))
//!         .build(),
//! );
//!
//! router.before_each(guard_fn(|to, _from| async move {
//!     if to.matched().iter().any(|record| record.meta().contains_key("requires_auth")) {
//!         GuardOutcome::Redirect("/login".into())
//!     } else {
//!         GuardOutcome::Continue
//!     }
//! }));
//!
//! router.push("/").await.unwrap();
//! assert!(router.push("/admin").await.is_err());
//! assert_eq!(router.current_route().path(), "/login");
//! # });
//! ```
//!
//! # History Modes
//!
//! - `Hash` (default): the route lives in the address fragment, `/#/users/7`
//! - `History`: the route is the address path below a base prefix; degrades
//!   to `Hash` without push-state support unless `fallback` is disabled
//! - `Abstract`: an in-memory stack, used automatically without a platform
//!
//! # Configuration
//!
//! - `WAYPOINT_HISTORY_MODE`: overrides the configured mode
//!   ("hash", "history" or "abstract")
//!
//! Diagnostics are emitted through `tracing` under the `waypoint_router`
//! target.

pub mod config;
pub mod constants;
pub mod error;
pub mod guard;
pub mod history;
pub mod location;
pub mod logger;
pub mod matcher;
pub mod mode;
pub mod params;
pub mod path;
pub mod platform;
pub mod query;
pub mod record;
pub mod route;
pub mod route_map;
pub mod router;

pub use config::{Component, LazyComponent, Meta, PropsRule, Redirect, RouteConfig, View};
pub use error::{BoxError, NavigationError, NavigationFailureType, RouterError};
pub use guard::{guard_fn, AfterHook, GuardOutcome, HookId, NavigationGuard};
pub use history::{HashHistory, History, HistoryBackend, MemoryHistory, PathHistory};
pub use location::{Location, RawLocation};
pub use matcher::Matcher;
pub use mode::HistoryMode;
pub use params::{Params, PathOptions};
pub use platform::{Platform, PlatformEvent, SimulatedBrowser};
pub use query::{DefaultQueryCodec, Query, QueryCodec, QueryValue};
pub use record::{RecordId, RouteRecord, ViewInstance};
pub use route::{Route, START};
pub use router::{Router, RouterOptions, RouterOptionsBuilder};

#[cfg(test)]
mod tests;
