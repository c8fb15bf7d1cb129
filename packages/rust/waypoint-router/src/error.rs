//! Error and navigation-failure types.
//!
//! Navigation outcomes come in two flavours. Control signals
//! ([`NavigationFailureType`]) tell the caller that a navigation did not
//! commit for an ordinary reason: the target was already current, a newer
//! navigation superseded it, or a guard redirected or rejected it. They never
//! reach the callbacks registered with `on_error`. Everything else is a real
//! error and is fanned out to those callbacks.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by guards, redirect functions and view factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of [`BoxError`] so errors can be handed to several callbacks.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// The benign abort categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationFailureType {
    Redirected,
    Aborted,
    Cancelled,
    Duplicated,
}

impl fmt::Display for NavigationFailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationFailureType::Redirected => write!(f, "redirected"),
            NavigationFailureType::Aborted => write!(f, "aborted"),
            NavigationFailureType::Cancelled => write!(f, "cancelled"),
            NavigationFailureType::Duplicated => write!(f, "duplicated"),
        }
    }
}

/// Errors raised while resolving a location into a route.
#[derive(Error, Debug, Clone)]
pub enum RouterError {
    #[error("redirect function for route \"{path}\" failed: {reason}")]
    RedirectFailed { path: String, reason: SharedError },
}

/// Why a path template could not be filled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FillError {
    #[error("Expected \"{0}\" to be defined")]
    MissingParam(String),

    #[error("Expected \"{name}\" to match \"{pattern}\", but received \"{value}\"")]
    PatternMismatch {
        name: String,
        pattern: String,
        value: String,
    },
}

/// Outcome of a navigation that did not commit.
#[derive(Error, Debug, Clone)]
pub enum NavigationError {
    #[error("Redirected when going from \"{from}\" to \"{to}\" via a navigation guard.")]
    Redirected { from: String, to: String },

    #[error("Navigation aborted from \"{from}\" to \"{to}\" via a navigation guard.")]
    Aborted { from: String, to: String },

    #[error("Navigation cancelled from \"{from}\" to \"{to}\" with a new navigation.")]
    Cancelled { from: String, to: String },

    #[error("Avoided redundant navigation to current location: \"{from}\".")]
    Duplicated { from: String, to: String },

    #[error("navigation guard failed: {0}")]
    Guard(SharedError),

    #[error("Failed to resolve async component {view}: {reason}")]
    AsyncComponent { view: String, reason: SharedError },

    #[error(transparent)]
    Match(#[from] RouterError),
}

impl NavigationError {
    /// The failure category for control signals, `None` for real errors.
    pub fn failure_type(&self) -> Option<NavigationFailureType> {
        match self {
            NavigationError::Redirected { .. } => Some(NavigationFailureType::Redirected),
            NavigationError::Aborted { .. } => Some(NavigationFailureType::Aborted),
            NavigationError::Cancelled { .. } => Some(NavigationFailureType::Cancelled),
            NavigationError::Duplicated { .. } => Some(NavigationFailureType::Duplicated),
            NavigationError::Guard(_)
            | NavigationError::AsyncComponent { .. }
            | NavigationError::Match(_) => None,
        }
    }

    /// Checks whether this is a navigation failure, optionally of a given type.
    pub fn is_navigation_failure(&self, kind: Option<NavigationFailureType>) -> bool {
        match (self.failure_type(), kind) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// True for errors that are reported to `on_error` callbacks.
    pub fn is_error(&self) -> bool {
        self.failure_type().is_none()
    }

    /// Full path of the route the navigation started from, for control signals.
    pub fn from_path(&self) -> Option<&str> {
        match self {
            NavigationError::Redirected { from, .. }
            | NavigationError::Aborted { from, .. }
            | NavigationError::Cancelled { from, .. }
            | NavigationError::Duplicated { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Full path of the navigation target, for control signals.
    pub fn to_path(&self) -> Option<&str> {
        match self {
            NavigationError::Redirected { to, .. }
            | NavigationError::Aborted { to, .. }
            | NavigationError::Cancelled { to, .. }
            | NavigationError::Duplicated { to, .. } => Some(to),
            _ => None,
        }
    }
}
