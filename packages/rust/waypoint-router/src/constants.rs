//! Constants for the waypoint-router package.
//!
//! This file centralizes all constants to ensure consistency across the codebase
//! and provide a single source of truth for configuration parameters.

/// Environment variable names for configuration.
pub mod env_vars {
    /// History mode override (history, hash or abstract).
    ///
    /// Takes precedence over the mode passed in `RouterOptions`.
    pub const HISTORY_MODE: &str = "WAYPOINT_HISTORY_MODE";
}

/// Default values for configuration parameters.
pub mod defaults {
    /// Default history mode when none is configured.
    pub const HISTORY_MODE: &str = "hash";

    /// Whether `history` mode degrades to `hash` mode when the platform
    /// cannot mutate history entries.
    pub const FALLBACK: bool = true;

    /// Base path used when neither the options nor the platform provide one.
    pub const BASE: &str = "/";
}

/// Well-known route and parameter names.
pub mod names {
    /// Path that matches everything; always sorted last in the path list.
    pub const WILDCARD_PATH: &str = "*";

    /// Parameter name exposed for the first unnamed capture (the asterisk).
    pub const PATH_MATCH_PARAM: &str = "pathMatch";

    /// Key name path templates assign to the first unnamed capture.
    pub const UNNAMED_KEY: &str = "0";

    /// View slot used when a route declares a single component.
    pub const DEFAULT_VIEW: &str = "default";
}
