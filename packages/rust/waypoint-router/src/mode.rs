use crate::constants;
use crate::logger::Logger;

/// Module-specific logger
static LOGGER: Logger = Logger::const_new("mode");

use std::{env, fmt, str::FromStr};

/// Selects how the router keeps an address in sync with the current route.
///
/// # Modes
///
/// - `History`: the address is the platform path (plus query and fragment)
///   relative to the configured base. Requires push-state support, or
///   degrades to `Hash` when fallback is enabled.
/// - `Hash`: the address lives after the `#` delimiter. Works on platforms
///   without push-state support by assigning the fragment directly.
/// - `Abstract`: no address at all; an in-memory stack of routes plus a cursor.
///   Used automatically when no platform is supplied.
///
/// # Configuration
///
/// The mode can be configured in two ways:
///
/// 1. Using the `WAYPOINT_HISTORY_MODE` environment variable:
///    "history", "hash" or "abstract"
/// 2. Programmatically through `RouterOptions`
///
/// The environment variable takes precedence over programmatic configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    History,
    #[default]
    Hash,
    Abstract,
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryMode::History => write!(f, "history"),
            HistoryMode::Hash => write!(f, "hash"),
            HistoryMode::Abstract => write!(f, "abstract"),
        }
    }
}

impl FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "history" => Ok(HistoryMode::History),
            "hash" => Ok(HistoryMode::Hash),
            "abstract" => Ok(HistoryMode::Abstract),
            other => Err(format!("invalid history mode: {}", other)),
        }
    }
}

impl HistoryMode {
    /// Resolve the history mode from the environment or the provided configuration.
    ///
    /// If `WAYPOINT_HISTORY_MODE` is set to a valid value it takes precedence.
    /// Otherwise the provided mode is used, defaulting to `Hash`.
    pub fn resolve(config_mode: Option<HistoryMode>) -> Self {
        let result = match env::var(constants::env_vars::HISTORY_MODE) {
            Ok(value) => match value.parse::<HistoryMode>() {
                Ok(mode) => mode,
                Err(_) => {
                    LOGGER.warn(format!(
                        "HistoryMode.resolve: invalid history mode in env: {}, using config or default",
                        value
                    ));
                    config_mode.unwrap_or_default()
                }
            },
            Err(_) => config_mode.unwrap_or_default(),
        };

        LOGGER.debug(format!("HistoryMode.resolve: using {} mode", result));
        result
    }

    /// Applies the platform capability rules to a requested mode.
    ///
    /// `History` without push-state support becomes `Hash` when `fallback` is
    /// enabled, and any mode becomes `Abstract` without a platform.
    pub(crate) fn effective(self, has_platform: bool, supports_push_state: bool, fallback: bool) -> Self {
        if !has_platform {
            return HistoryMode::Abstract;
        }
        if self == HistoryMode::History && !supports_push_state && fallback {
            return HistoryMode::Hash;
        }
        self
    }
}
