//! The browser surface the address-backed histories run on.
//!
//! [`Platform`] is the seam between the router and whatever owns the
//! address bar. [`SimulatedBrowser`] implements it in-process with an entry
//! list and a cursor, firing `popstate` on traversal and `hashchange` when
//! the fragment changes, which is enough to drive both address backends
//! headless.

use crate::logger::Logger;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use url::Url;

static LOGGER: Logger = Logger::const_new("platform");

/// Native notifications the histories subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformEvent {
    /// Session history traversal, including fragment navigations.
    PopState,
    /// The fragment of the address changed.
    HashChange,
}

impl fmt::Display for PlatformEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformEvent::PopState => write!(f, "popstate"),
            PlatformEvent::HashChange => write!(f, "hashchange"),
        }
    }
}

/// Handle returned by [`Platform::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type PlatformListener = Arc<dyn Fn(PlatformEvent) + Send + Sync>;

/// Address bar and session history operations.
///
/// URLs passed in may be absolute or relative to the current address.
pub trait Platform: Send + Sync {
    /// The full current address.
    fn href(&self) -> String;

    /// The `href` of the document's `<base>` element, if any.
    fn base_href(&self) -> Option<String> {
        None
    }

    /// Whether entries can be pushed and replaced without a page load.
    fn supports_push_state(&self) -> bool;

    fn push_state(&self, url: &str);

    fn replace_state(&self, url: &str);

    /// Navigates to `#hash`, creating a history entry.
    fn set_hash(&self, hash: &str);

    /// Replaces the current entry by navigating to `url`.
    fn replace_location(&self, url: &str);

    /// Traverses session history by `n` entries.
    fn go(&self, n: i32);

    fn add_listener(&self, event: PlatformEvent, listener: PlatformListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}

impl fmt::Debug for dyn Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("href", &self.href())
            .field("supports_push_state", &self.supports_push_state())
            .finish()
    }
}

struct BrowserState {
    entries: Vec<Url>,
    cursor: usize,
    listeners: Vec<(ListenerId, PlatformEvent, PlatformListener)>,
    next_listener: u64,
}

impl BrowserState {
    fn current(&self) -> &Url {
        &self.entries[self.cursor]
    }

    fn resolve(&self, url: &str) -> Option<Url> {
        match self.current().join(url) {
            Ok(url) => Some(url),
            Err(err) => {
                LOGGER.warn(format!("ignoring unparsable url \"{}\": {}", url, err));
                None
            }
        }
    }

    fn push(&mut self, url: Url) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(url);
        self.cursor = self.entries.len() - 1;
    }

    fn listeners_for(&self, events: &[PlatformEvent]) -> Vec<(PlatformEvent, PlatformListener)> {
        events
            .iter()
            .flat_map(|event| {
                self.listeners
                    .iter()
                    .filter(move |(_, kind, _)| kind == event)
                    .map(move |(_, _, listener)| (*event, Arc::clone(listener)))
            })
            .collect()
    }
}

/// An in-process browser: session history entries, a cursor and listeners.
///
/// # Examples
///
/// ```
/// use waypoint_router::{Platform, SimulatedBrowser};
///
/// let browser = SimulatedBrowser::new("https://example.com/app/").unwrap();
/// browser.push_state("/app/users");
/// assert_eq!(browser.href(), "https://example.com/app/users");
/// ```
pub struct SimulatedBrowser {
    state: Mutex<BrowserState>,
    push_state: bool,
    base_href: Option<String>,
}

impl SimulatedBrowser {
    pub fn new(href: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(href)?;
        Ok(Self {
            state: Mutex::new(BrowserState {
                entries: vec![url],
                cursor: 0,
                listeners: Vec::new(),
                next_listener: 0,
            }),
            push_state: true,
            base_href: None,
        })
    }

    /// Simulates an engine without the history-entry API.
    pub fn with_push_state_support(mut self, supported: bool) -> Self {
        self.push_state = supported;
        self
    }

    /// Simulates a `<base href>` element.
    pub fn with_base_href(mut self, href: impl Into<String>) -> Self {
        self.base_href = Some(href.into());
        self
    }

    /// Every entry of the session history, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|url| url.to_string())
            .collect()
    }

    /// Index of the current entry.
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn dispatch(&self, listeners: Vec<(PlatformEvent, PlatformListener)>) {
        for (event, listener) in listeners {
            LOGGER.debug(format!("dispatching {}", event));
            listener(event);
        }
    }
}

impl Platform for SimulatedBrowser {
    fn href(&self) -> String {
        self.state.lock().current().to_string()
    }

    fn base_href(&self) -> Option<String> {
        self.base_href.clone()
    }

    fn supports_push_state(&self) -> bool {
        self.push_state
    }

    fn push_state(&self, url: &str) {
        let mut state = self.state.lock();
        if let Some(url) = state.resolve(url) {
            state.push(url);
        }
    }

    fn replace_state(&self, url: &str) {
        let mut state = self.state.lock();
        if let Some(url) = state.resolve(url) {
            let cursor = state.cursor;
            state.entries[cursor] = url;
        }
    }

    fn set_hash(&self, hash: &str) {
        let listeners = {
            let mut state = self.state.lock();
            let mut url = state.current().clone();
            url.set_fragment(Some(hash.strip_prefix('#').unwrap_or(hash)));
            if url == *state.current() {
                return;
            }
            state.push(url);
            state.listeners_for(&[PlatformEvent::PopState, PlatformEvent::HashChange])
        };
        self.dispatch(listeners);
    }

    fn replace_location(&self, url: &str) {
        let listeners = {
            let mut state = self.state.lock();
            let Some(url) = state.resolve(url) else { return };
            let previous = state.current().clone();
            let cursor = state.cursor;
            state.entries[cursor] = url.clone();
            if fragment_navigation(&previous, &url) {
                state.listeners_for(&[PlatformEvent::PopState, PlatformEvent::HashChange])
            } else {
                Vec::new()
            }
        };
        self.dispatch(listeners);
    }

    fn go(&self, n: i32) {
        let listeners = {
            let mut state = self.state.lock();
            let target = state.cursor as i64 + i64::from(n);
            if n == 0 || target < 0 || target >= state.entries.len() as i64 {
                return;
            }
            let previous = state.current().clone();
            state.cursor = target as usize;
            if previous.fragment() != state.current().fragment() {
                state.listeners_for(&[PlatformEvent::PopState, PlatformEvent::HashChange])
            } else {
                state.listeners_for(&[PlatformEvent::PopState])
            }
        };
        self.dispatch(listeners);
    }

    fn add_listener(&self, event: PlatformEvent, listener: PlatformListener) -> ListenerId {
        let mut state = self.state.lock();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, event, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|(listener, _, _)| *listener != id);
    }
}

impl fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedBrowser")
            .field("href", &state.current().as_str())
            .field("cursor", &state.cursor)
            .field("entries", &state.entries.len())
            .field("push_state", &self.push_state)
            .finish()
    }
}

/// True when `next` differs from `previous` only in a changed fragment.
fn fragment_navigation(previous: &Url, next: &Url) -> bool {
    let mut a = previous.clone();
    let mut b = next.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b && previous.fragment() != next.fragment()
}
