//! Path templates: compiling `/user/:id`-style templates into matchers and
//! filling them back with parameter values.
//!
//! # Template grammar
//!
//! - `:name` named segment, matching `[^/]+?` by default
//! - `:name(\\d+)` named segment with a custom pattern
//! - `(\\d+)` unnamed group, keyed by its position (`0`, `1`, ...)
//! - `*` asterisk, matching anything including `/`
//! - `?`, `*` and `+` modifiers for optional and repeated segments
//! - `\\x` escapes a character that would otherwise be special
//!
//! Compiled fillers are cached per template for the lifetime of the process.
//! The set of templates is bounded by the route configuration, so the cache
//! is not evicted.

use crate::constants::names;
use crate::error::FillError;
use crate::logger::Logger;
use crate::query::decode;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("params");

/// Route parameters, in capture order.
pub type Params = IndexMap<String, String>;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(concat!(
        r"(\\.)",
        r"|([/.])?(?:(?::([A-Za-z0-9_]+)(?:\(((?:\\.|[^\\()])+)\))?|\(((?:\\.|[^\\()])+)\))([+*?])?|(\*))",
    ))
    .unwrap();
    static ref GROUP_SPECIALS: Regex = Regex::new(r"([=!:$/()])").unwrap();
    static ref FILL_CACHE: Mutex<HashMap<String, Arc<PathTemplate>>> = Mutex::new(HashMap::new());
}

/// Options controlling how a template compiles into a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOptions {
    /// Match case-sensitively. Default `false`.
    pub sensitive: bool,
    /// A trailing slash is significant. Default `false`.
    pub strict: bool,
    /// The match must reach the end of the path. Default `true`.
    pub end: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// A dynamic segment of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    pub name: String,
    pub prefix: String,
    pub delimiter: String,
    pub optional: bool,
    pub repeat: bool,
    pub partial: bool,
    pub asterisk: bool,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Static(String),
    Key(PathKey),
}

fn parse(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut unnamed = 0usize;
    let mut index = 0;
    let mut path = String::new();

    for caps in TOKEN_PATTERN.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        path.push_str(&template[index..whole.start()]);
        index = whole.end();

        if let Some(escaped) = caps.get(1) {
            path.push_str(&escaped.as_str()[1..]);
            continue;
        }

        let next = template[index..].chars().next();
        let prefix = caps.get(2).map(|m| m.as_str());
        let name = caps.get(3).map(|m| m.as_str());
        let capture = caps.get(4).map(|m| m.as_str());
        let group = caps.get(5).map(|m| m.as_str());
        let modifier = caps.get(6).map(|m| m.as_str());
        let asterisk = caps.get(7).is_some();

        if !path.is_empty() {
            tokens.push(Token::Static(std::mem::take(&mut path)));
        }

        let partial = match (prefix, next) {
            (Some(prefix), Some(next)) => !prefix.starts_with(next),
            _ => false,
        };
        let delimiter = prefix.unwrap_or("/").to_string();
        let pattern = match capture.or(group) {
            Some(pattern) => GROUP_SPECIALS.replace_all(pattern, r"\$1").into_owned(),
            None if asterisk => ".*".to_string(),
            None => format!("[^{}]+?", regex::escape(&delimiter)),
        };
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                unnamed += 1;
                (unnamed - 1).to_string()
            }
        };

        tokens.push(Token::Key(PathKey {
            name,
            prefix: prefix.unwrap_or_default().to_string(),
            delimiter,
            optional: matches!(modifier, Some("?") | Some("*")),
            repeat: matches!(modifier, Some("+") | Some("*")),
            partial,
            asterisk,
            pattern,
        }));
    }

    if index < template.len() {
        path.push_str(&template[index..]);
    }
    if !path.is_empty() {
        tokens.push(Token::Static(path));
    }

    tokens
}

/// A compiled path matcher plus its ordered keys.
#[derive(Debug, Clone)]
pub struct RouteRegex {
    regex: Regex,
    keys: Vec<PathKey>,
}

impl RouteRegex {
    /// Compiles `template` into a matcher.
    ///
    /// Fails only when a custom segment pattern is not a valid expression.
    pub fn compile(template: &str, options: &PathOptions) -> Result<Self, regex::Error> {
        let tokens = parse(template);
        let mut keys = Vec::new();
        let mut route = String::new();

        for token in tokens {
            match token {
                Token::Static(text) => route.push_str(&regex::escape(&text)),
                Token::Key(key) => {
                    let prefix = regex::escape(&key.prefix);
                    let mut capture = format!("(?:{})", key.pattern);
                    if key.repeat {
                        capture = format!("{}(?:{}{})*", capture, prefix, capture);
                    }
                    let capture = if key.optional {
                        if key.partial {
                            format!("{}({})?", prefix, capture)
                        } else {
                            format!("(?:{}({}))?", prefix, capture)
                        }
                    } else {
                        format!("{}({})", prefix, capture)
                    };
                    route.push_str(&capture);
                    keys.push(key);
                }
            }
        }

        let delimiter = regex::escape("/");
        let ends_with_delimiter = route.ends_with(&delimiter);
        if !options.strict {
            if ends_with_delimiter {
                route.truncate(route.len() - delimiter.len());
            }
            route.push_str(&format!("(?:{})?", delimiter));
        }
        if options.end {
            route.push('$');
        } else if !(options.strict && ends_with_delimiter) {
            route.push_str(&format!("(?:{}|$)", delimiter));
        }

        let flags = if options.sensitive { "" } else { "(?i)" };
        let regex = Regex::new(&format!("{}^{}", flags, route))?;

        Ok(Self { regex, keys })
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Names of the keys a location must provide.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .filter(|key| !key.optional)
            .map(|key| key.name.as_str())
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches `path` and returns the decoded captures.
    ///
    /// The first unnamed key is reported as `pathMatch`. Optional keys that
    /// did not participate in the match are left out.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();

        for (i, key) in self.keys.iter().enumerate() {
            let Some(value) = caps.get(i + 1) else { continue };
            let name = if key.name == names::UNNAMED_KEY {
                names::PATH_MATCH_PARAM
            } else {
                key.name.as_str()
            };
            params.insert(name.to_string(), decode(value.as_str()));
        }

        Some(params)
    }
}

/// A template prepared for filling.
#[derive(Debug)]
pub struct PathTemplate {
    tokens: Vec<Token>,
    validators: Vec<Option<Regex>>,
}

impl PathTemplate {
    fn new(template: &str) -> Result<Self, regex::Error> {
        let tokens = parse(template);
        let validators = tokens
            .iter()
            .map(|token| match token {
                // Filling ignores case regardless of the route's sensitivity.
                Token::Key(key) => Regex::new(&format!("(?i)^(?:{})$", key.pattern)).map(Some),
                Token::Static(_) => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens, validators })
    }

    /// Builds a concrete path, looking values up through `lookup`.
    pub fn fill<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String, FillError> {
        let mut path = String::new();

        for (token, validator) in self.tokens.iter().zip(&self.validators) {
            let key = match token {
                Token::Static(text) => {
                    path.push_str(text);
                    continue;
                }
                Token::Key(key) => key,
            };

            let Some(value) = lookup(&key.name) else {
                if key.optional {
                    if key.partial {
                        path.push_str(&key.prefix);
                    }
                    continue;
                }
                return Err(FillError::MissingParam(key.name.clone()));
            };

            let segment = if key.asterisk {
                encode_asterisk(value)
            } else {
                encode_pretty(value)
            };
            if let Some(validator) = validator {
                if !validator.is_match(&segment) {
                    return Err(FillError::PatternMismatch {
                        name: key.name.clone(),
                        pattern: key.pattern.clone(),
                        value: segment,
                    });
                }
            }

            path.push_str(&key.prefix);
            path.push_str(&segment);
        }

        Ok(path)
    }
}

/// Returns the cached filler for `template`, compiling it on first use.
pub fn compile_template(template: &str) -> Result<Arc<PathTemplate>, regex::Error> {
    let mut cache = FILL_CACHE.lock();
    if let Some(compiled) = cache.get(template) {
        return Ok(Arc::clone(compiled));
    }
    let compiled = Arc::new(PathTemplate::new(template)?);
    cache.insert(template.to_string(), Arc::clone(&compiled));
    Ok(compiled)
}

/// Fills `template` with `params`.
///
/// A string `pathMatch` parameter stands in for the unnamed key `0`, which
/// is how asterisk routes are filled by name. On failure a warning naming
/// `context` is logged and an empty string returned.
pub fn fill_params(template: &str, params: &Params, context: &str) -> String {
    let path_match = params.get(names::PATH_MATCH_PARAM);
    let lookup = |name: &str| {
        if name == names::UNNAMED_KEY {
            if let Some(value) = path_match {
                return Some(value.as_str());
            }
        }
        params.get(name).map(String::as_str)
    };

    let result = compile_template(template)
        .map_err(|err| err.to_string())
        .and_then(|filler| filler.fill(lookup).map_err(|err| err.to_string()));

    match result {
        Ok(path) => path,
        Err(message) => {
            if path_match.is_none() {
                LOGGER.warn(format!("missing param for {}: {}", context, message));
            }
            String::new()
        }
    }
}

const URI_UNRESERVED: &[u8] = b"-_.!~*'();/?:@&=+$,#";

// encodeURI, then escape `/`, `?` and `#` as well.
fn encode_pretty(value: &str) -> String {
    encode_uri(value, b"/?#")
}

// encodeURI, then escape `?` and `#`; slashes stay literal.
fn encode_asterisk(value: &str) -> String {
    encode_uri(value, b"?#")
}

fn encode_uri(value: &str, extra: &[u8]) -> String {
    let mut out = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        let keep = byte.is_ascii_alphanumeric() || URI_UNRESERVED.contains(&byte);
        if keep && !extra.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
