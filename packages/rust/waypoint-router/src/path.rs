//! Path string helpers shared by the matcher and the history backends.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DUPLICATE_SLASHES: Regex = Regex::new(r"/(?:\s*/)+").unwrap();
}

/// A path split into its path, query and fragment parts.
///
/// `query` excludes the leading `?`; `hash` keeps its leading `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPath {
    pub path: String,
    pub query: String,
    pub hash: String,
}

/// Splits `path` into path, query and hash.
pub fn parse_path(path: &str) -> ParsedPath {
    let (rest, hash) = match path.find('#') {
        Some(index) => (&path[..index], &path[index..]),
        None => (path, ""),
    };
    let (path, query) = match rest.find('?') {
        Some(index) => (&rest[..index], &rest[index + 1..]),
        None => (rest, ""),
    };

    ParsedPath {
        path: path.to_string(),
        query: query.to_string(),
        hash: hash.to_string(),
    }
}

/// Resolves `relative` against `base`, honoring `.` and `..` segments.
///
/// Without `append` the last segment of `base` is replaced, like a relative
/// link in a document. With `append` the relative path is added below `base`.
pub fn resolve_path(relative: &str, base: &str, append: bool) -> String {
    if relative.starts_with('/') {
        return relative.to_string();
    }
    if relative.starts_with('?') || relative.starts_with('#') {
        return format!("{}{}", base, relative);
    }

    let mut stack: Vec<&str> = base.split('/').collect();
    if !append || stack.last().is_some_and(|last| last.is_empty()) {
        stack.pop();
    }

    let relative = relative.strip_prefix('/').unwrap_or(relative);
    for segment in relative.split('/') {
        match segment {
            ".." => {
                stack.pop();
            }
            "." => {}
            segment => stack.push(segment),
        }
    }

    if stack.first() != Some(&"") {
        stack.insert(0, "");
    }

    stack.join("/")
}

/// Collapses runs of slashes into one.
pub fn clean_path(path: &str) -> String {
    DUPLICATE_SLASHES.replace_all(path, "/").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        let parsed = parse_path("/user/7?tab=posts#top");
        assert_eq!(parsed.path, "/user/7");
        assert_eq!(parsed.query, "tab=posts");
        assert_eq!(parsed.hash, "#top");

        let parsed = parse_path("/a#frag?not-query");
        assert_eq!(parsed.path, "/a");
        assert_eq!(parsed.query, "");
        assert_eq!(parsed.hash, "#frag?not-query");
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/abs", "/a/b", false), "/abs");
        assert_eq!(resolve_path("c", "/a/b", false), "/a/c");
        assert_eq!(resolve_path("c", "/a/b", true), "/a/b/c");
        assert_eq!(resolve_path("c", "/a/b/", true), "/a/b/c");
        assert_eq!(resolve_path("../c", "/a/b", false), "/c");
        assert_eq!(resolve_path("./c", "/a/b", false), "/a/c");
        assert_eq!(resolve_path("?q=1", "/a", false), "/a?q=1");
        assert_eq!(resolve_path("#x", "/a", false), "/a#x");
        assert_eq!(resolve_path("c", "/", false), "/c");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/a//b///c"), "/a/b/c");
        assert_eq!(clean_path("/a/ /b"), "/a/b");
        assert_eq!(clean_path("/a/b"), "/a/b");
    }
}
