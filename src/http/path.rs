//! Request path normalization
//!
//! Lexical cleaning of slash-separated paths and confinement of request
//! paths to a served root directory.

use std::path::{Path, PathBuf};

/// Return the shortest path equivalent to `path` by purely lexical processing
///
/// Rules, applied left to right:
/// 1. Repeated slashes collapse into one.
/// 2. `.` elements are dropped.
/// 3. A `..` element removes the preceding non-`..` element.
/// 4. A `..` directly after the root is dropped, `/..` is `/`.
///
/// An empty result is `.` for relative paths and `/` for rooted ones.
///
/// # Examples
/// ```
/// use upserve::http::path::clean;
/// assert_eq!(clean("/public/../secret.txt"), "/secret.txt");
/// assert_eq!(clean("/../../etc/passwd"), "/etc/passwd");
/// assert_eq!(clean("a//b/./c/.."), "a/b");
/// ```
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Map a request path onto a location under `root`
///
/// The request path is rooted and cleaned first, so `..` segments collapse
/// at the root and the result can never name anything above `root`.
pub fn join_under(root: &Path, request_path: &str) -> PathBuf {
    let cleaned = clean(&format!("/{request_path}"));
    let relative = cleaned.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}
