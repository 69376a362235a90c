//! Key namespacing.
//!
//! Store prefixes are rooted and slash-terminated (`/user/`). Caller keys are
//! joined lexically, so `a//b/./c` and `a/b/c` name the same record.

use crate::constants::KEY_SEPARATOR;
use crate::Error;
use crate::Result;

/// Turns a configured prefix into `/` + cleaned prefix + `/`
pub fn normalize_prefix(prefix: &str) -> String {
    let cleaned = clean_path(prefix);
    if cleaned.ends_with(KEY_SEPARATOR) {
        cleaned
    } else {
        format!("{cleaned}{KEY_SEPARATOR}")
    }
}

/// Lexically cleans `path` as a rooted path.
///
/// Repeated separators collapse, `.` elements drop, `..` removes the element
/// before it and never climbs above the root. The result has no trailing
/// separator except for the root itself.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(KEY_SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    cleaned.push(KEY_SEPARATOR);
    cleaned.push_str(&parts.join("/"));
    cleaned
}

/// Full coordinator key for a caller `key` under `prefix`.
///
/// `prefix` must already be normalized.
pub fn join_key(
    prefix: &str,
    key: &str,
) -> Result<String> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty",
        });
    }

    let joined = clean_path(&format!("{prefix}{key}"));
    if !joined.starts_with(prefix) {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key escapes the store prefix",
        });
    }
    Ok(joined)
}

/// Coordinator prefix observed by a watch on `key`; empty means the whole store
pub fn watch_prefix(
    prefix: &str,
    key: &str,
) -> Result<String> {
    if key.is_empty() {
        return Ok(prefix.to_string());
    }
    join_key(prefix, key)
}

/// Whether `key` lies under a watch on `watched`.
///
/// A slash-terminated `watched` covers everything below it. Otherwise it
/// names a single key and covers that key plus its `/` children, never a
/// sibling that merely shares its leading characters (`/user/kauri2`).
pub fn watch_covers(
    watched: &str,
    key: &str,
) -> bool {
    match key.strip_prefix(watched) {
        Some(rest) => {
            watched.ends_with(KEY_SEPARATOR) || rest.is_empty() || rest.starts_with(KEY_SEPARATOR)
        }
        None => false,
    }
}
