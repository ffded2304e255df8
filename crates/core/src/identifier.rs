//! Request path -> [`ModuleIdentifier`].
//!
//! `/std...` is rewritten to `/x/std...` before parsing so every later stage
//! is namespace-agnostic.

use modproxy_api::{ModuleIdentifier, Namespace};

/// Parse a registry request path.
///
/// Returns `None` for anything that is not a well-formed registry path; such
/// requests are left to the website.
pub fn parse_identifier(path: &str) -> Option<ModuleIdentifier> {
    if let Some(tail) = path.strip_prefix("/std") {
        if !(tail.is_empty() || tail.starts_with('@') || tail.starts_with('/')) {
            return None;
        }
        return parse_module_segment(&format!("std{tail}"));
    }

    parse_module_segment(path.strip_prefix("/x/")?)
}

/// `rest` is `name[@version][/path]`.
fn parse_module_segment(rest: &str) -> Option<ModuleIdentifier> {
    let (segment, tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    // Split on the first '@' only
    let (name, version) = match segment.split_once('@') {
        Some((name, version)) => {
            if version.is_empty() {
                return None;
            }
            (name, Some(version.to_string()))
        }
        None => (segment, None),
    };

    if name.is_empty() {
        return None;
    }

    let namespace = if name == "std" {
        Namespace::Std
    } else {
        Namespace::X
    };

    Some(ModuleIdentifier {
        namespace,
        name: name.to_string(),
        version,
        path: tail.trim_start_matches('/').to_string(),
    })
}
