//! Browser vs. tooling content negotiation.

use crate::outcome::{Cacheability, Outcome};
use modproxy_api::{LineFragment, ModuleIdentifier};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::ControlFlow;

static LINE_FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*):(\d+):(\d+)$").unwrap());

/// `true` only when an `Accept` header is present and lists `text/html`
/// with a non-zero quality.
///
/// A missing header means a tooling client that wants raw source.
pub fn wants_html(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    accept.split(',').any(|range| {
        let mut parts = range.split(';').map(str::trim);
        let is_html = parts
            .next()
            .is_some_and(|media| media.eq_ignore_ascii_case("text/html"));
        is_html && !parts.any(refuses)
    })
}

/// `q=0` marks a media range as not acceptable.
fn refuses(param: &str) -> bool {
    match param.split_once('=') {
        Some((name, value)) if name.trim().eq_ignore_ascii_case("q") => {
            value.trim().parse::<f32>().is_ok_and(|q| q <= 0.0)
        }
        _ => false,
    }
}

/// Split a trailing `:<line>:<col>` off `path`. Both groups must be digits.
pub fn parse_line_fragment(path: &str) -> Option<LineFragment> {
    let caps = LINE_FRAGMENT.captures(path)?;
    let line = caps.get(2)?.as_str().parse().ok()?;
    Some(LineFragment {
        rest: caps.get(1)?.as_str().to_string(),
        line,
    })
}

/// Stop with a redirect for browsers, continue for tooling clients.
pub fn negotiate(
    id: &ModuleIdentifier,
    accept: Option<&str>,
    docs_base_url: &str,
) -> ControlFlow<Outcome> {
    if !wants_html(accept) {
        return ControlFlow::Continue(());
    }

    let public_path = id.public_path();
    let location = match parse_line_fragment(&public_path) {
        Some(fragment) => fragment.anchor(),
        None => format!("{}{}", docs_base_url.trim_end_matches('/'), public_path),
    };
    ControlFlow::Break(Outcome::found(location).with_cache(Cacheability::Revalidate))
}
