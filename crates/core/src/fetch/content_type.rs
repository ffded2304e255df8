//! Extension-based content-type correction.
//!
//! The object store classifies by heuristics: `.ts` comes back as MPEG
//! transport stream, `.tsx`/`.jsx` as nothing useful at all.

use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderValue};

/// (extension, keyword the existing type must contain, replacement media type)
const SCRIPT_TYPES: [(&str, &str, &str); 6] = [
    (".tsx", "typescript", "application/typescript"),
    (".jsx", "javascript", "application/javascript"),
    (".mts", "typescript", "application/typescript"),
    (".ts", "typescript", "application/typescript"),
    (".mjs", "javascript", "application/javascript"),
    (".js", "javascript", "application/javascript"),
];

/// Content type to use instead of `current`, or `None` when it is fine as is.
pub fn corrected_content_type(path: &str, current: Option<&str>) -> Option<String> {
    let (_, keyword, media) = SCRIPT_TYPES
        .iter()
        .find(|(ext, _, _)| path.ends_with(ext))?;

    match current {
        Some(current) if current.to_ascii_lowercase().contains(keyword) => None,
        _ => Some(format!("{media}; charset=utf-8")),
    }
}

pub fn correct_content_type(path: &str, headers: &mut HeaderMap) {
    let current = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if let Some(fixed) = corrected_content_type(path, current) {
        if let Ok(value) = HeaderValue::from_str(&fixed) {
            headers.insert(CONTENT_TYPE, value);
        }
    }
}
