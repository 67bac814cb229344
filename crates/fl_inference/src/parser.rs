//! Recovery of structured data from free-form model output.
//!
//! Models asked for "JSON only" still wrap it in markdown fences or surround
//! it with prose. [`parse_or`] peels those layers off and, when nothing
//! decodes, hands back the caller's fallback instead of failing.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

lazy_static! {
    static ref FENCE: Regex =
        Regex::new(r"(?is)^```[a-z0-9_+-]*\s*|\s*```$").expect("fence pattern is valid");
    static ref OBJECT_SPAN: Regex = Regex::new(r"(?s)\{.*\}").expect("object pattern is valid");
}

/// Decodes `text` into `T`, or returns `fallback`.
///
/// Tried in order: the trimmed text with any code fence removed, then the
/// widest `{...}` span found in it.
pub fn parse_or<T: DeserializeOwned>(text: &str, fallback: T) -> T {
    if text.is_empty() {
        return fallback;
    }

    let cleaned = strip_fences(text.trim());
    if let Ok(value) = serde_json::from_str::<T>(&cleaned) {
        return value;
    }

    if let Some(span) = OBJECT_SPAN.find(&cleaned) {
        match serde_json::from_str::<T>(span.as_str()) {
            Ok(value) => return value,
            Err(e) => debug!("Embedded object did not decode: {}", e),
        }
    }

    debug!("Falling back to defaults for unparseable model output ({} bytes)", text.len());
    fallback
}

fn strip_fences(text: &str) -> String {
    if text.starts_with("```") {
        FENCE.replace_all(text, "").trim().to_string()
    } else {
        text.to_string()
    }
}
