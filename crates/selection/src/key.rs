//! Cache key derivation.
//!
//! A key combines the "message essence" of the last user message (routing
//! tags stripped, whitespace collapsed) with a 32-bit hash of the sorted
//! non-ignored file-path list. Identical requests against the same file set
//! always produce identical keys, whatever order the snapshot was built in.

use crate::ignore_filter::{DEFAULT_FILTER, IgnoreFilter};
use filescope_core::files::FileMap;
use filescope_core::message::MessageContent;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `[Model: X]` / `[Provider: Y]` routing tags embedded by the chat client.
static ROUTING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:model|provider)\s*:[^\]]*\]").expect("routing tag pattern is valid")
});

/// Opaque, deterministic fingerprint of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remove provider/model routing tags, keeping the rest of the text intact.
pub fn strip_routing_tags(text: &str) -> String {
    ROUTING_TAG.replace_all(text, " ").trim().to_string()
}

/// Routing-tag-free text with all whitespace runs collapsed to one space.
pub fn message_essence(content: &MessageContent) -> String {
    strip_routing_tags(&content.text())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order-independent 32-bit rolling hash over a set of paths.
pub fn path_set_hash<'a>(paths: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut sorted: Vec<&str> = paths.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    sorted.iter().fold(0u32, |hash, path| {
        path.bytes()
            .chain(std::iter::once(b'\n'))
            .fold(hash, |h, byte| h.wrapping_mul(31).wrapping_add(u32::from(byte)))
    })
}

/// Key for `message` against `files`, using the built-in ignore set.
pub fn derive_key(message: &MessageContent, files: &FileMap) -> CacheKey {
    derive_key_with(message, files, &DEFAULT_FILTER)
}

/// Key for `message` against `files`, hashing only paths `filter` keeps.
pub fn derive_key_with(message: &MessageContent, files: &FileMap, filter: &IgnoreFilter) -> CacheKey {
    let essence = message_essence(message);
    let hash = path_set_hash(
        files
            .keys()
            .map(String::as_str)
            .filter(|path| !filter.is_ignored(path)),
    );
    CacheKey(format!("{hash:08x}:{essence}"))
}
