//! The context buffer: the bounded, ordered set of files currently in scope.
//!
//! Paths are kept in inclusion order, oldest first. Including a path that is
//! already buffered is a no-op (set semantics, no reordering). When the
//! buffer grows past its capacity the least-recently-included paths are
//! dropped first. Capacity is clamped to `1..=MAX_CAPACITY` however the
//! buffer is built, deserialization included.

use crate::protocol::SelectionInstruction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest capacity a buffer can have.
pub const MAX_CAPACITY: usize = filescope_config::MAX_CONTEXT_FILES;

/// Default buffer bound.
pub const DEFAULT_CAPACITY: usize = MAX_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBuffer")]
pub struct ContextBuffer {
    paths: Vec<String>,
    capacity: usize,
}

/// Unchecked wire form, normalized through [`ContextBuffer::from_paths`].
#[derive(Deserialize)]
struct RawBuffer {
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl From<RawBuffer> for ContextBuffer {
    fn from(raw: RawBuffer) -> Self {
        Self::from_paths(raw.paths, raw.capacity)
    }
}

/// What applying an instruction changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Paths dropped by capacity truncation.
    pub truncated: Vec<String>,
}

impl ContextBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            paths: Vec::new(),
            capacity: capacity.clamp(1, MAX_CAPACITY),
        }
    }

    /// Build a buffer from paths in inclusion order, keeping the most recent
    /// `capacity` distinct ones.
    pub fn from_paths<I, S>(paths: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buffer = Self::new(capacity);
        for path in paths {
            buffer.include(path);
        }
        buffer
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Add `path` unless already present. Returns the paths dropped to stay
    /// within capacity.
    pub fn include(&mut self, path: impl Into<String>) -> Vec<String> {
        let path = path.into();
        if !self.contains(&path) {
            self.paths.push(path);
        }
        self.truncate()
    }

    /// Remove `path` if present.
    pub fn exclude(&mut self, path: &str) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() < before
    }

    /// Apply `buffer ∪ includes − excludes`, then truncate to capacity.
    pub fn apply(&mut self, instruction: &SelectionInstruction) -> ApplyReport {
        let mut report = ApplyReport::default();
        let excluded: HashSet<&str> = instruction.excludes.iter().map(String::as_str).collect();

        for path in &instruction.excludes {
            if self.exclude(path) {
                report.removed.push(path.clone());
            }
        }

        for path in &instruction.includes {
            if excluded.contains(path.as_str()) || self.contains(path) {
                continue;
            }
            self.paths.push(path.clone());
            report.added.push(path.clone());
        }

        report.truncated = self.truncate();
        report
    }

    /// Drop paths not accepted by `keep`; returns what was dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let (kept, dropped): (Vec<String>, Vec<String>) =
            self.paths.drain(..).partition(|p| keep(p));
        self.paths = kept;
        dropped
    }

    fn truncate(&mut self) -> Vec<String> {
        if self.paths.len() <= self.capacity {
            return Vec::new();
        }
        let overflow = self.paths.len() - self.capacity;
        self.paths.drain(..overflow).collect()
    }
}

impl Default for ContextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
