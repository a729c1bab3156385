//! Ignore-pattern filter applied to every path list before it reaches a
//! model prompt, the key deriver, or the selection logic.
//!
//! The built-in set covers dependency directories, VCS metadata, build
//! outputs, caches, logs, lockfiles, and editor metadata. Extra glob patterns
//! from configuration are added on top.

use filescope_core::files::FileMap;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::sync::LazyLock;

/// Directory names ignored at any depth, including the directory entry itself.
const IGNORED_DIRS: &[&str] = &[
    // dependencies
    "node_modules",
    "bower_components",
    "jspm_packages",
    "vendor",
    ".pnpm-store",
    ".yarn",
    ".venv",
    "venv",
    "__pycache__",
    // VCS
    ".git",
    ".hg",
    ".svn",
    // build outputs
    "dist",
    "build",
    "out",
    "target",
    ".next",
    ".nuxt",
    ".output",
    ".svelte-kit",
    ".vercel",
    "coverage",
    // caches
    ".cache",
    ".turbo",
    ".parcel-cache",
    ".vite",
    ".pytest_cache",
    ".mypy_cache",
    ".gradle",
    "tmp",
    "temp",
    // logs
    "logs",
    // editor metadata
    ".idea",
    ".vscode",
    ".history",
];

/// File globs ignored at any depth.
const IGNORED_FILES: &[&str] = &[
    // logs
    "*.log",
    "npm-debug.log*",
    "yarn-error.log*",
    // lockfiles
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "composer.lock",
    "*.lock",
    // editor metadata
    "*.swp",
    "*.swo",
    "*~",
    ".DS_Store",
    "Thumbs.db",
    // caches / compiled artefacts
    "*.pyc",
    "*.tsbuildinfo",
    ".eslintcache",
];

/// The built-in set, compiled once per process.
pub(crate) static DEFAULT_FILTER: LazyLock<IgnoreFilter> = LazyLock::new(IgnoreFilter::default);

/// Whether `path` is excluded by the built-in pattern set.
pub fn is_ignored(path: &str) -> bool {
    DEFAULT_FILTER.is_ignored(path)
}

/// A compiled ignore-pattern set.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    set: GlobSet,
}

impl IgnoreFilter {
    /// The built-in set plus `extra` glob patterns.
    pub fn new(extra: &[String]) -> Result<Self, globset::Error> {
        let mut builder = builtin_builder()?;
        for pattern in extra {
            builder.add(compile(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        let normalized = normalize(path);
        !normalized.is_empty() && self.set.is_match(normalized)
    }

    /// Non-ignored regular-file paths of a snapshot, in path order.
    ///
    /// These are the only paths a negotiator may include.
    pub fn selectable_paths(&self, files: &FileMap) -> Vec<String> {
        files
            .iter()
            .filter(|(path, entry)| entry.is_file() && !self.is_ignored(path))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        let set = builtin_builder()
            .and_then(|builder| builder.build())
            .unwrap_or_else(|_| GlobSet::empty());
        Self { set }
    }
}

fn builtin_builder() -> Result<GlobSetBuilder, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for dir in IGNORED_DIRS {
        builder.add(compile(&format!("**/{dir}"))?);
        builder.add(compile(&format!("**/{dir}/**"))?);
    }
    for file in IGNORED_FILES {
        builder.add(compile(&format!("**/{file}"))?);
    }
    Ok(builder)
}

fn compile(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Project-relative, forward-slash form of a path.
fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').to_string()
}
