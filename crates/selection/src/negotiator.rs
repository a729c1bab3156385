//! Context negotiation: ask a model for include/exclude directives against the
//! known path list and apply them to the context buffer.
//!
//! The protocol is linear and single-shot. A provider failure surfaces as
//! `ProviderUnavailable`, a response without a well-formed block as
//! `MalformedSelectionResponse`, and an include of a path outside the known
//! set as `UnknownFileReference`. Nothing is retried or patched here.

use crate::buffer::{ContextBuffer, MAX_CAPACITY};
use crate::protocol::{CLOSE_MARKER, OPEN_MARKER, SelectionInstruction, parse_selection};
use filescope_core::error::{ProviderError, SelectionError};
use filescope_core::files::FileMap;
use filescope_core::model::{ContextModel, Prompt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one successful negotiation.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Buffer after the instruction was applied and truncated.
    pub buffer: ContextBuffer,
    /// The buffered paths with content from the snapshot.
    pub files: FileMap,
    /// The instruction as parsed.
    pub instruction: SelectionInstruction,
    pub tokens_used: u32,
}

pub struct ContextNegotiator {
    model: Arc<dyn ContextModel>,
    timeout: Option<Duration>,
    max_files: usize,
}

impl ContextNegotiator {
    pub fn new(model: Arc<dyn ContextModel>, max_files: usize) -> Self {
        Self {
            model,
            timeout: None,
            max_files: max_files.clamp(1, MAX_CAPACITY),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one negotiation round.
    ///
    /// `known_paths` must already be ignore-filtered; it is the complete set
    /// of paths the model is allowed to include. `current` is the buffer
    /// before this turn and must only hold paths present in `files`.
    pub async fn select_files(
        &self,
        summary: &str,
        last_user_message: &str,
        files: &FileMap,
        known_paths: &[String],
        current: &ContextBuffer,
    ) -> Result<Negotiation, SelectionError> {
        let prompt = build_prompt(
            summary,
            last_user_message,
            known_paths,
            current,
            files,
            self.max_files,
        );

        let completion = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.model.select_files(&prompt))
                .await
                .map_err(|_| {
                    ProviderError::Timeout(format!(
                        "context negotiation exceeded {}s",
                        limit.as_secs_f32()
                    ))
                })??,
            None => self.model.select_files(&prompt).await?,
        };

        let instruction = parse_selection(&completion.text)?;
        validate(&instruction, known_paths)?;

        let mut buffer = ContextBuffer::from_paths(current.paths().iter().cloned(), self.max_files);
        let report = buffer.apply(&instruction);
        if !report.truncated.is_empty() {
            debug!(
                dropped = ?report.truncated,
                max_files = self.max_files,
                "Selection exceeded the file budget, least recently included paths dropped"
            );
        }

        let selected = materialize(&buffer, files);
        debug!(
            added = report.added.len(),
            removed = report.removed.len(),
            selected = selected.len(),
            tokens_used = completion.tokens_used,
            "Context negotiation applied"
        );

        Ok(Negotiation {
            buffer,
            files: selected,
            instruction,
            tokens_used: completion.tokens_used,
        })
    }
}

/// Copy the buffered paths out of the authoritative snapshot.
pub(crate) fn materialize(buffer: &ContextBuffer, files: &FileMap) -> FileMap {
    buffer
        .paths()
        .iter()
        .filter_map(|path| match files.get(path) {
            Some(entry) => Some((path.clone(), entry.clone())),
            None => {
                warn!(path = %path, "Buffered path missing from snapshot, skipped");
                None
            }
        })
        .collect()
}

fn validate(instruction: &SelectionInstruction, known_paths: &[String]) -> Result<(), SelectionError> {
    let known: HashSet<&str> = known_paths.iter().map(String::as_str).collect();
    match instruction.includes.iter().find(|path| !known.contains(path.as_str())) {
        Some(path) => Err(SelectionError::UnknownFileReference { path: path.clone() }),
        None => Ok(()),
    }
}

/// Render the negotiation prompt.
///
/// The system part carries the protocol, every known path and the content of
/// each buffered file; the user part restates the summary and the literal
/// last user message.
pub fn build_prompt(
    summary: &str,
    last_user_message: &str,
    known_paths: &[String],
    current: &ContextBuffer,
    files: &FileMap,
    max_files: usize,
) -> Prompt {
    let mut system = format!(
        "You choose which project files a coding assistant needs in its context to answer the \
developer's next message. At most {max_files} files may be in context at once.\n\n\
Respond with exactly one block in this form and nothing inside it except directives:\n\
{OPEN_MARKER}\n\
include path/to/needed_file\n\
exclude path/to/no_longer_needed_file\n\
{CLOSE_MARKER}\n\n\
Rules:\n\
- One directive per line, one path per directive.\n\
- Only include paths from the project file list below, spelled exactly as listed.\n\
- Files already in context stay there unless you exclude them; do not include them again.\n\
- Exclude files that are no longer relevant so the total stays within {max_files}.\n\
- An empty block means the current context is already right.\n\n"
    );

    system.push_str("Project files:\n");
    for path in known_paths {
        system.push_str(path);
        system.push('\n');
    }

    system.push_str("\nFiles currently in context:\n");
    if current.is_empty() {
        system.push_str("(none)\n");
    }
    for path in current.paths() {
        let content = files.get(path).map(|entry| entry.content.as_str()).unwrap_or_default();
        system.push_str(&format!("--- {path} ---\n{content}\n"));
    }

    let summary = if summary.trim().is_empty() {
        "(no summary yet)"
    } else {
        summary.trim()
    };
    let user = format!(
        "Conversation so far:\n{summary}\n\nThe developer's latest message:\n{last_user_message}"
    );

    Prompt::new(system, user)
}
