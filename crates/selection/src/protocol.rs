//! The negotiator's text contract: one delimited block of include/exclude
//! directives, parsed into a typed [`SelectionInstruction`].
//!
//! ```text
//! <context_selection>
//! include src/components/LoginForm.tsx
//! exclude src/legacy/old.ts
//! </context_selection>
//! ```
//!
//! Grammar (informal):
//! ```text
//! response  = text* block text*
//! block     = OPEN line* CLOSE
//! line      = BLANK | ["-" | "*"] directive
//! directive = ("include" | "exclude") WS path
//! path      = one project-relative path, optionally wrapped in quotes or backticks
//! ```
//!
//! Directive keywords are case-insensitive. Exactly one block must appear;
//! no block, an unterminated block, a second block, an unknown directive or
//! a directive without a path are all [`SelectionError::MalformedSelectionResponse`].

use filescope_core::error::SelectionError;
use serde::{Deserialize, Serialize};

pub const OPEN_MARKER: &str = "<context_selection>";
pub const CLOSE_MARKER: &str = "</context_selection>";

/// Parsed include/exclude sets, each deduplicated in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInstruction {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl SelectionInstruction {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Include,
    Exclude,
}

/// Parse a raw negotiator response.
pub fn parse_selection(response: &str) -> Result<SelectionInstruction, SelectionError> {
    let body = extract_block(response)?;
    let mut instruction = SelectionInstruction::default();

    for (index, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let (directive, path) = parse_line(line).ok_or_else(|| {
            SelectionError::MalformedSelectionResponse(format!(
                "unrecognised directive on line {} of the selection block: {line:?}",
                index + 1
            ))
        })?;

        let target = match directive {
            Directive::Include => &mut instruction.includes,
            Directive::Exclude => &mut instruction.excludes,
        };
        if !target.contains(&path) {
            target.push(path);
        }
    }

    Ok(instruction)
}

/// Render an instruction back into the wire form.
pub fn render_selection(instruction: &SelectionInstruction) -> String {
    let mut out = String::from(OPEN_MARKER);
    out.push('\n');
    for path in &instruction.includes {
        out.push_str(&format!("include {path}\n"));
    }
    for path in &instruction.excludes {
        out.push_str(&format!("exclude {path}\n"));
    }
    out.push_str(CLOSE_MARKER);
    out
}

fn extract_block(response: &str) -> Result<&str, SelectionError> {
    let Some(open) = response.find(OPEN_MARKER) else {
        return Err(SelectionError::MalformedSelectionResponse(format!(
            "response has no {OPEN_MARKER} block"
        )));
    };
    let start = open + OPEN_MARKER.len();
    let Some(close) = response[start..].find(CLOSE_MARKER) else {
        return Err(SelectionError::MalformedSelectionResponse(format!(
            "{OPEN_MARKER} block is not terminated by {CLOSE_MARKER}"
        )));
    };
    let body = &response[start..start + close];
    if body.contains(OPEN_MARKER) {
        return Err(SelectionError::MalformedSelectionResponse(
            "nested selection block".into(),
        ));
    }

    let rest = &response[start + close + CLOSE_MARKER.len()..];
    if rest.contains(OPEN_MARKER) || rest.contains(CLOSE_MARKER) {
        return Err(SelectionError::MalformedSelectionResponse(
            "response contains more than one selection block".into(),
        ));
    }

    Ok(body)
}

fn parse_line(line: &str) -> Option<(Directive, String)> {
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line)
        .trim_start();

    let (word, rest) = line.split_once(char::is_whitespace)?;
    let directive = match word.to_ascii_lowercase().as_str() {
        "include" => Directive::Include,
        "exclude" => Directive::Exclude,
        _ => return None,
    };

    let path = clean_path(rest);
    if path.is_empty() {
        return None;
    }
    Some((directive, path))
}

fn clean_path(raw: &str) -> String {
    let mut path = raw.trim();
    for quote in ['`', '"', '\''] {
        if path.len() >= 2 && path.starts_with(quote) && path.ends_with(quote) {
            path = &path[1..path.len() - 1];
        }
    }
    let mut path = path.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.to_string()
}
