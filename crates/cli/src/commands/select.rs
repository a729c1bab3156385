//! `filescope select`: Run one context-selection turn over a project.

use crate::project;
use filescope_config::AppConfig;
use filescope_core::message::Message;
use filescope_selection::{ContextBuffer, SelectionOutcome, SelectionRequest, SelectionSource};
use filescope_telemetry::MetricsSnapshot;
use std::path::PathBuf;

pub struct SelectArgs {
    pub root: PathBuf,
    pub message: String,
    pub summary: Option<String>,
    pub buffer: Vec<String>,
    pub json: bool,
}

pub async fn run(config: &AppConfig, args: SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::build_store(config);
    let engine = super::build_engine(config, store)?;
    let files = project::scan(&args.root, engine.ignore_filter())?;

    let messages = vec![Message::user(args.message.as_str())];
    let buffer = ContextBuffer::from_paths(args.buffer, config.selection.max_files);
    let mut request = SelectionRequest::new(&messages, &files, &buffer);
    if let Some(summary) = args.summary.as_deref() {
        request = request.with_summary(summary);
    }

    let outcome = engine.select(request).await?;

    if args.json {
        let report = render_json(&outcome, &engine.metrics().snapshot());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in outcome.buffer.paths() {
            println!("{path}");
        }
        eprintln!("{}", describe(&outcome.source));
    }
    Ok(())
}

/// One-line human description of where a selection came from.
pub fn describe(source: &SelectionSource) -> String {
    match source {
        SelectionSource::CacheHit => "cache hit".to_string(),
        SelectionSource::SimilarHit { matched_key } => format!("similar to cached request {matched_key}"),
        SelectionSource::Negotiated {
            tokens_used,
            latency_ms,
        } => format!("negotiated in {latency_ms} ms using {tokens_used} tokens"),
    }
}

pub fn render_json(outcome: &SelectionOutcome, metrics: &MetricsSnapshot) -> serde_json::Value {
    serde_json::json!({
        "key": outcome.key,
        "selection": outcome.source,
        "files": outcome.buffer.paths(),
        "metrics": metrics,
    })
}
