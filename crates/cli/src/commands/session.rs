//! `filescope session`: Interactive selection loop.
//!
//! One user message per stdin line. All turns share one cache store, one
//! sweeper and a running context buffer; the project is rescanned every turn
//! so edits on disk are picked up.

use crate::project;
use filescope_config::AppConfig;
use filescope_core::message::Message;
use filescope_selection::{ContextBuffer, SelectionRequest, spawn_sweeper};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// What one input line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Metrics,
    Buffer,
    Skip,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Skip,
        "/quit" | "/exit" | "exit" => Input::Quit,
        "/metrics" => Input::Metrics,
        "/buffer" => Input::Buffer,
        text => Input::Message(text),
    }
}

pub async fn run(config: &AppConfig, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::build_store(config);
    let engine = super::build_engine(config, store.clone())?;
    let sweeper = config
        .cache
        .sweep
        .then(|| spawn_sweeper(store.clone(), Duration::from_secs(config.cache.ttl_secs)));

    println!();
    println!("  filescope session");
    println!("  Project:   {}", root.display());
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.selection_model());
    println!();
    println!("  Type a message and press Enter. /metrics, /buffer, /quit.");
    println!();

    let mut conversation: Vec<Message> = Vec::new();
    let mut buffer = ContextBuffer::new(config.selection.max_files);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match classify(&line) {
            Input::Quit => break,
            Input::Skip => {}
            Input::Metrics => {
                println!("{}", serde_json::to_string_pretty(&engine.metrics().snapshot())?);
            }
            Input::Buffer => {
                for path in buffer.paths() {
                    println!("  {path}");
                }
            }
            Input::Message(text) => {
                conversation.push(Message::user(text));
                let files = project::scan(root, engine.ignore_filter())?;

                match engine
                    .select(SelectionRequest::new(&conversation, &files, &buffer))
                    .await
                {
                    Ok(outcome) => {
                        println!("  [{}]", super::select::describe(&outcome.source));
                        for path in outcome.buffer.paths() {
                            println!("  {path}");
                        }
                        buffer = outcome.buffer;
                    }
                    Err(e) => eprintln!("  [Error] {e}"),
                }
            }
        }
        prompt()?;
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
