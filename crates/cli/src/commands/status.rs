//! `filescope status`: Show effective configuration.

use filescope_config::AppConfig;
use std::path::Path;

pub fn run(config: &AppConfig, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    println!("filescope status");
    println!("================");
    println!("  Config file:   {}", path.display());
    println!("  Provider:      {}", config.default_provider);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Models:");
    println!("    selection:   {}", config.selection_model());
    println!("    arbiter:     {}", config.arbiter_model());
    println!("    summarizer:  {}", config.summarizer_model());
    println!("  Cache:");
    println!("    ttl:         {}s", config.cache.ttl_secs);
    println!("    soft cap:    {} entries", config.cache.soft_cap);
    println!("    candidates:  {}", config.cache.similarity_candidates);
    println!("    sweep:       {}", if config.cache.sweep { "enabled" } else { "disabled" });
    println!("  Selection:");
    println!("    max files:   {}", config.selection.max_files);
    println!("    timeout:     {}s", config.selection.timeout_secs);
    println!(
        "    ignore:      {} extra pattern(s)",
        config.selection.extra_ignore_patterns.len()
    );
    println!("  Arbiter:       {}", if config.arbiter.enabled { "enabled" } else { "disabled" });
    println!("  Log:           {}{}", config.log.level, if config.log.json { " (json)" } else { "" });

    if path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults. Run `filescope init` to create one.");
    }

    Ok(())
}
