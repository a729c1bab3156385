//! Subcommand implementations and the wiring they share.

pub mod init;
pub mod scan;
pub mod select;
pub mod session;
pub mod status;

use filescope_config::AppConfig;
use filescope_selection::{
    CacheStore, ContextEngine, EngineSettings, IgnoreFilter, ProviderModel, SystemClock,
};
use filescope_telemetry::CacheMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Built-in ignore set plus the configured extra patterns.
pub fn ignore_filter(config: &AppConfig) -> Result<IgnoreFilter, Box<dyn std::error::Error>> {
    IgnoreFilter::new(&config.selection.extra_ignore_patterns)
        .map_err(|e| format!("Invalid ignore pattern in config: {e}").into())
}

/// A cache store configured from `[cache]`.
pub fn build_store(config: &AppConfig) -> Arc<CacheStore> {
    Arc::new(CacheStore::new(
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.soft_cap,
        Arc::new(SystemClock),
        Arc::new(CacheMetrics::new()),
    ))
}

/// Provider-backed engine over `store`.
pub fn build_engine(
    config: &AppConfig,
    store: Arc<CacheStore>,
) -> Result<ContextEngine, Box<dyn std::error::Error>> {
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    FILESCOPE_API_KEY   (generic)");
        eprintln!("    OPENROUTER_API_KEY  (recommended)");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = filescope_providers::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let model = Arc::new(ProviderModel::from_config(provider, config));

    Ok(ContextEngine::new(model, store, EngineSettings::from_config(config))
        .with_ignore_filter(ignore_filter(config)?))
}
