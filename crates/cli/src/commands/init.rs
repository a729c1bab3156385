//! `filescope init`: Write a default config file.

use filescope_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if write_default(&path)? {
        println!("Created {}", path.display());
        println!("Add an API key there or set FILESCOPE_API_KEY, then run `filescope select`.");
    } else {
        println!("Config already exists at {}; left untouched.", path.display());
    }
    Ok(())
}

/// Write the default config unless `path` exists. Returns whether it wrote.
fn write_default(path: &Path) -> Result<bool, std::io::Error> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        assert!(!write_default(&path).unwrap());

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.selection.max_files, 5);
        assert_eq!(config.cache.ttl_secs, 1800);
    }
}
