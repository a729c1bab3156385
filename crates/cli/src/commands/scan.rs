//! `filescope scan`: List the files a model may be shown.

use crate::project;
use filescope_config::AppConfig;
use std::path::Path;

pub fn run(config: &AppConfig, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let filter = super::ignore_filter(config)?;
    let files = project::scan(root, &filter)?;
    let selectable = filter.selectable_paths(&files);

    for path in &selectable {
        println!("{path}");
    }
    eprintln!(
        "{} selectable files ({} entries scanned) under {}",
        selectable.len(),
        files.len(),
        root.display()
    );
    Ok(())
}
