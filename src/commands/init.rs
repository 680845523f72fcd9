use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::{CONFIG_FILE, Config};

/// Writes a default `gamegen.toml` into `dir`. Returns `false` when one is
/// already there.
pub fn run(dir: &Path) -> Result<bool> {
    let path = dir.join(CONFIG_FILE);

    if path.exists() {
        return Ok(false);
    }

    let content = Config::default().to_toml()?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
