use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

#[cfg(target_os = "macos")]
const OPENER: (&str, &[&str]) = ("open", &[]);

#[cfg(target_os = "windows")]
const OPENER: (&str, &[&str]) = ("cmd", &["/C", "start", ""]);

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const OPENER: (&str, &[&str]) = ("xdg-open", &[]);

/// Open a local HTML file with the platform's default handler.
pub fn open(path: &Path) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let (program, args) = OPENER;
    Command::new(program)
        .args(args)
        .arg(&path)
        .spawn()
        .with_context(|| format!("Failed to open {} with {program}", path.display()))?;
    Ok(())
}
