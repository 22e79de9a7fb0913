//! Credential and proxy list loading

use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::fs;

/// Split a comma-separated flag value into trimmed, non-empty entries
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Load one entry per line from a wordlist file, skipping blank lines
pub async fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read wordlist {}", path.display()))?;

    let entries: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if entries.is_empty() {
        bail!("wordlist {} contains no entries", path.display());
    }
    Ok(entries)
}
