use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

/// Reads the API key: the first non-empty line of the key file.
pub fn load_api_key(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read API key file '{}'. Set API_KEY_FILE to the file holding your key.",
            path.display()
        )
    })?;

    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("API key file '{}' is empty", path.display()))
}
