use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::record::OutputSchema;

const DEFAULT_SCHEMA_NAME: &str = "response";

pub const SCHEMA_TEMPLATE: &str = r#"{
  "type": "object",
  "properties": {
    "answer": {
      "type": "string",
      "description": "The direct answer to the question."
    },
    "confidence": {
      "type": "string",
      "enum": ["low", "medium", "high"]
    },
    "sources": {
      "type": "array",
      "items": { "type": "string" }
    }
  },
  "required": ["answer", "confidence", "sources"],
  "additionalProperties": false
}
"#;

/// Service-side schema names allow only letters, digits, `_` and `-`.
fn schema_name(path: &Path) -> String {
    let name: String = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() {
        DEFAULT_SCHEMA_NAME.to_string()
    } else {
        name
    }
}

/// Reads a JSON Schema file for structured output.
pub fn load(path: &Path) -> Result<OutputSchema> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file '{}'", path.display()))?;
    let schema: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Schema file '{}' is not valid JSON", path.display()))?;
    if !schema.is_object() {
        bail!(
            "Schema file '{}' must contain a JSON object",
            path.display()
        );
    }

    Ok(OutputSchema {
        name: schema_name(path),
        schema,
    })
}
