use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use tracing::debug;
use url::Url;

use crate::record::ContentPart;

/// Input item that stands for buffered standard input.
pub const STDIN_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image(&'static str),
    Pdf,
    Text,
    Binary,
}

const EXTENSION_KINDS: &[(&str, AttachmentKind)] = &[
    ("png", AttachmentKind::Image("image/png")),
    ("jpg", AttachmentKind::Image("image/jpeg")),
    ("jpeg", AttachmentKind::Image("image/jpeg")),
    ("gif", AttachmentKind::Image("image/gif")),
    ("webp", AttachmentKind::Image("image/webp")),
    ("pdf", AttachmentKind::Pdf),
    ("txt", AttachmentKind::Text),
    ("md", AttachmentKind::Text),
    ("csv", AttachmentKind::Text),
    ("json", AttachmentKind::Text),
    ("toml", AttachmentKind::Text),
    ("yaml", AttachmentKind::Text),
    ("yml", AttachmentKind::Text),
    ("xml", AttachmentKind::Text),
    ("html", AttachmentKind::Text),
    ("css", AttachmentKind::Text),
    ("rs", AttachmentKind::Text),
    ("py", AttachmentKind::Text),
    ("js", AttachmentKind::Text),
    ("ts", AttachmentKind::Text),
    ("go", AttachmentKind::Text),
    ("c", AttachmentKind::Text),
    ("h", AttachmentKind::Text),
    ("cpp", AttachmentKind::Text),
    ("java", AttachmentKind::Text),
    ("sh", AttachmentKind::Text),
    ("sql", AttachmentKind::Text),
];

/// Classifies a path or URL path by its extension, case-insensitively.
pub fn classify(path: &str) -> AttachmentKind {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    extension
        .and_then(|ext| {
            EXTENSION_KINDS
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, kind)| *kind)
        })
        .unwrap_or(AttachmentKind::Binary)
}

fn parse_web_url(item: &str) -> Option<Url> {
    let url = Url::parse(item).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn url_part(url: &Url) -> ContentPart {
    match classify(url.path()) {
        AttachmentKind::Image(_) => ContentPart::InputImage {
            image_url: url.to_string(),
        },
        AttachmentKind::Pdf => ContentPart::InputFile {
            filename: None,
            file_data: None,
            file_url: Some(url.to_string()),
        },
        AttachmentKind::Text | AttachmentKind::Binary => ContentPart::text(format!("URL: {url}")),
    }
}

fn file_part(path: &Path) -> Result<ContentPart> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input file '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let kind = classify(&path.to_string_lossy());
    debug!(path = %path.display(), kind = ?kind, size = bytes.len(), "attaching local file");

    Ok(match kind {
        AttachmentKind::Image(mime) => ContentPart::InputImage {
            image_url: data_url(mime, &bytes),
        },
        AttachmentKind::Pdf => ContentPart::InputFile {
            filename: Some(filename),
            file_data: Some(data_url("application/pdf", &bytes)),
            file_url: None,
        },
        // Unknown extensions are read as text too, even when the bytes are binary.
        AttachmentKind::Text | AttachmentKind::Binary => {
            let text = String::from_utf8_lossy(&bytes);
            ContentPart::text(format!("<file name=\"{filename}\">\n{text}\n</file>"))
        }
    })
}

/// Turns one raw input item into a content part.
///
/// Returns `Ok(None)` when the item is the stdin placeholder and there is no
/// usable stdin text.
pub fn resolve(item: &str, stdin: Option<&str>) -> Result<Option<ContentPart>> {
    if item == STDIN_PLACEHOLDER {
        return Ok(stdin
            .filter(|text| !text.trim().is_empty())
            .map(ContentPart::text));
    }

    if let Some(url) = parse_web_url(item) {
        return Ok(Some(url_part(&url)));
    }

    let path = Path::new(item);
    if path.is_file() {
        return file_part(path).map(Some);
    }

    Ok(Some(ContentPart::text(item)))
}

/// Resolves every item in order, dropping skipped ones.
pub fn resolve_all(items: &[String], stdin: Option<&str>) -> Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        if let Some(part) = resolve(item, stdin)? {
            parts.push(part);
        }
    }
    Ok(parts)
}
