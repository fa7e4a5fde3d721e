use std::path::Path;

use colored::Colorize;

use crate::record::PatchOperation;

fn render_diff(diff: &str, out: &mut String) {
    for line in diff.lines() {
        let styled = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('@') {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push_str(&styled);
        out.push('\n');
    }
}

/// Renders one file-edit operation returned by the patch tool.
pub fn render_operation(operation: &PatchOperation) -> String {
    let mut out = String::new();
    match operation {
        PatchOperation::UpdateFile { path, diff } => {
            out.push_str(&format!("{} {}\n", "update".yellow().bold(), path.bold()));
            render_diff(diff, &mut out);
        }
        PatchOperation::CreateFile { path, diff } => {
            out.push_str(&format!("{} {}\n", "create".green().bold(), path.bold()));
            render_diff(diff, &mut out);
        }
        PatchOperation::DeleteFile { path } => {
            let name = Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            out.push_str(&format!("{} {}\n", "delete".red().bold(), name.bold()));
        }
        PatchOperation::Unknown(value) => {
            let dump = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            out.push_str(&format!("{}\n{}\n", "unrecognized patch operation".magenta(), dump));
        }
    }
    out
}
