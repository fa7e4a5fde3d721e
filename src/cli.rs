use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::record::{ReasoningEffort, Tool, Verbosity};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EffortArg {
    #[value(alias = "none")]
    Minimal,
    Low,
    Medium,
    High,
}

impl From<EffortArg> for ReasoningEffort {
    fn from(value: EffortArg) -> Self {
        match value {
            EffortArg::Minimal => Self::Minimal,
            EffortArg::Low => Self::Low,
            EffortArg::Medium => Self::Medium,
            EffortArg::High => Self::High,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VerbosityArg {
    Low,
    Medium,
    High,
}

impl From<VerbosityArg> for Verbosity {
    fn from(value: VerbosityArg) -> Self {
        match value {
            VerbosityArg::Low => Self::Low,
            VerbosityArg::Medium => Self::Medium,
            VerbosityArg::High => Self::High,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about)]
/// Send prompts, files, and URLs to a language model and keep a local
/// history of the conversation.
pub struct Cli {
    /// Prompt text, file paths, or URLs. Use `-` for standard input.
    pub inputs: Vec<String>,

    /// Model to use instead of MODEL.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Reasoning effort.
    #[arg(long, short = 'e', value_enum, default_value_t = EffortArg::Medium)]
    pub effort: EffortArg,

    /// Answer verbosity.
    #[arg(long, value_enum, default_value_t = VerbosityArg::Medium)]
    pub verbosity: VerbosityArg,

    /// Let the model search the web.
    #[arg(long, short = 'w', default_value_t = false)]
    pub web_search: bool,

    /// Let the model propose file edits as patch operations.
    #[arg(long, short = 'p', default_value_t = false)]
    pub apply_patch: bool,

    /// Instructions sent alongside the input.
    #[arg(long, short = 'i')]
    pub instructions: Option<String>,

    /// Continue a conversation. Without `=ID`, continues the last response.
    #[arg(long, short = 'r', value_name = "ID", require_equals = true)]
    pub resume: Option<Option<String>>,

    /// Show a response by id. Short suffixes of stored ids are accepted.
    #[arg(long, short = 'g', value_name = "ID", conflicts_with_all = ["resume", "list", "remove"])]
    pub retrieve: Option<String>,

    /// Remove stored responses by id.
    #[arg(long = "rm", value_name = "ID", num_args = 1.., conflicts_with_all = ["resume", "list"])]
    pub remove: Vec<String>,

    /// List the most recent conversation threads.
    #[arg(long, short = 'l', value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    pub list: Option<usize>,

    /// JSON Schema file the answer must follow.
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Print a starter JSON Schema and exit.
    #[arg(long, default_value_t = false)]
    pub schema_template: bool,

    /// Print the raw response record as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// What a single invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    SchemaTemplate,
    List { limit: usize },
    Remove { ids: Vec<String> },
    Retrieve { id: String },
    Submit { resume: Option<Resume> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    Last,
    Id(String),
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.schema_template {
            return Mode::SchemaTemplate;
        }
        if let Some(limit) = self.list {
            return Mode::List { limit };
        }
        if !self.remove.is_empty() {
            return Mode::Remove {
                ids: self.remove.clone(),
            };
        }
        if let Some(id) = &self.retrieve {
            return Mode::Retrieve { id: id.clone() };
        }

        let resume = self.resume.as_ref().map(|target| match target {
            Some(id) if !id.trim().is_empty() => Resume::Id(id.clone()),
            _ => Resume::Last,
        });
        Mode::Submit { resume }
    }

    pub fn tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        if self.web_search {
            tools.push(Tool::WebSearch);
        }
        if self.apply_patch {
            tools.push(Tool::ApplyPatch);
        }
        tools
    }
}
