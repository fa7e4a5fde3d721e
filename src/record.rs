use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Incomplete,
    Cancelled,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress)
    }

    /// A terminal status other than `completed`.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != Self::Completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// One unit of work on the remote service, as last observed.
///
/// Fields the client does not interpret are carried in `extra` so a record
/// written to history reads back exactly as the service sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub status: ResponseStatus,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub output: Vec<Value>,
    #[serde(default)]
    pub error: Option<ResponseError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseRecord {
    pub fn output_items(&self) -> Vec<OutputItem> {
        self.output.iter().map(OutputItem::from_value).collect()
    }

    /// Concatenated `output_text` of every message item.
    pub fn output_text(&self) -> String {
        let mut text = String::new();
        for item in self.output_items() {
            if let OutputItem::Message { content } = item {
                for part in content {
                    if let MessageContent::OutputText { text: chunk } = part {
                        text.push_str(&chunk);
                    }
                }
            }
        }
        text
    }

    /// Human readable failure text for a failed-like terminal record.
    pub fn failure_message(&self) -> String {
        if let Some(error) = &self.error {
            return match &error.code {
                Some(code) if !code.is_empty() => format!("{} ({})", error.message, code),
                _ => error.message.clone(),
            };
        }

        let reason = self
            .extra
            .get("incomplete_details")
            .and_then(|details| details.get("reason"))
            .and_then(Value::as_str);
        match reason {
            Some(reason) => format!("response {} ({})", self.status.as_str(), reason),
            None => format!("response {}", self.status.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    OutputText {
        #[serde(default)]
        text: String,
    },
    Refusal {
        #[serde(default)]
        refusal: String,
    },
}

/// Typed view over one entry of `ResponseRecord::output`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputItem {
    Message { content: Vec<MessageContent> },
    ApplyPatchCall { operation: PatchOperation },
    WebSearchCall { query: Option<String> },
    Reasoning,
    Other(Value),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownOutputItem {
    Message {
        #[serde(default)]
        content: Vec<Value>,
    },
    ApplyPatchCall {
        operation: Value,
    },
    WebSearchCall {
        #[serde(default)]
        action: Option<Value>,
    },
    Reasoning {},
}

impl OutputItem {
    pub fn from_value(value: &Value) -> Self {
        let Ok(known) = serde_json::from_value::<KnownOutputItem>(value.clone()) else {
            return Self::Other(value.clone());
        };

        match known {
            KnownOutputItem::Message { content } => Self::Message {
                content: content
                    .into_iter()
                    .filter_map(|part| serde_json::from_value(part).ok())
                    .collect(),
            },
            KnownOutputItem::ApplyPatchCall { operation } => Self::ApplyPatchCall {
                operation: PatchOperation::from_value(&operation),
            },
            KnownOutputItem::WebSearchCall { action } => Self::WebSearchCall {
                query: action
                    .as_ref()
                    .and_then(|action| action.get("query"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            KnownOutputItem::Reasoning {} => Self::Reasoning,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperation {
    UpdateFile { path: String, diff: String },
    CreateFile { path: String, diff: String },
    DeleteFile { path: String },
    Unknown(Value),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownPatchOperation {
    UpdateFile {
        path: String,
        #[serde(default)]
        diff: String,
    },
    CreateFile {
        path: String,
        #[serde(default)]
        diff: String,
    },
    DeleteFile {
        path: String,
    },
}

impl PatchOperation {
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<KnownPatchOperation>(value.clone()) {
            Ok(KnownPatchOperation::UpdateFile { path, diff }) => Self::UpdateFile { path, diff },
            Ok(KnownPatchOperation::CreateFile { path, diff }) => Self::CreateFile { path, diff },
            Ok(KnownPatchOperation::DeleteFile { path }) => Self::DeleteFile { path },
            Err(_) => Self::Unknown(value.clone()),
        }
    }
}

/// A single input part of a request, in the service's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText {
        text: String,
    },
    InputImage {
        image_url: String,
    },
    InputFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::InputText { text: text.into() }
    }

    /// Short label used in history listings.
    pub fn summary(&self) -> String {
        match self {
            Self::InputText { text } => text.clone(),
            Self::InputImage { image_url } if image_url.starts_with("data:") => {
                "[image]".to_string()
            }
            Self::InputImage { image_url } => format!("[image {image_url}]"),
            Self::InputFile {
                filename, file_url, ..
            } => match (filename, file_url) {
                (Some(name), _) => format!("[file {name}]"),
                (None, Some(url)) => format!("[file {url}]"),
                (None, None) => "[file]".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    WebSearch,
    ApplyPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// The payload that produced a response, persisted as `req_<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub model: String,
    pub input: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<OutputSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

impl RequestRecord {
    pub fn new(model: impl Into<String>, input: Vec<ContentPart>) -> Self {
        Self {
            model: model.into(),
            input,
            instructions: None,
            reasoning_effort: ReasoningEffort::default(),
            verbosity: Verbosity::default(),
            tools: Vec::new(),
            schema: None,
            previous_response_id: None,
        }
    }

    /// One-line description of what was asked.
    pub fn summary(&self) -> String {
        self.input
            .iter()
            .map(ContentPart::summary)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
