use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Config;
use crate::providers::http_errors::{service_request_error, service_status_error};
use crate::record::{
    ContentPart, ReasoningEffort, RequestRecord, ResponseRecord, Tool, Verbosity,
};
use crate::service::{CompletionService, ServiceFuture};

#[derive(Debug, Serialize)]
struct CreateResponseBody<'a> {
    model: &'a str,
    input: [InputMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    reasoning: ReasoningConfig,
    text: TextConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
    background: bool,
    store: bool,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a [ContentPart],
}

#[derive(Debug, Serialize)]
struct ReasoningConfig {
    effort: ReasoningEffort,
}

#[derive(Debug, Serialize)]
struct TextConfig {
    verbosity: Verbosity,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

impl<'a> CreateResponseBody<'a> {
    fn from_request(request: &'a RequestRecord) -> Self {
        let format = request.schema.as_ref().map(|schema| {
            json!({
                "type": "json_schema",
                "name": schema.name,
                "schema": schema.schema,
                "strict": true,
            })
        });

        Self {
            model: &request.model,
            input: [InputMessage {
                role: "user",
                content: &request.input,
            }],
            instructions: request.instructions.as_deref(),
            reasoning: ReasoningConfig {
                effort: request.reasoning_effort,
            },
            text: TextConfig {
                verbosity: request.verbosity,
                format,
            },
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            previous_response_id: request.previous_response_id.as_deref(),
            background: true,
            store: true,
        }
    }
}

fn responses_url(base_url: &str) -> String {
    format!("{}/responses", base_url.trim_end_matches('/'))
}

fn response_url(base_url: &str, id: &str) -> String {
    format!("{}/{}", responses_url(base_url), id)
}

/// HTTP adapter for the responses endpoint, run in background mode.
pub struct ResponsesApi<'a> {
    client: &'a Client,
    cfg: &'a Config,
    api_key: &'a str,
}

impl<'a> ResponsesApi<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config, api_key: &'a str) -> Self {
        Self {
            client,
            cfg,
            api_key,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, api_url: &str) -> Result<ResponseRecord> {
        let response = request
            .bearer_auth(self.api_key)
            .send()
            .await
            .map_err(|err| {
                warn!(api_url = %api_url, error = %err, "completion service request failed");
                service_request_error(err, api_url, self.cfg.model_timeout_secs)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            warn!(
                api_url = %api_url,
                status = %status,
                response_body_len = body.len(),
                "completion service returned non-success status"
            );
            return Err(service_status_error(status, &body));
        }

        let record: ResponseRecord = response
            .json()
            .await
            .context("Failed to parse completion service response")?;
        debug!(
            id = %record.id,
            status = record.status.as_str(),
            "received response record"
        );
        Ok(record)
    }
}

impl CompletionService for ResponsesApi<'_> {
    fn create<'b>(&'b self, request: &'b RequestRecord) -> ServiceFuture<'b> {
        Box::pin(async move {
            let api_url = responses_url(&self.cfg.model_base_url);
            let body = CreateResponseBody::from_request(request);
            debug!(
                api_url = %api_url,
                model = %request.model,
                part_count = request.input.len(),
                previous_response_id = ?request.previous_response_id,
                "creating response"
            );
            self.send(self.client.post(&api_url).json(&body), &api_url)
                .await
        })
    }

    fn retrieve<'b>(&'b self, id: &'b str) -> ServiceFuture<'b> {
        Box::pin(async move {
            let api_url = response_url(&self.cfg.model_base_url, id);
            debug!(api_url = %api_url, id = %id, "fetching response");
            self.send(self.client.get(&api_url), &api_url).await
        })
    }
}
