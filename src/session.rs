use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::history::{HistoryError, LastResponsePointer, RecordStore};
use crate::record::{RequestRecord, ResponseRecord, Usage};
use crate::service::CompletionService;

/// Per-million-token rates used for cost reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub fn cost(&self, usage: Option<&Usage>) -> f64 {
        let Some(usage) = usage else {
            return 0.0;
        };
        usage.input_tokens as f64 / 1e6 * self.input_per_million
            + usage.output_tokens as f64 / 1e6 * self.output_per_million
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Service(#[from] anyhow::Error),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("response {id} {status}: {message}")]
    Failed {
        id: String,
        status: &'static str,
        message: String,
        cost: f64,
    },

    #[error("interrupted while waiting for response {id}; fetch it later with --retrieve {id}")]
    Interrupted { id: String },

    #[error("interrupted before the service acknowledged the request")]
    Abandoned,
}

/// Where a submission stands in the completion protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Submitted(ResponseRecord),
    Polling(ResponseRecord),
    Completed(ResponseRecord),
    Failed(ResponseRecord),
}

impl SessionState {
    fn observe(record: ResponseRecord) -> Self {
        if !record.status.is_terminal() {
            Self::Polling(record)
        } else if record.status.is_failure() {
            Self::Failed(record)
        } else {
            Self::Completed(record)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub record: ResponseRecord,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub pricing: Pricing,
    pub persist_failed: bool,
}

pub struct CompletionSession<'a, S> {
    service: &'a S,
    store: &'a dyn RecordStore,
    pointer: &'a dyn LastResponsePointer,
    options: SessionOptions,
    cancel: CancellationToken,
}

impl<'a, S> CompletionSession<'a, S>
where
    S: CompletionService,
{
    pub fn new(
        service: &'a S,
        store: &'a dyn RecordStore,
        pointer: &'a dyn LastResponsePointer,
        options: SessionOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            store,
            pointer,
            options,
            cancel,
        }
    }

    /// Sends a new request and waits for it to reach a terminal status.
    pub async fn submit(&self, request: &RequestRecord) -> Result<Completion, SessionError> {
        let created = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("stopped waiting for the service to accept the request");
                return Err(SessionError::Abandoned);
            }
            created = self.service.create(request) => created?,
        };
        info!(
            id = %created.id,
            status = created.status.as_str(),
            previous_response_id = ?request.previous_response_id,
            "response submitted"
        );

        // Persist enough to resume before any waiting happens.
        self.store.save_request(&created.id, request)?;
        self.pointer.save_last_id(&created.id)?;

        self.run(SessionState::Submitted(created)).await
    }

    /// Returns a stored response, or fetches and waits for it remotely.
    pub async fn retrieve(&self, id: &str) -> Result<Completion, SessionError> {
        if let Some(result) = stored_completion(self.store, id, &self.options.pricing) {
            return result;
        }
        self.fetch_and_wait(id).await
    }

    async fn fetch_and_wait(&self, id: &str) -> Result<Completion, SessionError> {
        debug!(id = %id, "fetching response from service");
        let record = self.fetch(id).await?;
        self.run(SessionState::observe(record)).await
    }

    async fn run(&self, mut state: SessionState) -> Result<Completion, SessionError> {
        loop {
            state = match state {
                SessionState::Submitted(record) => SessionState::observe(record),
                SessionState::Polling(record) => {
                    self.wait_interval(&record.id).await?;
                    let next = self.fetch(&record.id).await?;
                    debug!(id = %next.id, status = next.status.as_str(), "polled response");
                    SessionState::observe(next)
                }
                SessionState::Completed(record) => {
                    let cost = self.on_terminal(&record, true)?;
                    return Ok(Completion { record, cost });
                }
                SessionState::Failed(record) => {
                    let cost = self.on_terminal(&record, self.options.persist_failed)?;
                    return Err(failure(record, cost));
                }
            };
        }
    }

    async fn fetch(&self, id: &str) -> Result<ResponseRecord, SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.interrupted(id)),
            record = self.service.retrieve(id) => Ok(record?),
        }
    }

    async fn wait_interval(&self, id: &str) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.interrupted(id)),
            _ = tokio::time::sleep(self.options.poll_interval) => Ok(()),
        }
    }

    fn interrupted(&self, id: &str) -> SessionError {
        info!(id = %id, "stopped waiting for response");
        SessionError::Interrupted { id: id.to_string() }
    }

    fn on_terminal(&self, record: &ResponseRecord, persist: bool) -> Result<f64, SessionError> {
        let cost = self.options.pricing.cost(record.usage.as_ref());
        info!(
            id = %record.id,
            status = record.status.as_str(),
            input_tokens = record.usage.as_ref().map_or(0, |usage| usage.input_tokens),
            output_tokens = record.usage.as_ref().map_or(0, |usage| usage.output_tokens),
            cost,
            "response reached terminal status"
        );
        if persist {
            self.store.save_response(record)?;
        }
        Ok(cost)
    }
}

/// A terminal response already in history, priced without contacting the
/// service. `None` when the record is absent or was stored mid-flight.
pub fn stored_completion(
    store: &dyn RecordStore,
    id: &str,
    pricing: &Pricing,
) -> Option<Result<Completion, SessionError>> {
    let record = store.load_response(id)?;
    debug!(id = %id, status = record.status.as_str(), "response found in history");
    let cost = pricing.cost(record.usage.as_ref());
    match SessionState::observe(record) {
        SessionState::Completed(record) => Some(Ok(Completion { record, cost })),
        SessionState::Failed(record) => Some(Err(failure(record, cost))),
        SessionState::Submitted(_) | SessionState::Polling(_) => None,
    }
}

fn failure(record: ResponseRecord, cost: f64) -> SessionError {
    SessionError::Failed {
        message: record.failure_message(),
        status: record.status.as_str(),
        id: record.id,
        cost,
    }
}
