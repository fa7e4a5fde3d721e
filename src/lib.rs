pub mod attachment;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod history;
pub mod logging;
pub mod providers;
pub mod record;
pub mod render;
pub mod schema;
pub mod service;
pub mod session;

use std::collections::HashMap;
use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use clap::error::ErrorKind;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cli::{Cli, Mode, Resume};
use config::Config;
use history::{HistoryStore, LastResponsePointer};
use providers::responses::ResponsesApi;
use record::RequestRecord;
use session::{Completion, CompletionSession, SessionError, SessionOptions};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::try_parse().or_else(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => Err(err),
    })?;
    logging::init();
    if !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let cfg = Config::from_env();
    info!(
        model = %cfg.model,
        model_base_url = %cfg.model_base_url,
        history_dir = %cfg.history_dir.display(),
        "loaded runtime configuration"
    );
    let store = HistoryStore::new(&cfg.history_dir, cfg.full_id_len);

    match cli.mode() {
        Mode::SchemaTemplate => {
            print!("{}", schema::SCHEMA_TEMPLATE);
            Ok(())
        }
        Mode::List { limit } => list(&store, limit),
        Mode::Remove { ids } => remove(&store, &ids),
        Mode::Retrieve { id } => {
            let id = store.resolve_id(&id)?;
            if let Some(result) = session::stored_completion(&store, &id, &cfg.pricing) {
                return finish(result, cli.json);
            }
            let remote = Remote::connect(&cfg)?;
            let service = ResponsesApi::new(&remote.client, &cfg, &remote.api_key);
            let (cancel, watcher) = cancel_on_ctrl_c();
            let session =
                CompletionSession::new(&service, &store, &store, session_options(&cfg), cancel);
            let result = session.retrieve(&id).await;
            watcher.abort();
            finish(result, cli.json)
        }
        Mode::Submit { resume } => {
            let request = build_request(&cli, &cfg, &store, resume)?;
            let remote = Remote::connect(&cfg)?;
            let service = ResponsesApi::new(&remote.client, &cfg, &remote.api_key);
            let (cancel, watcher) = cancel_on_ctrl_c();
            let session =
                CompletionSession::new(&service, &store, &store, session_options(&cfg), cancel);
            let result = session.submit(&request).await;
            watcher.abort();
            finish(result, cli.json)
        }
    }
}

/// What the modes that talk to the service need, read once per run.
struct Remote {
    client: Client,
    api_key: String,
}

impl Remote {
    fn connect(cfg: &Config) -> Result<Self> {
        let api_key = credentials::load_api_key(&cfg.api_key_file)?;
        let client = Client::builder()
            .timeout(cfg.model_timeout())
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self { client, api_key })
    }
}

fn session_options(cfg: &Config) -> SessionOptions {
    SessionOptions {
        poll_interval: cfg.poll_interval(),
        pricing: cfg.pricing,
        persist_failed: cfg.persist_failed,
    }
}

/// The first Ctrl-C cancels the session at its next await point; a second
/// one exits immediately.
fn cancel_on_ctrl_c() -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        on_interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted again; exiting without waiting");
            std::process::exit(130);
        }
    });
    (cancel, watcher)
}

fn list(store: &HistoryStore, limit: usize) -> Result<()> {
    let ids = store.list_ids()?;
    let threads = history::thread::build_threads(store.load_all_responses()?);
    if threads.is_empty() {
        println!("no stored responses in {}", store.dir().display());
        return Ok(());
    }

    let requests: HashMap<String, RequestRecord> = threads
        .iter()
        .take(limit)
        .flatten()
        .filter_map(|record| {
            store
                .load_request(&record.id)
                .map(|request| (record.id.clone(), request))
        })
        .collect();
    print!("{}", render::render_threads(&threads, &requests, &ids, limit));
    Ok(())
}

fn remove(store: &HistoryStore, ids: &[String]) -> Result<()> {
    for candidate in ids {
        let id = store.resolve_id(candidate)?;
        if !store.remove(&id)? {
            bail!("no stored response matches '{}'", candidate);
        }
        info!(id = %id, "removed stored response");
        println!("removed {id}");
    }
    Ok(())
}

fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read standard input")?;
    Ok(Some(buffer))
}

fn build_request(
    cli: &Cli,
    cfg: &Config,
    store: &HistoryStore,
    resume: Option<Resume>,
) -> Result<RequestRecord> {
    let mut items = cli.inputs.clone();
    let wants_stdin =
        items.is_empty() || items.iter().any(|item| item == attachment::STDIN_PLACEHOLDER);
    let stdin = if wants_stdin { read_piped_stdin()? } else { None };
    if items.is_empty() && stdin.is_some() {
        items.push(attachment::STDIN_PLACEHOLDER.to_string());
    }

    let input = attachment::resolve_all(&items, stdin.as_deref())?;
    if input.is_empty() {
        bail!("No input given. Pass a prompt, file, or URL, or pipe text on standard input.");
    }

    let previous_response_id = match resume {
        None => None,
        Some(Resume::Last) => Some(
            store
                .load_last_id()
                .ok_or_else(|| anyhow!("There is no previous response to resume."))?,
        ),
        Some(Resume::Id(candidate)) => Some(store.resolve_id(&candidate)?),
    };

    let mut request = RequestRecord::new(
        cli.model.clone().unwrap_or_else(|| cfg.model.clone()),
        input,
    );
    request.instructions = cli.instructions.clone();
    request.reasoning_effort = cli.effort.into();
    request.verbosity = cli.verbosity.into();
    request.tools = cli.tools();
    request.schema = cli.schema.as_deref().map(schema::load).transpose()?;
    request.previous_response_id = previous_response_id;
    Ok(request)
}

fn finish(result: Result<Completion, SessionError>, as_json: bool) -> Result<()> {
    match result {
        Ok(completion) => print_completion(&completion, as_json),
        Err(err) => {
            if let SessionError::Failed { id, cost, .. } = &err {
                warn!(id = %id, cost, "response failed");
            }
            Err(err.into())
        }
    }
}

fn print_completion(completion: &Completion, as_json: bool) -> Result<()> {
    if as_json {
        let json = serde_json::to_string_pretty(&completion.record)
            .context("Failed to serialize response record")?;
        println!("{json}");
    } else {
        print!("{}", render::render_response(&completion.record));
    }
    eprintln!("{}", render::render_usage(&completion.record, completion.cost));
    Ok(())
}
