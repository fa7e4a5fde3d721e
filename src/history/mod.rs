mod error;
pub mod short_id;
pub mod thread;

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::record::{RequestRecord, ResponseRecord};

pub use error::{HistoryError, ResolveError};

const REQUEST_PREFIX: &str = "req_";
const LAST_ID_FILE: &str = "last_response_id";
const TEMP_PREFIX: &str = ".";

/// Where the session keeps request and response records.
pub trait RecordStore {
    fn save_request(&self, id: &str, request: &RequestRecord) -> Result<(), HistoryError>;
    fn save_response(&self, response: &ResponseRecord) -> Result<(), HistoryError>;
    fn load_response(&self, id: &str) -> Option<ResponseRecord>;
}

/// Single-slot pointer to the most recently created response.
pub trait LastResponsePointer {
    fn load_last_id(&self) -> Option<String>;
    fn save_last_id(&self, id: &str) -> Result<(), HistoryError>;
}

/// Flat directory of JSON records: `{id}` for responses, `req_{id}` for the
/// requests that produced them, plus the last-response pointer file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    full_id_len: usize,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>, full_id_len: usize) -> Self {
        Self {
            dir: dir.into(),
            full_id_len,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn response_path(&self, id: &str) -> Result<PathBuf, HistoryError> {
        check_id(id)?;
        Ok(self.dir.join(id))
    }

    fn request_path(&self, id: &str) -> Result<PathBuf, HistoryError> {
        check_id(id)?;
        Ok(self.dir.join(format!("{REQUEST_PREFIX}{id}")))
    }

    fn ensure_dir(&self) -> Result<(), HistoryError> {
        fs::create_dir_all(&self.dir)
            .map_err(|source| HistoryError::io("creating history directory", &self.dir, source))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), HistoryError> {
        self.ensure_dir()?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .dir
            .join(format!("{TEMP_PREFIX}{file_name}.{}.tmp", std::process::id()));

        fs::write(&temp_path, contents)
            .map_err(|source| HistoryError::io("writing history record", &temp_path, source))?;
        fs::rename(&temp_path, path)
            .map_err(|source| HistoryError::io("moving history record into place", path, source))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), HistoryError> {
        let mut contents = serde_json::to_vec_pretty(value)
            .map_err(|source| HistoryError::serialize(path, source))?;
        contents.push(b'\n');
        self.write_atomic(path, &contents)?;
        debug!(path = %path.display(), "wrote history record");
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read history record");
                return None;
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt history record");
                None
            }
        }
    }

    pub fn load_request(&self, id: &str) -> Option<RequestRecord> {
        self.read_json(&self.request_path(id).ok()?)
    }

    /// Deletes both artifacts for `id`. Returns whether either existed.
    pub fn remove(&self, id: &str) -> Result<bool, HistoryError> {
        let mut removed = false;
        for path in [self.response_path(id)?, self.request_path(id)?] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(HistoryError::io("removing history record", path, source));
                }
            }
        }
        debug!(id = %id, removed, "removed history entry");
        Ok(removed)
    }

    /// Every persisted response id, in directory order.
    pub fn list_ids(&self) -> Result<Vec<String>, HistoryError> {
        Ok(self
            .file_names()?
            .into_iter()
            .filter(|name| !name.starts_with(REQUEST_PREFIX))
            .collect())
    }

    /// Response ids plus the ids of requests whose response was never stored,
    /// such as an interrupted submission.
    pub fn known_ids(&self) -> Result<Vec<String>, HistoryError> {
        let mut ids = Vec::new();
        for name in self.file_names()? {
            let id = name
                .strip_prefix(REQUEST_PREFIX)
                .map_or_else(|| name.clone(), str::to_string);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn file_names(&self) -> Result<Vec<String>, HistoryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::io(
                    "listing history directory",
                    &self.dir,
                    source,
                ));
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| HistoryError::io("listing history directory", &self.dir, source))?;
            let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) || name == LAST_ID_FILE {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    /// Loads every readable response record; unreadable ones are skipped.
    pub fn load_all_responses(&self) -> Result<Vec<ResponseRecord>, HistoryError> {
        Ok(self
            .list_ids()?
            .iter()
            .filter_map(|id| self.load_response(id))
            .collect())
    }

    /// Expands a possibly abbreviated id against the stored ids.
    pub fn resolve_id(&self, candidate: &str) -> anyhow::Result<String> {
        let ids = self.known_ids()?;
        let id = short_id::resolve(candidate, &ids, self.full_id_len)?;
        if !is_plain_id(&id) {
            return Err(ResolveError::InvalidId { candidate: id }.into());
        }
        Ok(id)
    }
}

/// Ids become file names directly under the history directory, so only a
/// single plain component that cannot collide with the bookkeeping files
/// is accepted.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains(['/', '\\', '\0'])
        && !id.starts_with(TEMP_PREFIX)
        && !id.starts_with(REQUEST_PREFIX)
        && id != LAST_ID_FILE
        && Path::new(id).file_name() == Some(OsStr::new(id))
}

fn check_id(id: &str) -> Result<(), HistoryError> {
    if is_plain_id(id) {
        Ok(())
    } else {
        Err(HistoryError::InvalidId { id: id.to_string() })
    }
}

impl RecordStore for HistoryStore {
    fn save_request(&self, id: &str, request: &RequestRecord) -> Result<(), HistoryError> {
        self.write_json(&self.request_path(id)?, request)
    }

    fn save_response(&self, response: &ResponseRecord) -> Result<(), HistoryError> {
        self.write_json(&self.response_path(&response.id)?, response)
    }

    fn load_response(&self, id: &str) -> Option<ResponseRecord> {
        self.read_json(&self.response_path(id).ok()?)
    }
}

impl LastResponsePointer for HistoryStore {
    fn load_last_id(&self) -> Option<String> {
        let path = self.dir.join(LAST_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().to_string()).filter(|id| !id.is_empty()),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read last response id");
                None
            }
        }
    }

    fn save_last_id(&self, id: &str) -> Result<(), HistoryError> {
        check_id(id)?;
        self.write_atomic(&self.dir.join(LAST_ID_FILE), format!("{id}\n").as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    use super::{HistoryError, HistoryStore, LastResponsePointer, RecordStore};
    use crate::record::{
        ContentPart, ReasoningEffort, RequestRecord, ResponseRecord, ResponseStatus, Tool, Usage,
    };

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = HistoryStore::new(dir.path().join("history"), 50);
        (dir, store)
    }

    fn response(id: &str) -> ResponseRecord {
        let mut extra = Map::new();
        extra.insert("object".to_string(), json!("response"));
        ResponseRecord {
            id: id.to_string(),
            status: ResponseStatus::Completed,
            created_at: 1_700_000_000,
            previous_response_id: Some("resp_prev".to_string()),
            model: "gpt-5".to_string(),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 20,
                extra: Map::new(),
            }),
            tools: vec![json!({"type": "web_search"})],
            output: vec![json!({"type": "message", "content": [
                {"type": "output_text", "text": "hi"}
            ]})],
            error: None,
            extra,
        }
    }

    fn request() -> RequestRecord {
        let mut request = RequestRecord::new("gpt-5", vec![ContentPart::text("hello")]);
        request.instructions = Some("be brief".to_string());
        request.reasoning_effort = ReasoningEffort::High;
        request.tools = vec![Tool::WebSearch, Tool::ApplyPatch];
        request.previous_response_id = Some("resp_prev".to_string());
        request
    }

    #[test]
    fn directory_is_created_lazily() {
        let (_dir, store) = store();
        assert!(!store.dir().exists());
        assert_eq!(store.list_ids().expect("listing should work"), Vec::<String>::new());
        assert!(store.load_response("resp_1").is_none());

        store.save_response(&response("resp_1")).expect("save should work");
        assert!(store.dir().is_dir());
    }

    #[test]
    fn response_round_trips() {
        let (_dir, store) = store();
        let record = response("resp_1");
        store.save_response(&record).expect("save should work");
        assert_eq!(store.load_response("resp_1"), Some(record));
    }

    #[test]
    fn request_round_trips() {
        let (_dir, store) = store();
        let record = request();
        store.save_request("resp_1", &record).expect("save should work");
        assert_eq!(store.load_request("resp_1"), Some(record));
    }

    #[test]
    fn save_overwrites_existing_record() {
        let (_dir, store) = store();
        let mut record = response("resp_1");
        store.save_response(&record).expect("first save should work");
        record.model = "gpt-5-mini".to_string();
        store.save_response(&record).expect("second save should work");
        assert_eq!(store.load_response("resp_1"), Some(record));
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, store) = store();
        store.save_response(&response("resp_1")).expect("save should work");
        store.save_request("resp_1", &request()).expect("save should work");

        assert!(store.remove("resp_1").expect("remove should work"));
        assert!(store.load_response("resp_1").is_none());
        assert!(store.load_request("resp_1").is_none());

        assert!(!store.remove("resp_1").expect("second remove should work"));
        assert!(!store.remove("resp_never").expect("remove of unknown id should work"));
        assert!(store.load_response("resp_never").is_none());
    }

    #[test]
    fn ids_outside_the_history_directory_are_rejected() {
        let (dir, store) = store();
        store.save_response(&response("resp_1")).expect("save should work");
        let victim = dir.path().join("victim.txt");
        fs::write(&victim, b"keep me").expect("write");
        let escape = format!("{}../victim.txt", "./".repeat(25));

        let err = store.resolve_id(&escape).expect_err("path-like id");
        assert!(err.to_string().contains("not a valid response id"), "unexpected: {err}");
        assert!(matches!(
            store.remove(&escape),
            Err(HistoryError::InvalidId { .. })
        ));
        assert!(store.load_response("../victim.txt").is_none());
        assert!(store.load_request("../victim.txt").is_none());
        assert!(matches!(
            store.save_response(&response("../victim.txt")),
            Err(HistoryError::InvalidId { .. })
        ));
        for id in ["..", "a/b", "a\\b", ".hidden", "last_response_id", "req_1"] {
            assert!(store.save_request(id, &request()).is_err(), "{id} was accepted");
        }
        assert!(store.save_last_id("../x").is_err());

        assert_eq!(fs::read(&victim).expect("victim should survive"), b"keep me");
    }

    #[test]
    fn corrupt_record_reads_as_absent() {
        let (_dir, store) = store();
        store.save_response(&response("resp_1")).expect("save should work");
        fs::write(store.dir().join("resp_1"), b"{\"id\": \"resp_1\", \"stat").expect("write");

        assert!(store.load_response("resp_1").is_none());
        assert_eq!(
            store.load_all_responses().expect("loading should work"),
            Vec::new()
        );
    }

    #[test]
    fn list_ids_skips_requests_pointer_and_temporaries() {
        let (_dir, store) = store();
        store.save_response(&response("resp_1")).expect("save should work");
        store.save_response(&response("resp_2")).expect("save should work");
        store.save_request("resp_1", &request()).expect("save should work");
        store.save_request("resp_3", &request()).expect("save should work");
        store.save_last_id("resp_2").expect("pointer save should work");
        fs::write(store.dir().join(".resp_4.1.tmp"), b"{}").expect("write");

        let mut ids = store.list_ids().expect("listing should work");
        ids.sort();
        assert_eq!(ids, vec!["resp_1".to_string(), "resp_2".to_string()]);
    }

    #[test]
    fn last_id_pointer_is_overwritten() {
        let (_dir, store) = store();
        assert_eq!(store.load_last_id(), None);
        store.save_last_id("resp_1").expect("save should work");
        store.save_last_id("resp_2").expect("save should work");
        assert_eq!(store.load_last_id(), Some("resp_2".to_string()));
    }

    #[test]
    fn resolve_id_uses_stored_ids() {
        let (_dir, store) = store();
        store.save_response(&response("resp_aaaa1111")).expect("save should work");
        store.save_response(&response("resp_bbbb1111")).expect("save should work");

        assert_eq!(
            store.resolve_id("a1111").expect("unique suffix"),
            "resp_aaaa1111"
        );
        let err = store.resolve_id("1111").expect_err("shared suffix");
        assert!(err.to_string().contains("ambiguous"), "unexpected: {err}");
    }

    #[test]
    fn resolve_id_finds_requests_without_a_stored_response() {
        let (_dir, store) = store();
        store.save_response(&response("resp_aaaa1111")).expect("save should work");
        store.save_request("resp_aaaa1111", &request()).expect("save should work");
        store.save_request("resp_cccc2222", &request()).expect("save should work");

        assert_eq!(store.resolve_id("c2222").expect("unique suffix"), "resp_cccc2222");
        assert_eq!(store.resolve_id("a1111").expect("unique suffix"), "resp_aaaa1111");

        let mut known = store.known_ids().expect("listing should work");
        known.sort();
        assert_eq!(known, vec!["resp_aaaa1111", "resp_cccc2222"]);
        assert_eq!(store.list_ids().expect("listing should work"), vec!["resp_aaaa1111"]);
    }
}
