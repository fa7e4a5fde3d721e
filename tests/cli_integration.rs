use std::fs;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn run(history: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quill"))
        .args(args)
        .env("HISTORY_DIR", history.path())
        .env("RUST_LOG", "off")
        .env("LOG_OUTPUT", "stderr")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run quill binary")
}

fn write_response(history: &TempDir, id: &str, created_at: i64, previous: Option<&str>) {
    let record = serde_json::json!({
        "id": id,
        "status": "completed",
        "created_at": created_at,
        "previous_response_id": previous,
        "model": "gpt-5",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": format!("answer for {id}")}]
        }],
    });
    fs::write(history.path().join(id), record.to_string()).expect("write record");
}

#[test]
fn schema_template_prints_a_json_object() {
    let history = tempfile::tempdir().expect("tempdir");
    let output = run(&history, &["--schema-template"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("template should be valid JSON");
    assert!(parsed.is_object());
}

#[test]
fn list_on_empty_history_reports_nothing_stored() {
    let history = tempfile::tempdir().expect("tempdir");
    let output = run(&history, &["--list"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no stored responses"));
}

#[test]
fn list_shows_stored_threads() {
    let history = tempfile::tempdir().expect("tempdir");
    write_response(&history, "resp_first", 100, None);
    write_response(&history, "resp_second", 200, Some("resp_first"));

    let output = run(&history, &["-l", "5"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("first"), "unexpected listing:\n{stdout}");
    assert!(stdout.contains("second"), "unexpected listing:\n{stdout}");
    assert!(!stdout.contains('\u{1b}'), "piped listing should be plain:\n{stdout}");
}

#[test]
fn retrieve_of_a_stored_response_needs_no_api_key() {
    let history = tempfile::tempdir().expect("tempdir");
    write_response(&history, "resp_first", 100, None);

    let output = Command::new(env!("CARGO_BIN_EXE_quill"))
        .args(["-g", "first"])
        .env("HISTORY_DIR", history.path())
        .env("API_KEY_FILE", history.path().join("no-such-key"))
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run quill binary");

    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "answer for resp_first");
}

#[test]
fn request_without_stored_response_resolves_by_suffix() {
    let history = tempfile::tempdir().expect("tempdir");
    write_response(&history, "resp_first", 100, None);
    fs::write(history.path().join("req_resp_interrupted"), "{}").expect("write request");

    let output = run(&history, &["--rm", "interrupted"]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!history.path().join("req_resp_interrupted").exists());
}

#[test]
fn path_like_ids_are_rejected() {
    let history = tempfile::tempdir().expect("tempdir");
    let outside = tempfile::tempdir().expect("tempdir");
    let victim = outside.path().join("victim.txt");
    fs::write(&victim, "keep me").expect("write");
    let padded = format!("{}{}", "./".repeat(25), victim.display());

    let output = run(&history, &["--rm", &padded]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid response id"));
    assert!(victim.exists());
}

#[test]
fn remove_by_suffix_deletes_the_record() {
    let history = tempfile::tempdir().expect("tempdir");
    write_response(&history, "resp_first", 100, None);
    write_response(&history, "resp_second", 200, None);

    let output = run(&history, &["--rm", "second"]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!history.path().join("resp_second").exists());
    assert!(history.path().join("resp_first").exists());
}

#[test]
fn ambiguous_suffix_is_rejected() {
    let history = tempfile::tempdir().expect("tempdir");
    write_response(&history, "resp_aa_x1", 100, None);
    write_response(&history, "resp_bb_x1", 200, None);

    let output = run(&history, &["--rm", "x1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ambiguous"));
    assert!(history.path().join("resp_aa_x1").exists());
}

#[test]
fn invalid_flag_value_exits_with_status_one() {
    let history = tempfile::tempdir().expect("tempdir");
    let output = run(&history, &["--effort", "extreme", "hi"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_api_key_is_reported_before_any_request() {
    let history = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_quill"))
        .arg("hello")
        .env("HISTORY_DIR", history.path())
        .env("API_KEY_FILE", history.path().join("no-such-key"))
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run quill binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("API_KEY_FILE"));
}
