#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Run the hook binary with `args`, feeding `stdin_json` on stdin.
///
/// The process runs inside `workdir` with its log root pointed at
/// `workdir/logs`, so nothing leaks outside the temp dir.
pub fn run_cli(workdir: &Path, args: &[&str], stdin_json: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_stopdigest"))
        .args(args)
        .current_dir(workdir)
        .env("CLAUDE_HOOKS_LOG_DIR", log_root(workdir))
        .env_remove("STOPDIGEST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    // The hook may exit before reading stdin (e.g. on a bad flag).
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(stdin_json.as_bytes());
    }

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

pub fn log_root(workdir: &Path) -> PathBuf {
    workdir.join("logs")
}

/// The log directory the hook resolves for `session_id`.
pub fn session_dir(workdir: &Path, session_id: &str) -> PathBuf {
    log_root(workdir).join(session_id)
}

/// A fresh, unique session id.
pub fn new_session_id() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}

/// Write `lines` as a JSONL transcript inside `workdir` and return its path.
pub fn write_transcript(workdir: &Path, lines: &[&str]) -> PathBuf {
    let path = workdir.join("transcript.jsonl");
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn envelope(session_id: &str, transcript_path: &Path) -> String {
    serde_json::json!({
        "session_id": session_id,
        "transcript_path": transcript_path,
        "cwd": "/tmp",
        "permission_mode": "default",
        "hook_event_name": "Stop",
        "stop_hook_active": false
    })
    .to_string()
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
