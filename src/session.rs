use crate::config::Config;
use crate::extract::extract_session_info;
use crate::render::SummaryReport;
use crate::transcript::{read_transcript, Transcript};
use crate::types::{StopFlags, StopInput};
use anyhow::{Context, Result};
use chrono::Local;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const ARCHIVE_FILE: &str = "stop.json";
const ARCHIVE_LOCK_FILE: &str = "stop.json.lock";
const CHAT_FILE: &str = "chat.json";
const SUMMARY_TEXT_FILE: &str = "session_summary.txt";
const SUMMARY_JSON_FILE: &str = "session_summary.json";

/// Serialize `value` as pretty JSON and overwrite `path` with it.
fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Map a session id onto a single, safe path component.
///
/// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so distinct ids
/// always get distinct directories.
fn session_dir_name(session_id: &str) -> String {
    if session_id.is_empty() || session_id == "." || session_id == ".." {
        return "unknown".into();
    }
    let mut name = String::with_capacity(session_id.len());
    for &b in session_id.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            name.push(char::from(b));
        } else {
            name.push_str(&format!("%{b:02X}"));
        }
    }
    name
}

/// Exclusive advisory lock on the envelope archive. Released on drop.
struct ArchiveLock {
    _file: File,
}

/// The log directory of one session and everything written into it.
pub struct Session {
    dir: PathBuf,
    session_id: String,
}

impl Session {
    /// Resolve `<log_dir>/<session_id>` and create it if needed.
    pub fn open(config: &Config, session_id: &str) -> Result<Self> {
        let dir = config.log_dir.join(session_dir_name(session_id));
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir,
            session_id: session_id.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ---------------------------------------------------------------
    // Envelope archive
    // ---------------------------------------------------------------

    fn lock_archive(&self) -> Result<ArchiveLock> {
        let path = self.dir.join(ARCHIVE_LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking {}", path.display()))?;
        Ok(ArchiveLock { _file: file })
    }

    /// Append the raw envelope to `stop.json`, returning the number of
    /// envelopes now archived.
    ///
    /// The archive is a JSON array rewritten in full. Concurrent hook runs
    /// for the same session serialize on `stop.json.lock`. An archive that
    /// can't be parsed as an array is started over.
    pub fn archive_envelope(&self, envelope: &serde_json::Value) -> Result<usize> {
        let _lock = self.lock_archive()?;
        let path = self.dir.join(ARCHIVE_FILE);

        let mut entries = match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<serde_json::Value>(&s) {
                Ok(serde_json::Value::Array(items)) => items,
                Ok(_) => {
                    tracing::warn!(
                        path = %path.display(),
                        "archive is not a JSON array, starting over"
                    );
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "archive unreadable, starting over"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };

        entries.push(envelope.clone());
        write_json_file(&path, &entries)?;
        Ok(entries.len())
    }

    // ---------------------------------------------------------------
    // Transcript artifacts
    // ---------------------------------------------------------------

    /// Copy the parsed transcript records to `chat.json`.
    pub fn write_chat(&self, transcript: &Transcript) -> Result<()> {
        write_json_file(&self.dir.join(CHAT_FILE), transcript.records())
    }

    /// Write the rendered report to `session_summary.txt` and its structured
    /// snapshot to `session_summary.json`, overwriting both.
    pub fn write_summary(&self, report: &SummaryReport, text: &str) -> Result<()> {
        let path = self.dir.join(SUMMARY_TEXT_FILE);
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        write_json_file(&self.dir.join(SUMMARY_JSON_FILE), &report.snapshot())
    }

    // ---------------------------------------------------------------
    // Hook handler
    // ---------------------------------------------------------------

    /// Archive the envelope, then run the transcript steps `flags` ask for.
    ///
    /// Returns the rendered summary when one was produced. A missing or
    /// empty transcript skips the transcript steps without error.
    pub fn handle_stop(
        &self,
        input: &StopInput,
        raw: &serde_json::Value,
        flags: StopFlags,
    ) -> Result<Option<String>> {
        let archived = self.archive_envelope(raw)?;
        tracing::debug!(session_id = %self.session_id, archived, "envelope archived");

        let Some(transcript_path) = input.transcript_path().map(Path::new) else {
            return Ok(None);
        };
        if !transcript_path.exists() {
            tracing::debug!(path = %transcript_path.display(), "transcript not found");
            return Ok(None);
        }
        if !flags.chat && !flags.summary {
            return Ok(None);
        }

        let transcript = read_transcript(transcript_path);
        tracing::debug!(records = transcript.len(), "transcript read");
        if transcript.is_empty() {
            return Ok(None);
        }

        if flags.chat {
            self.write_chat(&transcript)?;
        }
        if !flags.summary {
            return Ok(None);
        }

        let info = extract_session_info(transcript.records());
        let report = SummaryReport::new(info, Local::now());
        let text = report.render();
        self.write_summary(&report, &text)?;
        tracing::debug!(
            session_id = %self.session_id,
            messages = report.info().total_messages,
            "summary written"
        );
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_in(root: &Path, session_id: &str) -> Session {
        let config = Config {
            log_dir: root.to_path_buf(),
        };
        Session::open(&config, session_id).unwrap()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn session_dir_name_passes_plain_ids() {
        assert_eq!(session_dir_name("abc-123_x.y"), "abc-123_x.y");
    }

    #[test]
    fn session_dir_name_escapes_separators() {
        assert_eq!(session_dir_name("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(session_dir_name("a\\b c"), "a%5Cb%20c");
        assert_eq!(session_dir_name("50%"), "50%25");
    }

    #[test]
    fn session_dir_name_keeps_distinct_ids_apart() {
        assert_ne!(session_dir_name("a/b"), session_dir_name("a_b"));
        assert_ne!(session_dir_name("é"), session_dir_name("ü"));
        assert_ne!(session_dir_name("a%2Fb"), session_dir_name("a/b"));
    }

    #[test]
    fn session_dir_name_rejects_dot_components() {
        assert_eq!(session_dir_name(".."), "unknown");
        assert_eq!(session_dir_name("."), "unknown");
        assert_eq!(session_dir_name(""), "unknown");
    }

    #[test]
    fn open_creates_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(&root.path().join("nested/logs"), "s1");
        assert!(session.dir().is_dir());
        assert_eq!(session.dir(), root.path().join("nested/logs/s1"));
    }

    #[test]
    fn archive_appends_envelopes() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        let first = json!({ "session_id": "s1", "n": 1 });
        let second = json!({ "session_id": "s1", "n": 2 });
        assert_eq!(session.archive_envelope(&first).unwrap(), 1);
        assert_eq!(session.archive_envelope(&second).unwrap(), 2);

        let archive = read_json(&session.dir().join(ARCHIVE_FILE));
        assert_eq!(
            archive,
            json!([{ "session_id": "s1", "n": 1 }, { "session_id": "s1", "n": 2 }])
        );
    }

    #[test]
    fn archive_starts_over_when_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        fs::write(session.dir().join(ARCHIVE_FILE), "{ not json").unwrap();
        assert_eq!(session.archive_envelope(&json!({ "n": 1 })).unwrap(), 1);
        assert_eq!(read_json(&session.dir().join(ARCHIVE_FILE)), json!([{ "n": 1 }]));
    }

    #[test]
    fn archive_starts_over_when_not_an_array() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        fs::write(session.dir().join(ARCHIVE_FILE), r#"{"n": 0}"#).unwrap();
        assert_eq!(session.archive_envelope(&json!({ "n": 1 })).unwrap(), 1);
    }

    #[test]
    fn archive_is_pretty_printed() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        session.archive_envelope(&json!({ "n": 1 })).unwrap();
        let text = fs::read_to_string(session.dir().join(ARCHIVE_FILE)).unwrap();
        assert!(text.contains("\n  {"), "expected 2-space indent, got: {text}");
    }

    #[test]
    fn write_chat_copies_records() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        let (transcript, _) = Transcript::parse("{\"a\":1}\n7\n");
        session.write_chat(&transcript).unwrap();
        assert_eq!(read_json(&session.dir().join(CHAT_FILE)), json!([{ "a": 1 }, 7]));
    }

    #[test]
    fn write_summary_overwrites_both_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        fs::write(session.dir().join(SUMMARY_TEXT_FILE), "stale report that is much longer")
            .unwrap();

        let info = extract_session_info(&[json!({ "type": "human", "content": "hi" })]);
        let report = SummaryReport::new(info, Local::now());
        let text = report.render();
        session.write_summary(&report, &text).unwrap();

        assert_eq!(fs::read_to_string(session.dir().join(SUMMARY_TEXT_FILE)).unwrap(), text);
        let snapshot = read_json(&session.dir().join(SUMMARY_JSON_FILE));
        assert!(snapshot["generated_at"].is_string());
        assert_eq!(snapshot["info"]["user_prompts"], json!(["hi"]));
        assert_eq!(snapshot["info"]["total_messages"], json!(1));
    }

    #[test]
    fn handle_stop_without_transcript_only_archives() {
        let root = tempfile::tempdir().unwrap();
        let session = session_in(root.path(), "s1");
        let missing = root.path().join("missing.jsonl");
        let raw = json!({ "session_id": "s1", "transcript_path": missing });
        let input = StopInput::from_value(&raw).unwrap();
        let flags = StopFlags { chat: true, summary: true };

        assert_eq!(session.handle_stop(&input, &raw, flags).unwrap(), None);
        assert!(session.dir().join(ARCHIVE_FILE).exists());
        assert!(!session.dir().join(CHAT_FILE).exists());
        assert!(!session.dir().join(SUMMARY_TEXT_FILE).exists());
        assert!(!session.dir().join(SUMMARY_JSON_FILE).exists());
    }

    #[test]
    fn handle_stop_with_summary_returns_report() {
        let root = tempfile::tempdir().unwrap();
        let transcript = root.path().join("t.jsonl");
        fs::write(
            &transcript,
            concat!(
                r#"{"type":"human","content":"add logging"}"#, "\n",
                r#"{"type":"tool_use","name":"Edit","input":{"file_path":"/src/main.rs"}}"#, "\n",
            ),
        )
        .unwrap();
        let session = session_in(root.path(), "s1");
        let raw = json!({ "session_id": "s1", "transcript_path": transcript });
        let input = StopInput::from_value(&raw).unwrap();
        let flags = StopFlags { chat: false, summary: true };

        let text = session.handle_stop(&input, &raw, flags).unwrap().expect("summary text");
        assert!(text.contains("  1. add logging"));
        assert!(text.contains("/src/main.rs"));
        assert!(!session.dir().join(CHAT_FILE).exists());
        assert!(session.dir().join(SUMMARY_JSON_FILE).exists());
    }

    #[test]
    fn handle_stop_chat_only_writes_no_summary() {
        let root = tempfile::tempdir().unwrap();
        let transcript = root.path().join("t.jsonl");
        fs::write(&transcript, "{\"role\":\"user\",\"content\":\"hi\"}\n").unwrap();
        let session = session_in(root.path(), "s1");
        let raw = json!({ "session_id": "s1", "transcript_path": transcript });
        let input = StopInput::from_value(&raw).unwrap();
        let flags = StopFlags { chat: true, summary: false };

        assert_eq!(session.handle_stop(&input, &raw, flags).unwrap(), None);
        assert_eq!(
            read_json(&session.dir().join(CHAT_FILE)),
            json!([{ "role": "user", "content": "hi" }])
        );
        assert!(!session.dir().join(SUMMARY_TEXT_FILE).exists());
    }

    #[test]
    fn handle_stop_empty_transcript_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let transcript = root.path().join("t.jsonl");
        fs::write(&transcript, "not json\n\n").unwrap();
        let session = session_in(root.path(), "s1");
        let raw = json!({ "session_id": "s1", "transcript_path": transcript });
        let input = StopInput::from_value(&raw).unwrap();
        let flags = StopFlags { chat: true, summary: true };

        assert_eq!(session.handle_stop(&input, &raw, flags).unwrap(), None);
        assert!(!session.dir().join(CHAT_FILE).exists());
        assert!(!session.dir().join(SUMMARY_TEXT_FILE).exists());
    }
}
