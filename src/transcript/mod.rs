use std::fs;
use std::path::Path;

// ===================================================================
// Transcript — parsed JSONL, one raw JSON value per line
// ===================================================================

/// A parsed session transcript.
///
/// Producers are heterogeneous (chat turns, tool invocations, tool results),
/// so records are kept as raw JSON values in file order. Classification
/// happens later, in `extract`.
#[derive(Debug, Default)]
pub struct Transcript {
    records: Vec<serde_json::Value>,
}

impl Transcript {
    /// An empty transcript (no records).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSONL transcript string. Returns the transcript and any
    /// lines that failed to parse (with 1-based line number and error).
    ///
    /// Blank lines are ignored. Any JSON value is a valid record, objects
    /// or not.
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        Self::parse_bytes(contents.as_bytes())
    }

    /// Like [`Transcript::parse`], but over raw bytes. A line that isn't
    /// valid UTF-8 is reported like any other malformed line.
    pub fn parse_bytes(contents: &[u8]) -> (Self, Vec<(usize, String)>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for (i, line) in contents.split(|&b| b == b'\n').enumerate() {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<serde_json::Value>(line) {
                Ok(val) => records.push(val),
                Err(e) => errors.push((i + 1, format!("{e}"))),
            }
        }

        (Self { records }, errors)
    }

    /// All records in file order.
    pub fn records(&self) -> &[serde_json::Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read and parse the transcript at `path`.
///
/// A file that can't be read yields an empty transcript; malformed lines are
/// skipped. Neither is an error for the caller.
pub fn read_transcript(path: &Path) -> Transcript {
    let contents = match fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript unreadable");
            return Transcript::empty();
        }
    };
    let (transcript, errors) = Transcript::parse_bytes(&contents);
    for (line, err) in &errors {
        tracing::debug!(line, error = %err, "skipping malformed transcript line");
    }
    transcript
}
