use serde::Deserialize;

fn default_session_id() -> String {
    "unknown".into()
}

// ===================================================================
// Hook input (received via stdin, snake_case JSON)
// ===================================================================

/// The Stop hook envelope.
///
/// Only the fields this hook acts on are decoded; the raw JSON value is what
/// gets archived, so anything else the host sends is preserved there and
/// never fails decoding, whatever its type.
#[derive(Debug, Clone, Deserialize)]
pub struct StopInput {
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

impl StopInput {
    /// Decode the typed view from the raw envelope.
    pub fn from_value(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }

    /// The transcript path, treating an empty string as absent.
    pub fn transcript_path(&self) -> Option<&str> {
        self.transcript_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Which optional steps run after the envelope is archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopFlags {
    /// Copy the parsed transcript to `chat.json`.
    pub chat: bool,
    /// Extract, render and persist the session summary.
    pub summary: bool,
}
