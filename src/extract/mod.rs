use serde::Serialize;
use serde_json::{Map, Value};

// ===================================================================
// Limits applied to the accumulated facts
// ===================================================================

pub const MAX_PROMPT_CHARS: usize = 200;
pub const MAX_COMMAND_CHARS: usize = 100;
pub const MAX_ERROR_CHARS: usize = 150;

pub const MAX_FILES: usize = 20;
pub const MAX_COMMANDS: usize = 15;
pub const MAX_ERRORS: usize = 10;

/// Appended to any string cut short by `truncate`.
pub const TRUNCATION_MARKER: &str = "...";

/// Truncate a string to `max` chars, appending "..." if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &s[..byte_idx]),
    }
}

// ===================================================================
// Tool identifiers
// ===================================================================

/// The tools whose inputs feed file and command tracking. Every other tool
/// name is `Other` and only shows up in `tools_used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Write,
    Edit,
    MultiEdit,
    Read,
    Bash,
    Other,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Write" => Self::Write,
            "Edit" => Self::Edit,
            "MultiEdit" => Self::MultiEdit,
            "Read" => Self::Read,
            "Bash" => Self::Bash,
            _ => Self::Other,
        }
    }

    /// Write, Edit and MultiEdit change files on disk.
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Write | Self::Edit | Self::MultiEdit)
    }
}

// ===================================================================
// Record decoding
// ===================================================================

/// A tool invocation decoded from a record.
#[derive(Debug, PartialEq)]
pub struct ToolInvocation<'a> {
    pub name: &'a str,
    pub kind: ToolKind,
    /// `input.file_path`, falling back to `input.path`.
    pub file_path: Option<&'a str>,
    /// `input.command`, only decoded for `Bash`.
    pub command: Option<&'a str>,
}

/// The facets of a JSON-object record. They are decoded independently, so
/// one record may be a prompt, a tool call and an error source at once.
#[derive(Debug, Default, PartialEq)]
pub struct Entry<'a> {
    pub prompt: Option<&'a str>,
    pub tool: Option<ToolInvocation<'a>>,
    /// Error excerpt, already truncated to `MAX_ERROR_CHARS`.
    pub error: Option<String>,
}

/// One transcript record, classified.
#[derive(Debug, PartialEq)]
pub enum Record<'a> {
    Entry(Entry<'a>),
    /// Any non-object JSON value. Counted in `total_messages`, never
    /// classified.
    Opaque,
}

impl<'a> Record<'a> {
    pub fn decode(value: &'a Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Opaque;
        };
        let type_tag = obj.get("type").and_then(Value::as_str);
        Self::Entry(Entry {
            prompt: decode_prompt(obj, type_tag),
            tool: decode_tool(obj, type_tag),
            error: decode_error(value, obj, type_tag),
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// `type == "human"` or `role == "user"`; text from `content`, or from
/// `message` when `content` is absent. Only string content counts.
fn decode_prompt<'a>(obj: &'a Map<String, Value>, type_tag: Option<&str>) -> Option<&'a str> {
    let role = obj.get("role").and_then(Value::as_str);
    if type_tag != Some("human") && role != Some("user") {
        return None;
    }
    let content = obj.get("content").or_else(|| obj.get("message"))?;
    content.as_str().filter(|s| !s.trim().is_empty())
}

/// `type == "tool_use"` or any record carrying a `tool` key.
fn decode_tool<'a>(
    obj: &'a Map<String, Value>,
    type_tag: Option<&str>,
) -> Option<ToolInvocation<'a>> {
    if type_tag != Some("tool_use") && !obj.contains_key("tool") {
        return None;
    }
    let name = obj
        .get("name")
        .or_else(|| obj.get("tool"))?
        .as_str()
        .and_then(non_empty)?;
    let kind = ToolKind::from_name(name);

    let input = obj.get("input").and_then(Value::as_object);
    let file_path = input
        .and_then(|i| i.get("file_path").or_else(|| i.get("path")))
        .and_then(Value::as_str)
        .and_then(non_empty);
    let command = input
        .filter(|_| kind == ToolKind::Bash)
        .and_then(|i| i.get("command"))
        .and_then(Value::as_str)
        .and_then(non_empty);

    Some(ToolInvocation {
        name,
        kind,
        file_path,
        command,
    })
}

/// Scan `type == "tool_result"` records, and any record whose serialized
/// form mentions "error", for error text in `content` (or `output`).
fn decode_error(
    value: &Value,
    obj: &Map<String, Value>,
    type_tag: Option<&str>,
) -> Option<String> {
    if type_tag != Some("tool_result")
        && !value.to_string().to_lowercase().contains("error")
    {
        return None;
    }
    let content = match obj.get("content").or_else(|| obj.get("output")) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return None,
    };
    let lower = content.to_lowercase();
    if lower.contains("error") || lower.contains("failed") {
        Some(truncate(&content, MAX_ERROR_CHARS))
    } else {
        None
    }
}

// ===================================================================
// SessionInfo — accumulated facts
// ===================================================================

/// Facts accumulated over one transcript. Serialized verbatim as the `info`
/// object of `session_summary.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionInfo {
    pub user_prompts: Vec<String>,
    pub tools_used: Vec<String>,
    pub files_modified: Vec<String>,
    pub files_created: Vec<String>,
    pub files_read: Vec<String>,
    pub commands_run: Vec<String>,
    pub errors_encountered: Vec<String>,
    pub total_messages: usize,
}

/// Push a value, skipping it if already present. Keeps first-seen order.
fn push_unique(vec: &mut Vec<String>, value: &str) {
    if !vec.iter().any(|v| v == value) {
        vec.push(value.to_string());
    }
}

impl SessionInfo {
    fn absorb(&mut self, entry: Entry<'_>) {
        if let Some(prompt) = entry.prompt {
            self.user_prompts.push(truncate(prompt, MAX_PROMPT_CHARS));
        }

        if let Some(tool) = entry.tool {
            push_unique(&mut self.tools_used, tool.name);

            if let Some(path) = tool.file_path {
                if tool.kind.is_mutation() {
                    let seen = self
                        .files_modified
                        .iter()
                        .chain(&self.files_read)
                        .any(|p| p == path);
                    if tool.kind == ToolKind::Write && !seen {
                        push_unique(&mut self.files_created, path);
                    }
                    push_unique(&mut self.files_modified, path);
                } else if tool.kind == ToolKind::Read {
                    push_unique(&mut self.files_read, path);
                }
            }

            if let Some(command) = tool.command {
                self.commands_run.push(truncate(command, MAX_COMMAND_CHARS));
            }
        }

        if let Some(error) = entry.error {
            self.errors_encountered.push(error);
        }
    }

    /// Enforce the published caps. Accumulation is uncapped so that
    /// first-seen checks see every path.
    fn finalize(&mut self, total_messages: usize) {
        self.files_modified.truncate(MAX_FILES);
        self.files_created.truncate(MAX_FILES);
        self.files_read.truncate(MAX_FILES);
        self.commands_run.truncate(MAX_COMMANDS);
        self.errors_encountered.truncate(MAX_ERRORS);
        self.total_messages = total_messages;
    }
}

/// Classify every record in order and accumulate one `SessionInfo`.
/// Never fails: a record missing the fields a rule needs is skipped for
/// that rule only.
pub fn extract_session_info(records: &[Value]) -> SessionInfo {
    let mut info = SessionInfo::default();
    for record in records {
        match Record::decode(record) {
            Record::Entry(entry) => info.absorb(entry),
            Record::Opaque => {}
        }
    }
    info.finalize(records.len());
    info
}
