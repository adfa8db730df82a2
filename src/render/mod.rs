use crate::extract::SessionInfo;
use chrono::{DateTime, Local};
use serde::Serialize;

const BANNER_WIDTH: usize = 60;

const SHOWN_PROMPTS: usize = 5;
const SHOWN_FILES: usize = 10;
const SHOWN_COMMANDS: usize = 5;
const SHOWN_ERRORS: usize = 3;
const ERROR_DISPLAY_CHARS: usize = 100;

// ===================================================================
// SummaryReport — one rendering of a SessionInfo
// ===================================================================

/// The accumulated facts of one session plus the moment they were rendered.
/// Built once per invocation and never reused.
#[derive(Debug)]
pub struct SummaryReport {
    generated_at: DateTime<Local>,
    info: SessionInfo,
}

/// Structured form of a report, written as `session_summary.json`.
#[derive(Debug, Serialize)]
pub struct SummarySnapshot<'a> {
    pub generated_at: String,
    pub info: &'a SessionInfo,
}

impl SummaryReport {
    pub fn new(info: SessionInfo, generated_at: DateTime<Local>) -> Self {
        Self { generated_at, info }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Text form of the report.
    pub fn render(&self) -> String {
        render_summary(&self.info, &self.generated_at)
    }

    /// Structured form: RFC 3339 timestamp plus the full `SessionInfo`.
    pub fn snapshot(&self) -> SummarySnapshot<'_> {
        SummarySnapshot {
            generated_at: self.generated_at.to_rfc3339(),
            info: &self.info,
        }
    }
}

// ===================================================================
// Text rendering
// ===================================================================

/// Render the fixed-layout text report. Every section except Statistics is
/// omitted when its source list is empty.
pub fn render_summary(info: &SessionInfo, generated_at: &DateTime<Local>) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut lines: Vec<String> = vec![
        banner.clone(),
        "SESSION SUMMARY".into(),
        banner.clone(),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    if !info.user_prompts.is_empty() {
        lines.push("## What Was Requested".into());
        for (i, prompt) in info.user_prompts.iter().take(SHOWN_PROMPTS).enumerate() {
            let clean = prompt.replace('\n', " ");
            lines.push(format!("  {}. {}", i + 1, clean.trim()));
        }
        push_remainder(&mut lines, info.user_prompts.len(), SHOWN_PROMPTS, "prompts");
        lines.push(String::new());
    }

    if !info.files_modified.is_empty() {
        lines.push("## Files Modified".into());
        for file in info.files_modified.iter().take(SHOWN_FILES) {
            lines.push(format!("  ✏️  {file}"));
        }
        push_remainder(&mut lines, info.files_modified.len(), SHOWN_FILES, "files");
        lines.push(String::new());
    }

    if !info.tools_used.is_empty() {
        lines.push("## Tools Used".into());
        lines.push(format!("  {}", info.tools_used.join(", ")));
        lines.push(String::new());
    }

    if !info.commands_run.is_empty() {
        lines.push("## Commands Executed".into());
        for cmd in info.commands_run.iter().take(SHOWN_COMMANDS) {
            lines.push(format!("  $ {cmd}"));
        }
        push_remainder(&mut lines, info.commands_run.len(), SHOWN_COMMANDS, "commands");
        lines.push(String::new());
    }

    if !info.errors_encountered.is_empty() {
        lines.push("## Errors Encountered".into());
        for err in info.errors_encountered.iter().take(SHOWN_ERRORS) {
            let shown: String = err.chars().take(ERROR_DISPLAY_CHARS).collect();
            lines.push(format!("  ⚠️  {shown}"));
        }
        lines.push(String::new());
    }

    lines.push("## Statistics".into());
    lines.push(format!("  • Total messages: {}", info.total_messages));
    lines.push(format!("  • Files modified: {}", info.files_modified.len()));
    lines.push(format!("  • Files read: {}", info.files_read.len()));
    lines.push(format!("  • Commands run: {}", info.commands_run.len()));
    lines.push(String::new());

    lines.push(banner);
    lines.join("\n")
}

/// "  ... and N more <noun>" when `total` exceeds what was shown.
fn push_remainder(lines: &mut Vec<String>, total: usize, shown: usize, noun: &str) {
    if total > shown {
        lines.push(format!("  ... and {} more {noun}", total - shown));
    }
}
