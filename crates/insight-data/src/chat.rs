//! Chat transcript parsing.
//!
//! Two transcript layouts are understood:
//!
//! * dated blocks, `2024-05-01 18:04:12 From Bob to Everyone:` followed by
//!   the message body on the next line(s);
//! * single lines, `18:04:12 From Bob to Everyone: message`.
//!
//! Both are tried against the whole input and the one producing more
//! non-empty messages is used.

use std::path::Path;
use std::sync::OnceLock;

use insight_core::error::InsightError;
use insight_core::exclusion::ExclusionPolicy;
use insight_core::models::ChatMessage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Transcript layout detected for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFormat {
    /// Date and time header line, body on the following line(s).
    DatedBlock,
    /// Time, sender, recipient and body on one line.
    SingleLine,
}

/// Parsed chat transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    /// Messages in transcript order, internal senders removed.
    pub messages: Vec<ChatMessage>,
    /// `None` when neither layout matched anything.
    pub format: Option<ChatFormat>,
    /// Messages dropped because the sender is an internal account.
    pub excluded_messages: usize,
}

impl ChatLog {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn question_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_question).count()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse a chat transcript. Never fails: text matching neither layout yields
/// an empty log.
pub fn load_chat(raw_text: &str, exclusions: &ExclusionPolicy) -> ChatLog {
    let dated = parse_dated_blocks(raw_text);
    let single = parse_single_lines(raw_text);
    debug!(
        dated = dated.len(),
        single_line = single.len(),
        "Chat layout candidates"
    );

    let (format, candidates) = if dated.is_empty() && single.is_empty() {
        (None, Vec::new())
    } else if dated.len() >= single.len() {
        (Some(ChatFormat::DatedBlock), dated)
    } else {
        (Some(ChatFormat::SingleLine), single)
    };

    let total = candidates.len();
    let messages: Vec<ChatMessage> = candidates
        .into_iter()
        .filter(|m| !exclusions.is_excluded_sender(&m.sender_name))
        .collect();
    let excluded_messages = total - messages.len();

    let log = ChatLog {
        messages,
        format,
        excluded_messages,
    };
    info!(
        excluded = log.excluded_messages,
        questions = log.question_count(),
        "Loaded {} chat messages",
        log.len()
    );
    log
}

/// Read and parse a chat transcript from disk.
pub fn load_chat_file(path: &Path, exclusions: &ExclusionPolicy) -> Result<ChatLog, InsightError> {
    let text = crate::read_source_lossy(path)?;
    Ok(load_chat(&text, exclusions))
}

// ── Layouts ───────────────────────────────────────────────────────────────────

fn dated_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(\d{4}-\d{2}-\d{2}[ \t]+\d{1,2}:\d{2}:\d{2})[ \t]+From[ \t]+(.+?)[ \t]+to[ \t]+(.+?):",
        )
        .expect("regex is valid")
    })
}

fn single_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(\d{1,2}:\d{2}:\d{2})[ \t]+From[ \t]+(.+?)[ \t]+to[ \t]+(.+?):[ \t]*(.*)$",
        )
        .expect("regex is valid")
    })
}

/// Body of each dated block runs until the next header.
fn parse_dated_blocks(text: &str) -> Vec<ChatMessage> {
    let headers: Vec<regex::Captures<'_>> = dated_header().captures_iter(text).collect();
    let mut messages = Vec::new();

    for (i, caps) in headers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let message = ChatMessage::new(
            &caps[1],
            caps[2].trim(),
            caps[3].trim(),
            &text[whole.end()..body_end],
        );
        if !message.text.is_empty() {
            messages.push(message);
        }
    }
    messages
}

fn parse_single_lines(text: &str) -> Vec<ChatMessage> {
    single_line()
        .captures_iter(text)
        .map(|caps| ChatMessage::new(&caps[1], caps[2].trim(), caps[3].trim(), &caps[4]))
        .filter(|m| !m.text.is_empty())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
