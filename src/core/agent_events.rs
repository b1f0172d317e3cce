//! Decoding of the agent runtime's own event stream.
//!
//! `agentcore invoke` prints the runtime's SSE frames verbatim: text arrives as
//! `contentBlockDelta` events and a `messageStop` event closes the message.
//! Any other event kind (metadata, tool use, ...) carries no answer text.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const DATA_PREFIX: &str = "data: ";

static DELTA_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""contentBlockDelta":\s*\{"delta":\s*\{"text":\s*"((?:[^"\\]|\\.)*)""#)
        .expect("delta pattern")
});

static MESSAGE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"message":[^}]+?"text":\s*"((?:[^"\\]|\\.)+)""#).expect("message pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentLine {
    /// A fragment of answer text.
    Delta(String),
    /// End of the assistant message.
    Stop,
    /// A plain line from a CLI that does not frame its output.
    Text(String),
    /// An event without answer text, or a blank line.
    Ignored,
}

pub fn decode_line(line: &str) -> AgentLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return AgentLine::Ignored;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return AgentLine::Text(line.to_string());
    };

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return AgentLine::Ignored,
    };

    match &value {
        Value::String(text) => AgentLine::Delta(text.clone()),
        Value::Object(map) => {
            let Some(event) = map.get("event") else {
                return AgentLine::Ignored;
            };
            if let Some(text) = event
                .pointer("/contentBlockDelta/delta/text")
                .and_then(Value::as_str)
            {
                AgentLine::Delta(text.to_string())
            } else if event.get("messageStop").is_some() {
                AgentLine::Stop
            } else {
                AgentLine::Ignored
            }
        }
        _ => AgentLine::Ignored,
    }
}

/// Reduce complete agent output to the answer text.
///
/// Text accumulated up to the first `messageStop` wins; without one, all
/// accumulated deltas are used. Output without line framing goes through
/// [`extract_text_from_raw`] and is otherwise returned trimmed.
pub fn collect_text(output: &str) -> String {
    let mut current = String::new();
    let mut plain = Vec::new();
    let mut saw_event = false;

    for line in output.lines() {
        match decode_line(line) {
            AgentLine::Delta(text) => {
                saw_event = true;
                current.push_str(&text);
            }
            AgentLine::Stop => return current,
            AgentLine::Text(text) => plain.push(text),
            AgentLine::Ignored => {
                if line.starts_with(DATA_PREFIX) {
                    saw_event = true;
                }
            }
        }
    }

    if saw_event {
        return current;
    }
    extract_text_from_raw(output).unwrap_or_else(|| plain.join("\n").trim().to_string())
}

/// Regex fallback for output that is not line framed, such as a JSON dump of
/// the whole event stream.
pub fn extract_text_from_raw(output: &str) -> Option<String> {
    let deltas: String = DELTA_TEXT
        .captures_iter(output)
        .map(|caps| unescape_json_string(&caps[1]))
        .collect();

    if !deltas.is_empty() {
        return Some(decode_html_entities(&deltas).trim().to_string());
    }

    MESSAGE_TEXT
        .captures(output)
        .map(|caps| unescape_json_string(&caps[1]))
        .filter(|text| !text.trim().is_empty())
}

fn unescape_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

pub fn decode_html_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
