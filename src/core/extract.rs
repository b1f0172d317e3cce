//! Post-processing of agent answers.
//!
//! The agent answers in free text, sometimes echoing tool output as JSON. The
//! helpers here strip tool echoes from text meant for people and scrape chart
//! series and filing lists out of the JSON fragments.
//!
//! Regexes only locate candidate fragments. Each fragment is then delimited
//! by parsing one JSON value from its opening brace, so nested objects inside
//! a payload never cut the match short.

use crate::domain::model::{Filing, FilingSet, PeerAnalysis};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Tool output shorter than this after the JSON block is not treated as analysis.
const MIN_ANALYSIS_CHARS: usize = 50;
/// Upper bound on opening braces tried when looking for an enclosing object.
const MAX_OBJECT_CANDIDATES: usize = 64;

static DATA_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DATA:\s*").expect("data marker pattern"));
static DATA_BLOCK_LAZY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^DATA:\s*\{.*?\}").expect("data block pattern"));
static FILINGS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""filings"\s*:\s*\["#).expect("filings pattern"));
static CHART_DATA_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""data"\s*:\s*\["#).expect("chart data pattern"));
static BANK_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^}]*"Bank"\s*:\s*"[^"]*"[^}]*\}[,\s]*"#).expect("bank object pattern")
});
static EMPTY_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\]").expect("empty array pattern"));
static ARRAY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[|\]\s*$").expect("bracket pattern"));
static NO_ACCESS_PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^I don't have access to (?:a |an |the )?\w+.*?(?:tool|function).*?(?:\.|However,|But)\s*",
    )
    .expect("preamble pattern")
});
static LET_ME_LINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:Now let|Let) me (?:gather|get|fetch).*?:\s*").expect("let-me pattern")
});

static MD_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").expect("bold pattern"));
static MD_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("italic pattern"));
static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+[ \t]+").expect("heading pattern"));
static MD_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*•][ \t]+").expect("bullet pattern"));
static MD_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+\.[ \t]+").expect("numbered pattern"));
static MD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Z][^:\n]{0,40}:[ \t]*").expect("label pattern"));
static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern"));

/// Parse one JSON object starting at `from` (leading whitespace allowed).
///
/// Returns the value and the byte offset just past its closing brace.
pub fn first_json_object(text: &str, from: usize) -> Option<(Value, usize)> {
    let rest = text.get(from..)?;
    let start = from + (rest.len() - rest.trim_start().len());
    if !text[start..].starts_with('{') {
        return None;
    }

    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Some((value, start + values.byte_offset())),
        _ => None,
    }
}

/// Find the innermost JSON object that encloses `key_pos` and has `key` at
/// its top level. Returns the object and its byte span.
fn enclosing_object(text: &str, key_pos: usize, key: &str) -> Option<(Value, usize, usize)> {
    text[..key_pos]
        .rmatch_indices('{')
        .take(MAX_OBJECT_CANDIDATES)
        .find_map(|(start, _)| {
            let (value, end) = first_json_object(text, start)?;
            (end > key_pos && value.get(key).is_some()).then_some((value, start, end))
        })
}

/// First `count` characters of `text`, for log lines and error messages.
pub fn preview(text: &str, count: usize) -> String {
    text.chars().take(count).collect()
}

/// Remove `DATA: {...}` tool echoes and the whitespace that follows them.
pub fn strip_data_lines(text: &str) -> String {
    if !text.contains("DATA:") {
        return text.trim().to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for marker in DATA_MARKER.find_iter(text) {
        if marker.start() < cursor {
            continue;
        }
        let end = match first_json_object(text, marker.end()) {
            Some((_, end)) => end,
            None => match DATA_BLOCK_LAZY.find(&text[marker.start()..]) {
                Some(block) => marker.start() + block.end(),
                None => continue,
            },
        };
        out.push_str(&text[cursor..marker.start()]);
        cursor = end + (text[end..].len() - text[end..].trim_start().len());
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}

/// Clean an answer meant to be shown as chat text.
pub fn clean_chat_response(text: &str) -> String {
    let stripped = strip_data_lines(text);
    let without_preamble = NO_ACCESS_PREAMBLE.replace(&stripped, "");
    let cleaned = LET_ME_LINES.replace_all(&without_preamble, "");
    cleaned.trim().to_string()
}

fn filing_from_value(value: &Value) -> Filing {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Filing {
        form: field("form_type"),
        filing_date: field("filing_date"),
        accession: field("accession_number"),
        url: field("url"),
    }
}

fn filings_in(value: &Value, key: &str) -> Vec<Filing> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(filing_from_value).collect())
        .unwrap_or_default()
}

/// Scrape 10-K / 10-Q filing lists out of an agent answer.
pub fn extract_sec_filings(text: &str) -> FilingSet {
    let mut set = FilingSet {
        response: text.to_string(),
        ..Default::default()
    };

    for marker in DATA_MARKER.find_iter(text) {
        if let Some((value, _)) = first_json_object(text, marker.end()) {
            if value.get("10-K").is_some() || value.get("10-Q").is_some() {
                set.ten_k = filings_in(&value, "10-K");
                set.ten_q = filings_in(&value, "10-Q");
                return set;
            }
        }
    }

    if let Some(key) = FILINGS_KEY.find(text) {
        if let Some((value, _, _)) = enclosing_object(text, key.start(), "filings") {
            if let Some(filings) = value.get("filings").and_then(Value::as_array) {
                for filing in filings.iter().map(filing_from_value) {
                    match filing.form.as_str() {
                        "10-K" => set.ten_k.push(filing),
                        "10-Q" => set.ten_q.push(filing),
                        _ => {}
                    }
                }
                return set;
            }
        }
    }

    tracing::debug!("No SEC filings found in agent response");
    set
}

fn is_tool_output(value: &Value) -> bool {
    value.get("data").map(Value::is_array).unwrap_or(false)
        && ["base_bank", "peer_banks", "analysis", "source"]
            .iter()
            .all(|key| value.get(*key).is_some())
}

/// Split a peer comparison answer into its chart series and analysis text.
pub fn extract_peer_analysis(text: &str, base_bank: &str, peer_banks: &[String]) -> PeerAnalysis {
    let mut chart_data: Vec<Value> = Vec::new();
    let mut analysis = String::new();

    // Tool output echoed verbatim, followed by the expanded analysis.
    for key in CHART_DATA_KEY.find_iter(text) {
        let Some((value, _, end)) = enclosing_object(text, key.start(), "data") else {
            continue;
        };
        if !is_tool_output(&value) {
            continue;
        }
        if let Some(Value::Array(items)) = value.get("data") {
            chart_data = items.clone();
        }
        analysis = text[end..].trim().to_string();
        if analysis.chars().count() < MIN_ANALYSIS_CHARS {
            analysis = value
                .get("analysis")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
        tracing::debug!(
            "Extracted {} chart records, analysis length {}",
            chart_data.len(),
            analysis.len()
        );
        break;
    }

    // Any single line holding an object with a non-empty data array.
    if chart_data.is_empty() {
        for line in text.lines() {
            if !line.trim_start().starts_with('{') || !line.contains("\"data\"") {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if let Some(items) = value.get("data").and_then(Value::as_array) {
                if !items.is_empty() {
                    chart_data = items.clone();
                    analysis = text.replacen(line, "", 1).trim().to_string();
                    tracing::debug!("Extracted {} chart records from a single line", chart_data.len());
                    break;
                }
            }
        }
    }

    if analysis.contains("\"Bank\"") {
        let without_points = BANK_OBJECT.replace_all(&analysis, "");
        let without_empty = EMPTY_ARRAY.replace_all(&without_points, "");
        analysis = ARRAY_BRACKETS
            .replace_all(&without_empty, "")
            .trim()
            .to_string();
    }

    if chart_data.is_empty() {
        tracing::warn!(
            "No chart data extracted. Response preview: {}",
            preview(text, 200)
        );
    }

    if analysis.is_empty() {
        analysis = text.to_string();
    }

    PeerAnalysis {
        data: chart_data,
        analysis,
        base_bank: base_bank.to_string(),
        peer_banks: peer_banks.to_vec(),
    }
}

/// Flatten markdown formatting into plain prose.
pub fn strip_markdown(text: &str) -> String {
    let text = MD_BOLD.replace_all(text, "$1");
    let text = MD_ITALIC.replace_all(&text, "$1");
    let text = MD_HEADING.replace_all(&text, "");
    let text = MD_BULLET.replace_all(&text, "");
    let text = MD_NUMBERED.replace_all(&text, "");
    let text = MD_LABEL.replace_all(&text, "");
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
