// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extraction of upstream JSONL conversation records.
//!
//! The upstream format is tolerated, not trusted: records are read as loose
//! JSON and mined for the fields ccdash cares about. Unknown record types
//! are skipped without error; malformed lines are reported so the sync
//! report can count them.

use ccdash_core::{Message, MessageId, Role, SessionId, TokenUsage};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// What a single log line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A conversation message worth persisting.
    Message(ParsedRecord),
    /// A summary record that closes the conversation rooted at `leaf_uuid`.
    SessionClose { leaf_uuid: MessageId },
    /// A record type ccdash does not track.
    Skipped,
    /// Unparseable JSON or a record missing required fields.
    Malformed(String),
}

/// The normalized fields of one upstream message record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub uuid: MessageId,
    pub parent_uuid: Option<MessageId>,
    pub session_id: SessionId,
    pub role: Role,
    pub model: Option<String>,
    pub content: String,
    pub usage: TokenUsage,
    pub cost: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub cwd: Option<String>,
}

impl ParsedRecord {
    /// Convert into a [`Message`] ready for insertion.
    pub fn into_message(self) -> Message {
        Message {
            id: self.uuid,
            session_id: self.session_id,
            parent_id: self.parent_uuid,
            role: self.role,
            model: self.model,
            content: self.content,
            usage: self.usage,
            cost: self.cost,
            timestamp: self.timestamp,
            window_id: None,
        }
    }
}

/// Extract a string value from a JSON object by key.
fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

fn get_u64(obj: &Value, key: &str) -> u64 {
    obj.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Parse one JSONL line.
pub fn parse_line(line: &str) -> ParsedLine {
    let json: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return ParsedLine::Malformed(format!("invalid json: {e}")),
    };

    let record_type = get_str(&json, "type").unwrap_or("");
    match record_type {
        "user" | "assistant" => parse_message(&json, record_type),
        "summary" => parse_summary(&json),
        // Hooks, progress markers, and future record types
        _ => ParsedLine::Skipped,
    }
}

fn parse_message(json: &Value, record_type: &str) -> ParsedLine {
    let Some(uuid) = get_str(json, "uuid") else {
        return ParsedLine::Malformed("message record without uuid".to_string());
    };
    let Some(session_id) = get_str(json, "sessionId") else {
        return ParsedLine::Malformed(format!("record {uuid} without sessionId"));
    };
    let Some(ts_raw) = get_str(json, "timestamp") else {
        return ParsedLine::Malformed(format!("record {uuid} without timestamp"));
    };
    let timestamp = match DateTime::parse_from_rfc3339(ts_raw) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => return ParsedLine::Malformed(format!("record {uuid} bad timestamp: {e}")),
    };
    let role = match Role::parse(record_type) {
        Some(r) => r,
        None => return ParsedLine::Skipped,
    };

    let message = json.get("message");
    let usage = message
        .and_then(|m| m.get("usage"))
        .map(|u| TokenUsage {
            input_tokens: get_u64(u, "input_tokens"),
            cache_creation_tokens: get_u64(u, "cache_creation_input_tokens"),
            cache_read_tokens: get_u64(u, "cache_read_input_tokens"),
            output_tokens: get_u64(u, "output_tokens"),
        })
        .unwrap_or_default();

    ParsedLine::Message(ParsedRecord {
        uuid: MessageId::new(uuid),
        parent_uuid: get_str(json, "parentUuid").map(MessageId::new),
        session_id: SessionId::new(session_id),
        role,
        model: message.and_then(|m| get_str(m, "model")).map(String::from),
        content: message.map(flatten_content).unwrap_or_default(),
        usage,
        cost: json.get("costUSD").and_then(|v| v.as_f64()),
        timestamp,
        cwd: get_str(json, "cwd").map(String::from),
    })
}

fn parse_summary(json: &Value) -> ParsedLine {
    match get_str(json, "leafUuid") {
        Some(leaf) => ParsedLine::SessionClose {
            leaf_uuid: MessageId::new(leaf),
        },
        // A summary without a leaf pointer carries nothing we can act on
        None => ParsedLine::Skipped,
    }
}

/// Flatten the upstream `content` field to display text.
///
/// Upstream sends either a plain string or an array of parts. Text parts are
/// taken verbatim; tool invocations and results are reduced to markers so
/// the transcript stays readable without reproducing tool payloads.
fn flatten_content(message: &Value) -> String {
    let Some(content) = message.get("content") else {
        return String::new();
    };
    if let Some(text) = content.as_str() {
        return text.to_string();
    }
    let Some(parts) = content.as_array() else {
        return String::new();
    };

    let mut out: Vec<String> = Vec::new();
    for part in parts {
        match get_str(part, "type") {
            Some("text") => {
                if let Some(text) = get_str(part, "text") {
                    out.push(text.to_string());
                }
            }
            Some("tool_use") => {
                let name = get_str(part, "name").unwrap_or("unknown");
                out.push(format!("[tool: {name}]"));
            }
            Some("tool_result") => out.push("[tool result]".to_string()),
            Some("thinking") => {
                if let Some(text) = get_str(part, "thinking") {
                    out.push(text.to_string());
                }
            }
            _ => {}
        }
    }
    out.join("\n")
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
