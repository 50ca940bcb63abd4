// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message fields from gateway webhook payloads.
//!
//! Gateways disagree on payload shape. Flat payloads carry `from`, `body`
//! and `timestamp`; Baileys-style payloads nest them under `key` and
//! `message`. Both are accepted.

use serde_json::Value;

use courier_core::InboundMessage;

/// Send times below this are taken to be in seconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn str_at<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn bool_at(payload: &Value, pointer: &str) -> Option<bool> {
    payload.pointer(pointer).and_then(Value::as_bool)
}

fn message_id(payload: &Value) -> Option<String> {
    match payload.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Object(id)) => id
            .get("_serialized")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => str_at(payload, "/key/id").map(str::to_string),
    }
}

fn sent_at_ms(payload: &Value) -> Option<i64> {
    let raw = match payload.get("timestamp")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    if raw <= 0 {
        return None;
    }
    Some(if raw < MILLIS_THRESHOLD {
        raw.saturating_mul(1_000)
    } else {
        raw
    })
}

/// Extracts the message from a `message*` webhook payload.
///
/// Returns `None` when the chat id or a non-blank body is missing.
pub fn extract_message(payload: &Value) -> Option<InboundMessage> {
    let chat_id = str_at(payload, "/from").or_else(|| str_at(payload, "/key/remoteJid"))?;
    let body = str_at(payload, "/body")
        .or_else(|| str_at(payload, "/message/conversation"))
        .or_else(|| str_at(payload, "/message/extendedTextMessage/text"))?;
    if body.trim().is_empty() {
        return None;
    }

    Some(InboundMessage {
        id: message_id(payload),
        chat_id: chat_id.to_string(),
        body: body.to_string(),
        sent_at_ms: sent_at_ms(payload),
        from_me: bool_at(payload, "/fromMe")
            .or_else(|| bool_at(payload, "/key/fromMe"))
            .unwrap_or(false),
        has_media: bool_at(payload, "/hasMedia").unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_payload() {
        let msg = extract_message(&json!({
            "id": "true_5511@c.us_ABC",
            "from": "5511@c.us",
            "body": "Hi",
            "timestamp": 1_700_000_000,
            "fromMe": false,
            "hasMedia": true
        }))
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("true_5511@c.us_ABC"));
        assert_eq!(msg.chat_id, "5511@c.us");
        assert_eq!(msg.body, "Hi");
        assert_eq!(msg.sent_at_ms, Some(1_700_000_000_000));
        assert!(msg.has_media);
        assert!(!msg.from_me);
    }

    #[test]
    fn nested_payload() {
        let msg = extract_message(&json!({
            "key": {"id": "3EB0", "remoteJid": "5511@s.whatsapp.net", "fromMe": true},
            "message": {"conversation": "hello"},
            "timestamp": "1700000000123"
        }))
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("3EB0"));
        assert_eq!(msg.chat_id, "5511@s.whatsapp.net");
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.sent_at_ms, Some(1_700_000_000_123));
        assert!(msg.from_me);
    }

    #[test]
    fn serialized_id_object() {
        let msg = extract_message(&json!({
            "id": {"_serialized": "false_5511@c.us_XYZ"},
            "from": "5511@c.us",
            "body": "x"
        }))
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("false_5511@c.us_XYZ"));
        assert_eq!(msg.sent_at_ms, None);
    }

    #[test]
    fn missing_chat_or_body_is_rejected() {
        assert!(extract_message(&json!({"body": "Hi"})).is_none());
        assert!(extract_message(&json!({"from": "5511@c.us"})).is_none());
        assert!(extract_message(&json!({"from": "5511@c.us", "body": "   "})).is_none());
        assert!(extract_message(&Value::Null).is_none());
    }
}
