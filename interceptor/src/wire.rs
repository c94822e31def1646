//! Payload shapes of the host's list and send exchanges, and their translation into patches.
//!
//! The host is not ours: fields are optional wherever the host has been seen to omit them, and
//! the few aliases cover the naming variants it uses.

use chrono::DateTime;
use lens_core::{
    is_composite_model, GenerationSettings, LoadedMessage, MetadataPatch, ObservationError, Role,
    TimestampSource, MODEL_SEPARATOR,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Epoch values below this are seconds, not milliseconds.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    #[serde(default, alias = "author")]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub inference: Option<WireInference>,
    #[serde(default)]
    pub is_alternative: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInference {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub settings: Option<GenerationSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub settings: Option<GenerationSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    #[serde(alias = "messageId")]
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default, alias = "model")]
    pub engine: Option<String>,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<Value>,
    #[serde(default, alias = "author")]
    pub role: Option<String>,
}

/// Epoch milliseconds from an integer (ms or s), a float, a numeric string or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp_millis()),
            }
        }
        _ => return None,
    };
    if raw.unsigned_abs() < SECONDS_CUTOFF.unsigned_abs() {
        raw.checked_mul(1000)
    } else {
        Some(raw)
    }
}

/// The list endpoint only knows the actual model; a composite value is never produced from it.
fn actual_model_only(model: Option<String>) -> Option<String> {
    let model = model?;
    let actual = if is_composite_model(&model) {
        model
            .rsplit(MODEL_SEPARATOR.trim())
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        model.trim().to_string()
    };
    (!actual.is_empty()).then_some(actual)
}

/// Parses a list response body into loaded messages, keeping server order (newest first).
///
/// Messages without an id are skipped; a body that is not a message list is an error.
pub fn parse_list_response(
    body: &str,
) -> Result<(Option<String>, Vec<LoadedMessage>), ObservationError> {
    let response: ListMessagesResponse = serde_json::from_str(body)?;
    let mut loaded = Vec::with_capacity(response.messages.len());

    for raw in response.messages {
        let message: WireMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping list entry with unexpected shape");
                continue;
            }
        };
        if message.id.trim().is_empty() {
            continue;
        }

        let inference = message.inference.unwrap_or_default();
        let mut patch = MetadataPatch {
            role: message.role.as_deref().and_then(Role::from_label),
            model: actual_model_only(inference.model),
            settings: inference.settings.filter(|s| !s.is_empty()),
            is_alternative: message.is_alternative,
            ..MetadataPatch::default()
        };
        if let Some(ts) = message.created_at.as_ref().and_then(parse_timestamp) {
            patch = patch.with_timestamp(ts, TimestampSource::Listed);
        }
        loaded.push(LoadedMessage {
            message_id: message.id,
            patch,
        });
    }

    Ok((response.conversation_id, loaded))
}

pub fn parse_send_request(body: &str) -> Result<SendMessageRequest, ObservationError> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(ObservationError::UnexpectedShape(
            "send request is not an object".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

pub fn parse_send_response(body: &str) -> Result<SendMessageResponse, ObservationError> {
    let value: Value = serde_json::from_str(body)?;
    if value.get("id").is_none() && value.get("messageId").is_none() {
        return Err(ObservationError::MissingField("id"));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp(&json!(1_700_000_000_000i64)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!(1_700_000_000)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!("1700000000000")), Some(1_700_000_000_000));
        assert_eq!(
            parse_timestamp(&json!("2023-11-14T22:13:20Z")),
            Some(1_700_000_000_000)
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_parse_timestamp_extremes_do_not_overflow() {
        assert_eq!(parse_timestamp(&json!(i64::MIN)), Some(i64::MIN));
        assert_eq!(parse_timestamp(&json!(i64::MAX)), Some(i64::MAX));
        assert_eq!(parse_timestamp(&json!(i64::MIN.to_string())), Some(i64::MIN));
        assert_eq!(parse_timestamp(&json!(-1_700_000_000)), Some(-1_700_000_000_000));
    }

    #[test]
    fn test_list_never_yields_composite_model() {
        assert_eq!(
            actual_model_only(Some("llama-70b → llama-70b-v2".to_string())).as_deref(),
            Some("llama-70b-v2")
        );
        assert_eq!(actual_model_only(Some("  ".to_string())), None);
    }

    #[test]
    fn test_parse_list_response_skips_bad_entries() {
        let body = json!({
            "messages": [
                { "id": "m2", "role": "assistant", "createdAt": 2000,
                  "inference": { "model": "llama-70b-v2", "settings": { "temperature": 0.7 } } },
                { "role": "user" },
                { "id": "", "role": "user" },
                { "id": "m1", "author": "user", "createdAt": "2023-11-14T22:13:20Z" }
            ]
        })
        .to_string();

        let (conversation, loaded) = parse_list_response(&body).unwrap();
        assert!(conversation.is_none());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].message_id, "m2");
        assert_eq!(loaded[0].role(), Some(Role::Bot));
        assert_eq!(loaded[0].patch.model.as_deref(), Some("llama-70b-v2"));
        // 2000 is below the seconds cutoff.
        assert_eq!(loaded[0].patch.timestamp, Some(2_000_000));
        assert_eq!(loaded[1].role(), Some(Role::User));
        assert_eq!(loaded[1].patch.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_parse_list_response_rejects_non_list() {
        assert!(matches!(
            parse_list_response("{\"messages\": 3}"),
            Err(ObservationError::Json(_))
        ));
        assert!(parse_list_response("<html>").is_err());
    }

    #[test]
    fn test_parse_send_response_aliases() {
        let response =
            parse_send_response(r#"{"messageId": "m9", "model": "llama-70b-v2", "timestamp": 1700000000123}"#)
                .unwrap();
        assert_eq!(response.id, "m9");
        assert_eq!(response.engine.as_deref(), Some("llama-70b-v2"));
        assert_eq!(
            response.created_at.as_ref().and_then(parse_timestamp),
            Some(1_700_000_000_123)
        );
    }

    #[test]
    fn test_parse_send_response_without_id() {
        assert!(matches!(
            parse_send_response(r#"{"engine": "x"}"#),
            Err(ObservationError::MissingField("id"))
        ));
    }

    #[test]
    fn test_parse_send_request_requires_object() {
        assert!(parse_send_request("[1, 2]").is_err());
        let request = parse_send_request(r#"{"model": "llama-70b", "settings": {"topK": 40}}"#).unwrap();
        assert_eq!(request.model.as_deref(), Some("llama-70b"));
        assert_eq!(request.settings.unwrap().top_k, Some(40));
    }
}
