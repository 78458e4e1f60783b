//! Response shapers.
//!
//! Shapers turn a [`ResponseEnvelope`] into the value handed back to the
//! caller.  They are pure: the same envelope and arguments always produce
//! the same output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use crate::error::{AdapterError, Result};
use crate::params::Args;
use crate::transport::ResponseEnvelope;

/// Signature of a single-response shaper.
pub type Shaper = fn(&Args, ResponseEnvelope) -> Result<Value>;

/// Number of hex characters kept by [`hex_preview`].
pub const PREVIEW_CHARS: usize = 100;

/// Decode the JSON body and return it unchanged.
pub fn json(_args: &Args, response: ResponseEnvelope) -> Result<Value> {
    response.json()
}

/// The value at a JSON pointer, or `null` when missing.
pub fn pluck(value: &Value, pointer: &str) -> Value {
    value.pointer(pointer).cloned().unwrap_or(Value::Null)
}

/// Concatenate the `text` of every block tagged `"type": "text"`, in order,
/// joined by newlines.  Other block types are skipped.
pub fn text_blocks(content: &Value) -> String {
    content
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Attach `converted_amount = amount * rate` and echo `amount`, when
/// `exchange_rates[target]` exists.  Otherwise the body is returned as-is.
pub fn attach_converted_amount(mut body: Value, target: &str, amount: &Value) -> Value {
    let rate = body
        .get("exchange_rates")
        .and_then(|rates| rates.get(target))
        .and_then(Value::as_f64);
    if let (Some(rate), Some(qty), Some(obj)) = (rate, amount.as_f64(), body.as_object_mut()) {
        obj.insert("converted_amount".into(), json!(qty * rate));
        obj.insert("amount".into(), amount.clone());
    }
    body
}

/// Hex-encode `bytes`, keeping the first `chars` characters.  Truncated
/// output ends in `"..."`.
pub fn hex_preview(bytes: &[u8], chars: usize) -> String {
    let encoded = hex::encode(bytes);
    if encoded.len() > chars {
        format!("{}...", &encoded[..chars])
    } else {
        encoded
    }
}

pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a caller-supplied base64 payload.  A `data:<mime>;base64,` prefix
/// is accepted.
pub fn base64_decode(args: &Args, key: &str) -> Result<Vec<u8>> {
    let raw = args.require_str(key)?;
    let data = raw
        .split_once(";base64,")
        .map(|(_, d)| d)
        .unwrap_or(raw)
        .trim();
    STANDARD
        .decode(data)
        .map_err(|e| args.invalid(format!("`{key}` is not valid base64: {e}")))
}

/// Binary body as `{ <field>: base64, "format": "base64", "content_type" }`.
pub fn binary(response: &ResponseEnvelope, field: &str, default_content_type: &str) -> Value {
    let mut out = Map::new();
    out.insert(field.to_string(), json!(base64_encode(&response.body)));
    out.insert("format".into(), json!("base64"));
    out.insert(
        "content_type".into(),
        json!(response.content_type().unwrap_or(default_content_type)),
    );
    Value::Object(out)
}

/// Acknowledgement for operations whose response carries no useful body.
pub fn ack(id_name: &str, id: &str) -> Value {
    let mut out = Map::new();
    out.insert("success".into(), json!(true));
    out.insert(id_name.to_string(), json!(id));
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Fan-out results
// ---------------------------------------------------------------------------

/// Outcome of one sub-call of a fan-out operation.
#[derive(Debug)]
pub struct Slot {
    pub key: String,
    pub outcome: Result<ResponseEnvelope>,
}

/// Signature of a fan-out shaper.
pub type FanInShaper = fn(&Args, Vec<Slot>) -> Result<Value>;

/// Shape every slot independently.
///
/// Successful slots become `{"key", "ok": true, "value"}` and failed slots
/// `{"key", "ok": false, "error": {...}}`, in the original order.  One slot
/// failing never affects another.
pub fn fan_in(slots: Vec<Slot>, shape: impl Fn(ResponseEnvelope) -> Result<Value>) -> Value {
    let results: Vec<Value> = slots
        .into_iter()
        .map(|slot| match slot.outcome.and_then(&shape) {
            Ok(value) => json!({ "key": slot.key, "ok": true, "value": value }),
            Err(err) => json!({ "key": slot.key, "ok": false, "error": err.to_json() }),
        })
        .collect();
    Value::Array(results)
}

/// Fail the whole call when the body carries only a GraphQL `errors` list.
pub fn graphql_data(args: &Args, response: ResponseEnvelope) -> Result<Value> {
    let body = response.json()?;
    let has_data = body.get("data").is_some_and(|d| !d.is_null());
    if !has_data && body.get("errors").is_some() {
        return Err(AdapterError::Upstream {
            tool_name: args.tool().to_string(),
            status: response.status,
            body: body.to_string(),
        });
    }
    Ok(body.get("data").cloned().unwrap_or(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::from_value("t", json!({})).unwrap()
    }

    // -- Text blocks --

    #[test]
    fn text_blocks_skip_non_text_segments() {
        let content = json!([
            {"type": "text", "text": "A"},
            {"type": "image", "source": {"type": "base64", "data": "..."}},
            {"type": "text", "text": "B"}
        ]);
        assert_eq!(text_blocks(&content), "A\nB");
    }

    #[test]
    fn text_blocks_of_missing_content_is_empty() {
        assert_eq!(text_blocks(&Value::Null), "");
        assert_eq!(text_blocks(&json!([{"type": "tool_use", "id": "x"}])), "");
    }

    // -- Currency --

    #[test]
    fn converted_amount_is_attached_when_rate_exists() {
        let body = json!({"base": "USD", "exchange_rates": {"EUR": 0.9}});
        let out = attach_converted_amount(body, "EUR", &json!(100));
        assert_eq!(out["converted_amount"], json!(90.0));
        assert_eq!(out["amount"], json!(100));
    }

    #[test]
    fn missing_rate_leaves_body_unchanged() {
        let body = json!({"base": "USD", "exchange_rates": {"GBP": 0.8}});
        let out = attach_converted_amount(body.clone(), "EUR", &json!(100));
        assert_eq!(out, body);
        assert!(out.get("converted_amount").is_none());
    }

    // -- Binary --

    #[test]
    fn hex_preview_truncates_and_marks() {
        let bytes = vec![0xabu8; 80];
        let preview = hex_preview(&bytes, PREVIEW_CHARS);
        assert_eq!(preview.len(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(hex_preview(&[0x01, 0xff], PREVIEW_CHARS), "01ff");
    }

    #[test]
    fn binary_uses_response_content_type() {
        let resp = ResponseEnvelope::new(200, "audio/mpeg", vec![1u8, 2, 3]);
        let out = binary(&resp, "audio", "audio/flac");
        assert_eq!(out["audio"], "AQID");
        assert_eq!(out["content_type"], "audio/mpeg");
        assert_eq!(out["format"], "base64");
    }

    #[test]
    fn base64_decode_accepts_data_uri() {
        let a = Args::from_value("t", json!({"audio": "data:audio/wav;base64,AQID"})).unwrap();
        assert_eq!(base64_decode(&a, "audio").unwrap(), vec![1, 2, 3]);
        let bad = Args::from_value("t", json!({"audio": "%%%"})).unwrap();
        assert!(base64_decode(&bad, "audio").is_err());
    }

    // -- Fan-in --

    #[test]
    fn fan_in_keeps_failures_per_slot() {
        let slots = vec![
            Slot {
                key: "a".into(),
                outcome: Ok(ResponseEnvelope::from_json(&json!({"v": 1}))),
            },
            Slot {
                key: "b".into(),
                outcome: Err(AdapterError::Upstream {
                    tool_name: "t".into(),
                    status: 429,
                    body: "slow down".into(),
                }),
            },
        ];
        let out = fan_in(slots, |r| r.json());
        assert_eq!(out[0]["ok"], true);
        assert_eq!(out[0]["value"]["v"], 1);
        assert_eq!(out[1]["ok"], false);
        assert_eq!(out[1]["error"]["status"], 429);
        assert_eq!(out[1]["key"], "b");
    }

    // -- GraphQL --

    #[test]
    fn graphql_errors_without_data_fail() {
        let resp = ResponseEnvelope::from_json(&json!({"errors": [{"message": "bad"}]}));
        let err = graphql_data(&args(), resp).unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn graphql_data_is_unwrapped() {
        let resp = ResponseEnvelope::from_json(&json!({"data": {"teams": {"nodes": []}}}));
        assert_eq!(
            graphql_data(&args(), resp).unwrap(),
            json!({"teams": {"nodes": []}})
        );
    }

    #[test]
    fn json_shaper_is_deterministic() {
        let body = json!({"id": "cus_1", "balance": 0});
        let a = json(&args(), ResponseEnvelope::from_json(&body)).unwrap();
        let b = json(&args(), ResponseEnvelope::from_json(&body)).unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }
}
