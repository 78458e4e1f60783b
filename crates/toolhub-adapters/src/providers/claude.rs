//! Anthropic Messages API.
//!
//! Every operation posts to `/messages`.  Text-returning operations join the
//! response's `text` content blocks with newlines and skip everything else.

use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass};
use crate::shape::{self, fan_in};
use crate::traits::AdapterType;
use crate::transport::ResponseEnvelope;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Upper bound on models in one comparison.
pub const MAX_COMPARED_MODELS: usize = 3;

/// Anthropic provider context.
pub struct Claude {
    key: Credential,
    base_url: String,
}

type Op = Operation<Claude>;

impl Claude {
    fn messages(&self, body: Value) -> RequestDescriptor {
        RequestDescriptor::post(format!("{}/messages", self.base_url))
            .secret_header("x-api-key", self.key.expose())
            .header("anthropic-version", API_VERSION)
            .json(body)
            .timeout(TimeoutClass::Generation)
    }
}

fn model() -> Param {
    Param::string("model").default(DEFAULT_MODEL)
}

fn max_tokens(default: i64) -> Param {
    Param::integer("max_tokens")
        .default(default)
        .describe("Maximum tokens to generate")
}

/// `model`, `messages` and `max_tokens`, plus `system` when given.
fn base_body(a: &Args, messages: Value) -> Result<ParamSet> {
    Ok(ParamSet::new()
        .set("model", a.str_or("model", DEFAULT_MODEL)?)
        .set("messages", messages)
        .forward(a, "max_tokens")
        .forward(a, "system"))
}

fn user_message(content: impl Into<Value>) -> Value {
    json!([{ "role": "user", "content": content.into() }])
}

fn vision_message(source: Value, prompt: &str) -> Value {
    user_message(json!([
        { "type": "image", "source": source },
        { "type": "text", "text": prompt },
    ]))
}

fn text(_: &Args, r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    Ok(Value::String(shape::text_blocks(&body["content"])))
}

fn usage_summary(body: &Value) -> Value {
    json!({
        "input_tokens": body.pointer("/usage/input_tokens").cloned().unwrap_or(json!(0)),
        "output_tokens": body.pointer("/usage/output_tokens").cloned().unwrap_or(json!(0)),
    })
}

/// The conversation so far followed by the new user turn.
fn extended_history(a: &Args) -> Result<Vec<Value>> {
    let mut history = a.require_array("conversation_history")?.clone();
    history.push(json!({ "role": "user", "content": a.require_str("new_message")? }));
    Ok(history)
}

fn multi_turn(a: &Args, r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    let reply = shape::text_blocks(&body["content"]);
    let requested = a.str_or("model", DEFAULT_MODEL)?;
    let mut history = extended_history(a)?;
    history.push(json!({ "role": "assistant", "content": reply }));
    Ok(json!({
        "response": reply,
        "updated_history": history,
        "usage": body.get("usage").cloned().unwrap_or_else(|| json!({})),
        "model": body.get("model").cloned().unwrap_or_else(|| json!(requested)),
        "stop_reason": body.get("stop_reason").cloned().unwrap_or_else(|| json!("")),
    }))
}

fn compare_slot(r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    Ok(json!({
        "response": shape::text_blocks(&body["content"]),
        "usage": body.get("usage").cloned().unwrap_or_else(|| json!({})),
        "stop_reason": body.get("stop_reason").cloned().unwrap_or_else(|| json!("")),
    }))
}

// ---------------------------------------------------------------------------
// Model table
// ---------------------------------------------------------------------------

struct ModelInfo {
    id: &'static str,
    name: &'static str,
    version: &'static str,
    max_output: u32,
    tier: &'static str,
    description: &'static str,
}

const CONTEXT_WINDOW: u32 = 200_000;

const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        name: "Claude 3.5 Sonnet",
        version: "20241022",
        max_output: 8192,
        tier: "intelligent",
        description: "Most capable model in the family",
    },
    ModelInfo {
        id: "claude-3-5-haiku-20241022",
        name: "Claude 3.5 Haiku",
        version: "20241022",
        max_output: 8192,
        tier: "fast",
        description: "Fastest model for quick responses",
    },
    ModelInfo {
        id: "claude-3-opus-20240229",
        name: "Claude 3 Opus",
        version: "20240229",
        max_output: 4096,
        tier: "powerful",
        description: "Strong performance on complex tasks",
    },
    ModelInfo {
        id: "claude-3-sonnet-20240229",
        name: "Claude 3 Sonnet",
        version: "20240229",
        max_output: 4096,
        tier: "balanced",
        description: "Balance of intelligence and speed",
    },
    ModelInfo {
        id: "claude-3-haiku-20240307",
        name: "Claude 3 Haiku",
        version: "20240307",
        max_output: 4096,
        tier: "fast",
        description: "Fast and cost-effective",
    },
];

fn model_info(a: &Args) -> Result<Value> {
    let id = a.str_or("model", DEFAULT_MODEL)?;
    Ok(match MODELS.iter().find(|m| m.id == id) {
        Some(m) => json!({
            "model_id": m.id,
            "name": m.name,
            "version": m.version,
            "context_window": CONTEXT_WINDOW,
            "max_output": m.max_output,
            "supports_vision": true,
            "supports_tool_use": true,
            "tier": m.tier,
            "description": m.description,
        }),
        None => json!({
            "model_id": id,
            "name": id,
            "context_window": "unknown",
            "supports_vision": "unknown",
            "description": "Model information not available",
        }),
    })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

impl Provider for Claude {
    const ID: &'static str = "claude";
    const ADAPTER_TYPE: AdapterType = AdapterType::LanguageModel;
    const ENV_VARS: &'static [&'static str] = &["ANTHROPIC_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "ANTHROPIC_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("claude_create_message", "Create a message; returns the full response")
                .param(Param::array("messages", ParamKind::Object).required())
                .param(model())
                .param(max_tokens(4096))
                .param(Param::string("system"))
                .param(Param::number("temperature"))
                .param(Param::number("top_p"))
                .param(Param::integer("top_k"))
                .param(Param::array("stop_sequences", ParamKind::String))
                .request(|cx, a| {
                    let body = base_body(a, a.require("messages")?.clone())?.forward_all(
                        a,
                        &["temperature", "top_p", "top_k", "stop_sequences"],
                    );
                    Ok(cx.messages(body.to_json()))
                }),
            Op::new("claude_chat", "Send one prompt and return the text reply")
                .param(Param::string("prompt").required())
                .param(model())
                .param(max_tokens(4096))
                .param(Param::string("system"))
                .param(Param::number("temperature"))
                .request(|cx, a| {
                    let body = base_body(a, user_message(a.require_str("prompt")?))?
                        .forward(a, "temperature");
                    Ok(cx.messages(body.to_json()))
                })
                .shape(text),
            Op::new("claude_analyze_image", "Describe or answer questions about an image URL")
                .param(Param::string("image_url").required())
                .param(Param::string("prompt").default("What's in this image?"))
                .param(model())
                .param(max_tokens(4096))
                .request(|cx, a| {
                    let source = json!({ "type": "url", "url": a.require_str("image_url")? });
                    let messages = vision_message(source, a.str_or("prompt", "What's in this image?")?);
                    Ok(cx.messages(base_body(a, messages)?.to_json()))
                })
                .shape(text),
            Op::new("claude_analyze_image_base64", "Analyze a base64-encoded image")
                .param(Param::string("image_base64").required())
                .param(
                    Param::string("media_type")
                        .required()
                        .one_of(&["image/jpeg", "image/png", "image/gif", "image/webp"]),
                )
                .param(Param::string("prompt").default("What's in this image?"))
                .param(model())
                .param(max_tokens(4096))
                .request(|cx, a| {
                    let source = json!({
                        "type": "base64",
                        "media_type": a.require_str("media_type")?,
                        "data": a.require_str("image_base64")?,
                    });
                    let messages = vision_message(source, a.str_or("prompt", "What's in this image?")?);
                    Ok(cx.messages(base_body(a, messages)?.to_json()))
                })
                .shape(text),
            Op::new(
                "claude_count_tokens",
                "Token usage of a message list (sends a one-token request)",
            )
            .param(Param::array("messages", ParamKind::Object).required())
            .param(model())
            .param(Param::string("system"))
            .request(|cx, a| {
                let body = base_body(a, a.require("messages")?.clone())?.set("max_tokens", 1);
                Ok(cx.messages(body.to_json()))
            })
            .shape(|_, r| Ok(usage_summary(&r.json()?))),
            Op::new("claude_multi_turn_conversation", "Continue a conversation with a new user message")
                .param(Param::array("conversation_history", ParamKind::Object).required())
                .param(Param::string("new_message").required())
                .param(model())
                .param(max_tokens(4096))
                .param(Param::string("system"))
                .request(|cx, a| {
                    let body = base_body(a, Value::Array(extended_history(a)?))?;
                    Ok(cx.messages(body.to_json()))
                })
                .shape(multi_turn),
            Op::new("claude_get_model_info", "Context window and capabilities of a model")
                .param(model())
                .local(model_info),
            Op::new(
                "claude_compare_responses",
                "Send one prompt to up to three models concurrently",
            )
            .param(Param::string("prompt").required())
            .param(
                Param::array("models", ParamKind::String)
                    .default(json!(["claude-3-5-sonnet-20241022", "claude-3-5-haiku-20241022"])),
            )
            .param(max_tokens(1024))
            .param(Param::string("system"))
            .fan_out(
                |cx, a| {
                    let models = a.str_list("models")?.unwrap_or_default();
                    if models.len() > MAX_COMPARED_MODELS {
                        return Err(a.invalid(format!(
                            "at most {MAX_COMPARED_MODELS} models can be compared"
                        )));
                    }
                    let prompt = a.require_str("prompt")?;
                    models
                        .into_iter()
                        .map(|m| -> Result<(String, RequestDescriptor)> {
                            let body = base_body(a, user_message(prompt))?.set("model", m.as_str());
                            Ok((m, cx.messages(body.to_json())))
                        })
                        .collect()
                },
                |_, slots| Ok(fan_in(slots, compare_slot)),
            ),
            Op::new(
                "claude_extract_structured_data",
                "Extract structured data from text following a schema description",
            )
            .param(Param::string("text").required())
            .param(Param::string("schema_description").required())
            .param(model())
            .param(max_tokens(4096))
            .request(|cx, a| {
                let system = format!(
                    "Extract structured data according to this schema:\n{}\n\n\
                     Return ONLY the structured data, no additional explanation.",
                    a.require_str("schema_description")?
                );
                let body = base_body(a, user_message(a.require_str("text")?))?.set("system", system);
                Ok(cx.messages(body.to_json()))
            })
            .shape(text),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;
    use crate::traits::Adapter;

    fn claude() -> ServiceAdapter<Claude> {
        adapter(&[("ANTHROPIC_API_KEY", "sk-ant")])
    }

    #[test]
    fn chat_builds_message_request() {
        let d = &claude()
            .prepare("claude_chat", json!({"prompt": "hi", "temperature": 0}))
            .unwrap()[0];
        assert_eq!(d.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(d.header_value("anthropic-version"), Some(API_VERSION));
        assert_eq!(d.header_value("x-api-key"), Some("sk-ant"));
        assert_eq!(d.timeout, TimeoutClass::Generation);
        let body = d.json_body().unwrap();
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["temperature"], 0);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn count_tokens_forces_single_token() {
        let d = &claude()
            .prepare("claude_count_tokens", json!({"messages": [{"role": "user", "content": "x"}]}))
            .unwrap()[0];
        assert_eq!(d.json_body().unwrap()["max_tokens"], 1);
        let usage = usage_summary(&json!({"usage": {"input_tokens": 12}}));
        assert_eq!(usage, json!({"input_tokens": 12, "output_tokens": 0}));
    }

    #[test]
    fn multi_turn_appends_both_turns() {
        let a = Args::from_value(
            "claude_multi_turn_conversation",
            json!({
                "conversation_history": [{"role": "user", "content": "Hi"}, {"role": "assistant", "content": "Hello!"}],
                "new_message": "How are you?"
            }),
        )
        .unwrap();
        let resp = ResponseEnvelope::from_json(&json!({
            "content": [{"type": "text", "text": "Fine"}],
            "model": "m",
            "stop_reason": "end_turn"
        }));
        let out = multi_turn(&a, resp).unwrap();
        assert_eq!(out["response"], "Fine");
        let history = out["updated_history"].as_array().unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2]["content"], "How are you?");
        assert_eq!(history[3]["role"], "assistant");
    }

    #[test]
    fn compare_rejects_more_than_three_models() {
        let err = claude()
            .prepare("claude_compare_responses", json!({"prompt": "p", "models": ["a", "b", "c", "d"]}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        let descs = claude()
            .prepare("claude_compare_responses", json!({"prompt": "p"}))
            .unwrap();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[1].json_body().unwrap()["model"], "claude-3-5-haiku-20241022");
        assert_eq!(descs[0].json_body().unwrap()["max_tokens"], 1024);
    }

    #[tokio::test]
    async fn model_info_is_local() {
        let out = claude()
            .execute_tool("claude_get_model_info", json!({"model": "claude-3-opus-20240229"}))
            .await
            .unwrap();
        assert_eq!(out["max_output"], 4096);
        let unknown = claude()
            .execute_tool("claude_get_model_info", json!({"model": "x"}))
            .await
            .unwrap();
        assert_eq!(unknown["context_window"], "unknown");
        assert_eq!(unknown["model_id"], "x");
    }
}
