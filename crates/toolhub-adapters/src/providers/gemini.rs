//! Google Gemini (Generative Language API).
//!
//! The key travels as the `key` query parameter.  Generation config is only
//! attached when at least one sampling field was supplied.

use reqwest::Method;
use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass, encode_segment};
use crate::shape::fan_in;
use crate::traits::AdapterType;
use crate::transport::ResponseEnvelope;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const FLASH: &str = "gemini-1.5-flash-latest";
const PRO: &str = "gemini-1.5-pro-latest";
const EMBEDDING_MODEL: &str = "text-embedding-004";

/// Gemini provider context.
pub struct Gemini {
    key: Credential,
    base_url: String,
}

type Op = Operation<Gemini>;

impl Gemini {
    fn endpoint(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}/{path}", self.base_url))
            .query_pair("key", self.key.expose())
    }

    /// `models/{model}:{action}` with a JSON body.
    fn model_call(&self, model: &str, action: &str, body: Value) -> RequestDescriptor {
        self.endpoint(Method::POST, &format!("models/{}:{action}", encode_segment(model)))
            .json(body)
    }

    fn generate(&self, a: &Args, default_model: &str, body: Value) -> Result<RequestDescriptor> {
        Ok(self
            .model_call(a.str_or("model", default_model)?, "generateContent", body)
            .timeout(TimeoutClass::Long))
    }
}

fn model(default: &'static str) -> Param {
    Param::string("model").default(default)
}

fn text_contents(prompt: &str) -> Value {
    json!([{ "parts": [{ "text": prompt }] }])
}

fn inline_contents(prompt: &str, mime_type: &str, data: &str) -> Value {
    json!([{
        "parts": [
            { "text": prompt },
            { "inlineData": { "mimeType": mime_type, "data": data } },
        ]
    }])
}

/// `generationConfig` from the sampling fields that were supplied.
fn generation_config(a: &Args) -> Option<Value> {
    let config = ParamSet::new()
        .forward(a, "temperature")
        .forward_as(a, "top_p", "topP")
        .forward_as(a, "top_k", "topK")
        .forward_as(a, "max_output_tokens", "maxOutputTokens");
    (!config.is_empty()).then(|| config.to_json())
}

fn system_instruction(a: &Args) -> Result<Option<Value>> {
    Ok(a
        .str("system_instruction")?
        .map(|s| json!({ "parts": [{ "text": s }] })))
}

fn prompt_body(a: &Args, prompt: &str) -> Result<Value> {
    Ok(ParamSet::new()
        .set("contents", text_contents(prompt))
        .maybe("generationConfig", generation_config(a))
        .maybe("systemInstruction", system_instruction(a)?)
        .to_json())
}

/// Concatenate the candidate text of every `data:` event in an SSE stream.
pub fn collect_sse_text(stream: &str) -> (String, usize) {
    let mut text = String::new();
    let mut chunks = 0;
    for line in stream.lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<Value>(payload.trim()) else {
            continue;
        };
        chunks += 1;
        let parts = event
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array);
        for part in parts.into_iter().flatten() {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
        }
    }
    (text, chunks)
}

fn stream_text(_: &Args, r: ResponseEnvelope) -> Result<Value> {
    let (text, chunks) = collect_sse_text(&r.text());
    Ok(json!({ "text": text, "chunks": chunks }))
}

impl Provider for Gemini {
    const ID: &'static str = "gemini";
    const ADAPTER_TYPE: AdapterType = AdapterType::LanguageModel;
    const ENV_VARS: &'static [&'static str] = &["GEMINI_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "GEMINI_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("gemini_generate_text", "Generate text from a prompt")
                .param(Param::string("prompt").required())
                .param(model(FLASH))
                .param(Param::number("temperature").describe("0-2"))
                .param(Param::number("top_p"))
                .param(Param::integer("top_k"))
                .param(Param::integer("max_output_tokens"))
                .param(Param::string("system_instruction"))
                .request(|cx, a| cx.generate(a, FLASH, prompt_body(a, a.require_str("prompt")?)?)),
            Op::new("gemini_chat", "Multi-turn conversation")
                .param(
                    Param::array("messages", ParamKind::Object)
                        .required()
                        .describe("[{\"role\": \"user\"|\"model\", \"text\": ...}]"),
                )
                .param(model(FLASH))
                .param(Param::number("temperature"))
                .param(Param::string("system_instruction"))
                .request(|cx, a| {
                    let contents = a
                        .require_array("messages")?
                        .iter()
                        .map(|m| match (m.get("role"), m.get("text")) {
                            (Some(role), Some(text)) => {
                                Ok(json!({ "role": role, "parts": [{ "text": text }] }))
                            }
                            _ => Err(a.invalid("each message needs `role` and `text`")),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let body = ParamSet::new()
                        .set("contents", contents)
                        .maybe("generationConfig", generation_config(a))
                        .maybe("systemInstruction", system_instruction(a)?);
                    cx.generate(a, FLASH, body.to_json())
                }),
            Op::new("gemini_analyze_image", "Ask about a base64 image")
                .param(Param::string("prompt").required())
                .param(Param::string("image_base64").required())
                .param(Param::string("mime_type").default("image/jpeg"))
                .param(model(FLASH))
                .request(|cx, a| {
                    let contents = inline_contents(
                        a.require_str("prompt")?,
                        a.str_or("mime_type", "image/jpeg")?,
                        a.require_str("image_base64")?,
                    );
                    cx.generate(a, FLASH, json!({ "contents": contents }))
                }),
            Op::new("gemini_analyze_video", "Ask about a base64 video")
                .param(Param::string("prompt").required())
                .param(Param::string("video_base64").required())
                .param(Param::string("mime_type").default("video/mp4"))
                .param(model(PRO))
                .request(|cx, a| {
                    let contents = inline_contents(
                        a.require_str("prompt")?,
                        a.str_or("mime_type", "video/mp4")?,
                        a.require_str("video_base64")?,
                    );
                    Ok(cx
                        .generate(a, PRO, json!({ "contents": contents }))?
                        .timeout(TimeoutClass::Generation))
                }),
            Op::new("gemini_analyze_pdf", "Ask about a base64 PDF")
                .param(Param::string("prompt").required())
                .param(Param::string("pdf_base64").required())
                .param(model(PRO))
                .request(|cx, a| {
                    let contents = inline_contents(
                        a.require_str("prompt")?,
                        "application/pdf",
                        a.require_str("pdf_base64")?,
                    );
                    Ok(cx
                        .generate(a, PRO, json!({ "contents": contents }))?
                        .timeout(TimeoutClass::Heavy))
                }),
            Op::new("gemini_count_tokens", "Token count of a text")
                .param(Param::string("text").required())
                .param(model(FLASH))
                .request(|cx, a| {
                    Ok(cx.model_call(
                        a.str_or("model", FLASH)?,
                        "countTokens",
                        json!({ "contents": text_contents(a.require_str("text")?) }),
                    ))
                }),
            Op::new("gemini_generate_with_tools", "Generation with function declarations")
                .param(Param::string("prompt").required())
                .param(Param::array("tools", ParamKind::Object).required())
                .param(model(FLASH))
                .request(|cx, a| {
                    let body = json!({
                        "contents": text_contents(a.require_str("prompt")?),
                        "tools": a.require("tools")?,
                    });
                    cx.generate(a, FLASH, body)
                }),
            Op::new("gemini_stream_generate", "Streamed generation, collected into one text")
                .param(Param::string("prompt").required())
                .param(model(FLASH))
                .param(Param::number("temperature"))
                .request(|cx, a| {
                    let body = prompt_body(a, a.require_str("prompt")?)?;
                    Ok(cx
                        .model_call(a.str_or("model", FLASH)?, "streamGenerateContent", body)
                        .query_pair("alt", "sse")
                        .timeout(TimeoutClass::Long))
                })
                .shape(stream_text),
            Op::new("gemini_embed_text", "Embedding vector for a text")
                .param(Param::string("text").required())
                .param(model(EMBEDDING_MODEL))
                .param(
                    Param::string("task_type").default("RETRIEVAL_DOCUMENT").one_of(&[
                        "RETRIEVAL_DOCUMENT",
                        "RETRIEVAL_QUERY",
                        "SEMANTIC_SIMILARITY",
                        "CLASSIFICATION",
                        "CLUSTERING",
                    ]),
                )
                .request(|cx, a| {
                    let model = a.str_or("model", EMBEDDING_MODEL)?;
                    let body = json!({
                        "model": format!("models/{model}"),
                        "content": { "parts": [{ "text": a.require_str("text")? }] },
                        "taskType": a.str_or("task_type", "RETRIEVAL_DOCUMENT")?,
                    });
                    Ok(cx
                        .model_call(model, "embedContent", body)
                        .timeout(TimeoutClass::Standard))
                }),
            Op::new("gemini_list_models", "Available models and capabilities")
                .request(|cx, _| Ok(cx.endpoint(Method::GET, "models"))),
            Op::new(
                "gemini_batch_generate",
                "Generate for several prompts concurrently; results keep input order",
            )
            .param(Param::array("prompts", ParamKind::String).required())
            .param(model(FLASH))
            .param(Param::number("temperature"))
            .fan_out(
                |cx, a| {
                    let prompts = a.str_list("prompts")?.unwrap_or_default();
                    prompts
                        .iter()
                        .enumerate()
                        .map(|(i, prompt)| -> Result<(String, RequestDescriptor)> {
                            let desc = cx.generate(a, FLASH, prompt_body(a, prompt)?)?;
                            Ok((i.to_string(), desc.timeout(TimeoutClass::Heavy)))
                        })
                        .collect()
                },
                |_, slots| Ok(json!({ "results": fan_in(slots, |r| r.json()) })),
            ),
            Op::new("gemini_generate_json", "Structured JSON output")
                .param(Param::string("prompt").required())
                .param(Param::object("json_schema").describe("Response schema; free-form JSON when omitted"))
                .param(model(FLASH))
                .request(|cx, a| {
                    let config = ParamSet::new()
                        .set("responseMimeType", "application/json")
                        .forward_as(a, "json_schema", "responseSchema");
                    let body = json!({
                        "contents": text_contents(a.require_str("prompt")?),
                        "generationConfig": config.to_json(),
                    });
                    cx.generate(a, FLASH, body)
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;

    fn gemini() -> crate::operation::ServiceAdapter<Gemini> {
        adapter(&[("GEMINI_API_KEY", "gk")])
    }

    #[test]
    fn generation_config_only_when_sampling_given() {
        let d = &gemini()
            .prepare("gemini_generate_text", json!({"prompt": "hi"}))
            .unwrap()[0];
        assert_eq!(
            d.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
        assert_eq!(d.query_value("key"), Some("gk"));
        assert!(d.json_body().unwrap().get("generationConfig").is_none());

        let d = &gemini()
            .prepare("gemini_generate_text", json!({"prompt": "hi", "top_k": 0}))
            .unwrap()[0];
        assert_eq!(d.json_body().unwrap()["generationConfig"], json!({"topK": 0}));
    }

    #[test]
    fn batch_keys_follow_input_order() {
        let descs = gemini()
            .prepare("gemini_batch_generate", json!({"prompts": ["a", "b", "c"]}))
            .unwrap();
        assert_eq!(descs.len(), 3);
        assert_eq!(descs[2].json_body().unwrap()["contents"][0]["parts"][0]["text"], "c");
        assert_eq!(descs[0].timeout, TimeoutClass::Heavy);
    }

    #[test]
    fn video_uses_generation_timeout() {
        let d = &gemini()
            .prepare("gemini_analyze_video", json!({"prompt": "p", "video_base64": "AA=="}))
            .unwrap()[0];
        assert_eq!(d.timeout, TimeoutClass::Generation);
        assert!(d.url.contains("gemini-1.5-pro-latest"));
    }

    #[test]
    fn sse_text_is_concatenated() {
        let stream = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\n\n\
                      data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]}}]}\n\n";
        assert_eq!(collect_sse_text(stream), ("Hello".to_string(), 2));
    }

    #[test]
    fn chat_rejects_malformed_messages() {
        let err = gemini()
            .prepare("gemini_chat", json!({"messages": [{"role": "user"}]}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
