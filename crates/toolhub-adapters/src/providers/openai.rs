//! OpenAI REST API: chat, embeddings, images, audio and moderation.

use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{MultipartField, RequestDescriptor, TimeoutClass};
use crate::shape;
use crate::transport::ResponseEnvelope;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// OpenAI provider context.
pub struct OpenAi {
    key: Credential,
    base_url: String,
}

type Op = Operation<OpenAi>;

impl OpenAi {
    fn get(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(format!("{}{path}", self.base_url))
            .bearer(&self.key)
            .timeout(TimeoutClass::Standard)
    }

    fn post(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::post(format!("{}{path}", self.base_url))
            .bearer(&self.key)
            .timeout(TimeoutClass::Standard)
    }
}

fn message_content(_: &Args, r: ResponseEnvelope) -> Result<Value> {
    Ok(shape::pluck(&r.json()?, "/choices/0/message/content"))
}

fn embedding(_: &Args, r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    let vector = shape::pluck(&body, "/data/0/embedding");
    let dimensions = vector.as_array().map_or(0, Vec::len);
    Ok(json!({
        "embedding": vector,
        "model": body["model"],
        "dimensions": dimensions,
        "usage": body["usage"],
    }))
}

fn image_urls(_: &Args, r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    let urls: Vec<Value> = body["data"]
        .as_array()
        .map(|items| items.iter().map(|img| img["url"].clone()).collect())
        .unwrap_or_default();
    Ok(Value::Array(urls))
}

impl Provider for OpenAi {
    const ID: &'static str = "openai";
    const ADAPTER_TYPE: AdapterType = AdapterType::LanguageModel;
    const ENV_VARS: &'static [&'static str] = &["OPENAI_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "OPENAI_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("openai_chat_completion", "Chat completion; returns the assistant message text")
                .param(
                    Param::array("messages", ParamKind::Object)
                        .required()
                        .describe("[{\"role\": \"user\", \"content\": \"Hello!\"}]"),
                )
                .param(Param::string("model").default(DEFAULT_CHAT_MODEL))
                .param(Param::number("temperature").default(1.0))
                .param(Param::integer("max_tokens"))
                .param(Param::string("response_format").describe("\"json_object\" for JSON mode"))
                .request(|cx, a| {
                    let format = a.str("response_format")?.map(|t| json!({ "type": t }));
                    let body = ParamSet::new()
                        .forward_all(a, &["model", "messages", "temperature", "max_tokens"])
                        .maybe("response_format", format);
                    Ok(cx.post("/chat/completions").json_params(body))
                })
                .shape(message_content),
            Op::new("openai_create_embedding", "Embedding vector for a text")
                .param(Param::string("text").required())
                .param(Param::string("model").default("text-embedding-3-small"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_as(a, "text", "input")
                        .forward(a, "model");
                    Ok(cx.post("/embeddings").json_params(body))
                })
                .shape(embedding),
            Op::new("openai_generate_image", "Generate images; returns their URLs")
                .param(Param::string("prompt").required())
                .param(Param::string("model").default("dall-e-3").one_of(&["dall-e-3", "dall-e-2"]))
                .param(Param::string("size").default("1024x1024"))
                .param(Param::string("quality").default("standard").one_of(&["standard", "hd"]))
                .param(Param::integer("n").default(1))
                .request(|cx, a| {
                    let quality = match a.require_str("model")? {
                        "dall-e-3" => a.str("quality")?,
                        _ => None,
                    };
                    let body = ParamSet::new()
                        .forward_all(a, &["prompt", "model", "size", "n"])
                        .maybe("quality", quality);
                    Ok(cx
                        .post("/images/generations")
                        .timeout(TimeoutClass::Long)
                        .json_params(body))
                })
                .shape(image_urls),
            Op::new("openai_text_to_speech", "Synthesize speech; returns base64 MP3")
                .param(Param::string("text").required())
                .param(
                    Param::string("voice")
                        .default("alloy")
                        .one_of(&["alloy", "echo", "fable", "onyx", "nova", "shimmer"]),
                )
                .param(Param::string("model").default("tts-1"))
                .param(Param::number("speed").default(1.0).describe("0.25 to 4.0"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_as(a, "text", "input")
                        .forward_all(a, &["voice", "model", "speed"]);
                    Ok(cx.post("/audio/speech").json_params(body))
                })
                .shape(|_, r| Ok(shape::binary(&r, "audio", "audio/mpeg"))),
            Op::new("openai_transcribe_audio", "Transcribe base64 audio with Whisper")
                .param(Param::string("audio_file_base64").required())
                .param(Param::string("model").default("whisper-1"))
                .param(Param::string("language"))
                .param(
                    Param::string("response_format")
                        .default("json")
                        .one_of(&["json", "text", "srt", "vtt", "verbose_json"]),
                )
                .request(|cx, a| {
                    let audio = shape::base64_decode(a, "audio_file_base64")?;
                    let mut fields = vec![MultipartField::File {
                        name: "file".into(),
                        filename: "audio.mp3".into(),
                        content_type: "audio/mpeg".into(),
                        data: audio,
                    }];
                    fields.extend(
                        ParamSet::new()
                            .forward_all(a, &["model", "response_format", "language"])
                            .to_form()
                            .into_iter()
                            .map(|(name, value)| MultipartField::Text { name, value }),
                    );
                    Ok(cx
                        .post("/audio/transcriptions")
                        .timeout(TimeoutClass::Long)
                        .multipart(fields))
                })
                .shape(|_, r| match r.json() {
                    Ok(v) => Ok(v),
                    // text, srt and vtt formats come back as plain text
                    Err(_) => Ok(json!({ "text": r.text() })),
                }),
            Op::new("openai_list_models", "Models available to the key")
                .request(|cx, _| Ok(cx.get("/models").timeout(TimeoutClass::Metadata)))
                .shape(|_, r| Ok(shape::pluck(&r.json()?, "/data"))),
            Op::new("openai_moderate_content", "Policy category flags and scores for a text")
                .param(Param::string("text").required())
                .param(Param::string("model").default("text-moderation-latest"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_as(a, "text", "input")
                        .forward(a, "model");
                    Ok(cx.post("/moderations").json_params(body))
                })
                .shape(|_, r| Ok(shape::pluck(&r.json()?, "/results/0"))),
            Op::new("openai_create_completion", "Legacy text completion; returns the first choice text")
                .param(Param::string("prompt").required())
                .param(Param::string("model").default("gpt-3.5-turbo-instruct"))
                .param(Param::integer("max_tokens").default(100))
                .param(Param::number("temperature").default(1.0))
                .param(Param::array("stop", ParamKind::String))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &["model", "prompt", "max_tokens", "temperature", "stop"],
                    );
                    Ok(cx.post("/completions").json_params(body))
                })
                .shape(|_, r| Ok(shape::pluck(&r.json()?, "/choices/0/text"))),
            Op::new("openai_analyze_image", "Ask a vision model about an image URL")
                .param(Param::string("image_url").required())
                .param(Param::string("prompt").default("What's in this image?"))
                .param(Param::string("model").default(DEFAULT_CHAT_MODEL))
                .param(Param::integer("max_tokens").default(300))
                .request(|cx, a| {
                    let content = json!([
                        { "type": "text", "text": a.require_str("prompt")? },
                        { "type": "image_url", "image_url": { "url": a.require_str("image_url")? } },
                    ]);
                    let body = ParamSet::new()
                        .forward(a, "model")
                        .set("messages", json!([{ "role": "user", "content": content }]))
                        .forward(a, "max_tokens");
                    Ok(cx.post("/chat/completions").json_params(body))
                })
                .shape(message_content),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;
    use crate::request::Body;

    fn prepare(tool: &str, params: Value) -> RequestDescriptor {
        adapter::<OpenAi>(&[("OPENAI_API_KEY", "sk")])
            .prepare(tool, params)
            .unwrap()
            .remove(0)
    }

    fn args() -> Args {
        Args::from_value("t", json!({})).unwrap()
    }

    // -- Requests --

    #[test]
    fn chat_sends_only_supplied_options() {
        let d = prepare(
            "openai_chat_completion",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
        );
        assert_eq!(d.timeout, TimeoutClass::Standard);
        let body = d.json_body().unwrap();
        assert_eq!(body["model"], DEFAULT_CHAT_MODEL);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("response_format").is_none());

        let d = prepare(
            "openai_chat_completion",
            json!({"messages": [], "response_format": "json_object"}),
        );
        assert_eq!(d.json_body().unwrap()["response_format"], json!({"type": "json_object"}));
    }

    #[test]
    fn quality_only_for_dall_e_3() {
        let d = prepare("openai_generate_image", json!({"prompt": "a fox"}));
        assert_eq!(d.json_body().unwrap()["quality"], "standard");
        let d = prepare("openai_generate_image", json!({"prompt": "a fox", "model": "dall-e-2"}));
        assert!(d.json_body().unwrap().get("quality").is_none());
    }

    #[test]
    fn transcription_is_multipart() {
        let d = prepare(
            "openai_transcribe_audio",
            json!({"audio_file_base64": "AQID", "language": "en"}),
        );
        let Body::Multipart(fields) = &d.body else {
            panic!("expected multipart body");
        };
        assert!(matches!(&fields[0], MultipartField::File { data, .. } if data == &vec![1u8, 2, 3]));
        assert!(fields.iter().any(
            |f| matches!(f, MultipartField::Text { name, value } if name == "language" && value == "en")
        ));
    }

    // -- Shaping --

    #[test]
    fn embedding_reports_dimensions() {
        let resp = ResponseEnvelope::from_json(&json!({
            "data": [{"embedding": [0.1, 0.2, 0.3]}],
            "model": "text-embedding-3-small",
            "usage": {"total_tokens": 2}
        }));
        let out = embedding(&args(), resp).unwrap();
        assert_eq!(out["dimensions"], 3);
        assert_eq!(out["usage"]["total_tokens"], 2);
    }

    #[test]
    fn image_urls_are_collected() {
        let resp = ResponseEnvelope::from_json(&json!({"data": [{"url": "u1"}, {"url": "u2"}]}));
        assert_eq!(image_urls(&args(), resp).unwrap(), json!(["u1", "u2"]));
    }
}
