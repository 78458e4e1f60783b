//! Hugging Face Inference API.
//!
//! Every task posts to `/models/<owner>/<name>`.  Text tasks send
//! `{"inputs": ..., "parameters": {...}}`; image and audio tasks send the
//! decoded raw bytes; image and speech generation return base64.

use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass, encode_segment};
use crate::shape;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Hugging Face provider context.
pub struct HuggingFace {
    token: Credential,
    base_url: String,
}

type Op = Operation<HuggingFace>;

/// `owner/name` with each segment encoded and the separator kept.
fn model_path(model_id: &str) -> String {
    model_id
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

impl HuggingFace {
    fn model(&self, a: &Args, default: &str) -> Result<RequestDescriptor> {
        let model_id = a.str_or("model_id", default)?;
        if model_id.trim().is_empty() {
            return Err(a.invalid("`model_id` must not be empty"));
        }
        Ok(RequestDescriptor::post(format!("{}/models/{}", self.base_url, model_path(model_id)))
            .bearer(&self.token)
            .timeout(TimeoutClass::Standard))
    }

    /// `{"inputs": inputs, "parameters": {...}}`, omitting empty parameters.
    fn infer(&self, a: &Args, default: &str, inputs: Value, parameters: ParamSet) -> Result<RequestDescriptor> {
        let body = ParamSet::new()
            .set("inputs", inputs)
            .maybe("parameters", (!parameters.is_empty()).then(|| parameters.to_json()));
        Ok(self.model(a, default)?.json_params(body))
    }

    /// Raw bytes decoded from a base64 argument.
    fn upload(&self, a: &Args, default: &str, key: &str) -> Result<RequestDescriptor> {
        let data = shape::base64_decode(a, key)?;
        Ok(self.model(a, default)?.bytes("application/octet-stream", data))
    }
}

fn model_id(default: &'static str) -> Param {
    Param::string("model_id").default(default)
}

impl Provider for HuggingFace {
    const ID: &'static str = "huggingface";
    const ADAPTER_TYPE: AdapterType = AdapterType::LanguageModel;
    const ENV_VARS: &'static [&'static str] = &["HUGGINGFACE_API_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "HUGGINGFACE_API_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("huggingface_text_generation", "Continue a prompt")
                .param(Param::string("prompt").required())
                .param(model_id("mistralai/Mistral-7B-Instruct-v0.3"))
                .param(Param::integer("max_new_tokens"))
                .param(Param::number("temperature"))
                .param(Param::number("top_p"))
                .param(Param::integer("top_k"))
                .param(Param::number("repetition_penalty"))
                .param(Param::boolean("return_full_text").default(false))
                .request(|cx, a| {
                    let parameters = ParamSet::new().forward_all(
                        a,
                        &[
                            "max_new_tokens",
                            "temperature",
                            "top_p",
                            "top_k",
                            "repetition_penalty",
                            "return_full_text",
                        ],
                    );
                    cx.infer(
                        a,
                        "mistralai/Mistral-7B-Instruct-v0.3",
                        json!(a.require_str("prompt")?),
                        parameters,
                    )
                }),
            Op::new("huggingface_text_classification", "Sentiment or topic labels with scores")
                .param(Param::string("text").required())
                .param(model_id("distilbert-base-uncased-finetuned-sst-2-english"))
                .request(|cx, a| {
                    cx.infer(
                        a,
                        "distilbert-base-uncased-finetuned-sst-2-english",
                        json!(a.require_str("text")?),
                        ParamSet::new(),
                    )
                }),
            Op::new("huggingface_token_classification", "Named entities")
                .param(Param::string("text").required())
                .param(model_id("dslim/bert-base-NER"))
                .request(|cx, a| {
                    cx.infer(a, "dslim/bert-base-NER", json!(a.require_str("text")?), ParamSet::new())
                }),
            Op::new("huggingface_question_answering", "Extract an answer from a context")
                .param(Param::string("question").required())
                .param(Param::string("context").required())
                .param(model_id("deepset/roberta-base-squad2"))
                .request(|cx, a| {
                    let inputs = json!({
                        "question": a.require_str("question")?,
                        "context": a.require_str("context")?,
                    });
                    cx.infer(a, "deepset/roberta-base-squad2", inputs, ParamSet::new())
                }),
            Op::new("huggingface_summarization", "Summarize a text")
                .param(Param::string("text").required())
                .param(model_id("facebook/bart-large-cnn"))
                .param(Param::integer("max_length"))
                .param(Param::integer("min_length"))
                .request(|cx, a| {
                    cx.infer(
                        a,
                        "facebook/bart-large-cnn",
                        json!(a.require_str("text")?),
                        ParamSet::new().forward_all(a, &["max_length", "min_length"]),
                    )
                }),
            Op::new("huggingface_translation", "Translate with a language-pair model")
                .param(Param::string("text").required())
                .param(model_id("Helsinki-NLP/opus-mt-en-es"))
                .request(|cx, a| {
                    cx.infer(a, "Helsinki-NLP/opus-mt-en-es", json!(a.require_str("text")?), ParamSet::new())
                }),
            Op::new("huggingface_text_to_image", "Generate an image; returns base64")
                .param(Param::string("prompt").required())
                .param(model_id("black-forest-labs/FLUX.1-dev"))
                .param(Param::string("negative_prompt"))
                .param(Param::integer("num_inference_steps"))
                .param(Param::number("guidance_scale"))
                .request(|cx, a| {
                    let parameters = ParamSet::new().forward_all(
                        a,
                        &["negative_prompt", "num_inference_steps", "guidance_scale"],
                    );
                    Ok(cx
                        .infer(a, "black-forest-labs/FLUX.1-dev", json!(a.require_str("prompt")?), parameters)?
                        .timeout(TimeoutClass::Long))
                })
                .shape(|_, r| Ok(shape::binary(&r, "image", "image/jpeg"))),
            Op::new("huggingface_image_to_text", "Caption an image")
                .param(Param::string("image_base64").required())
                .param(model_id("Salesforce/blip-image-captioning-large"))
                .request(|cx, a| cx.upload(a, "Salesforce/blip-image-captioning-large", "image_base64")),
            Op::new("huggingface_image_classification", "Classify an image")
                .param(Param::string("image_base64").required())
                .param(model_id("google/vit-base-patch16-224"))
                .request(|cx, a| cx.upload(a, "google/vit-base-patch16-224", "image_base64")),
            Op::new("huggingface_object_detection", "Objects with labels and bounding boxes")
                .param(Param::string("image_base64").required())
                .param(model_id("facebook/detr-resnet-50"))
                .request(|cx, a| cx.upload(a, "facebook/detr-resnet-50", "image_base64")),
            Op::new("huggingface_automatic_speech_recognition", "Transcribe audio")
                .param(Param::string("audio_base64").required())
                .param(model_id("openai/whisper-large-v3"))
                .request(|cx, a| cx.upload(a, "openai/whisper-large-v3", "audio_base64")),
            Op::new("huggingface_text_to_speech", "Synthesize speech; returns base64 audio")
                .param(Param::string("text").required())
                .param(model_id("facebook/mms-tts-eng"))
                .request(|cx, a| {
                    cx.infer(a, "facebook/mms-tts-eng", json!(a.require_str("text")?), ParamSet::new())
                })
                .shape(|_, r| Ok(shape::binary(&r, "audio", "audio/flac"))),
            Op::new("huggingface_sentence_similarity", "Similarity of sentences to a source")
                .param(Param::string("source_sentence").required())
                .param(Param::array("sentences", ParamKind::String).required())
                .param(model_id("sentence-transformers/all-MiniLM-L6-v2"))
                .request(|cx, a| {
                    let inputs = json!({
                        "source_sentence": a.require_str("source_sentence")?,
                        "sentences": a.require("sentences")?,
                    });
                    cx.infer(a, "sentence-transformers/all-MiniLM-L6-v2", inputs, ParamSet::new())
                }),
            Op::new("huggingface_fill_mask", "Predict the masked token")
                .param(Param::string("text").required().describe("Text containing [MASK]"))
                .param(model_id("bert-base-uncased"))
                .request(|cx, a| {
                    cx.infer(a, "bert-base-uncased", json!(a.require_str("text")?), ParamSet::new())
                }),
            Op::new("huggingface_feature_extraction", "Embedding vectors")
                .param(Param::string("text").required())
                .param(model_id("sentence-transformers/all-MiniLM-L6-v2"))
                .request(|cx, a| {
                    cx.infer(
                        a,
                        "sentence-transformers/all-MiniLM-L6-v2",
                        json!(a.require_str("text")?),
                        ParamSet::new(),
                    )
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;
    use crate::request::Body;

    fn hf() -> crate::operation::ServiceAdapter<HuggingFace> {
        adapter(&[("HUGGINGFACE_API_TOKEN", "hf_x")])
    }

    #[test]
    fn model_path_keeps_owner_separator() {
        let d = &hf()
            .prepare("huggingface_fill_mask", json!({"text": "a [MASK] b"}))
            .unwrap()[0];
        assert_eq!(d.url, "https://api-inference.huggingface.co/models/bert-base-uncased");
        assert_eq!(model_path("org/my model"), "org/my%20model");
        assert!(d.json_body().unwrap().get("parameters").is_none());
    }

    #[test]
    fn text_generation_always_sends_full_text_flag() {
        let d = &hf()
            .prepare("huggingface_text_generation", json!({"prompt": "Once"}))
            .unwrap()[0];
        assert_eq!(
            d.json_body().unwrap()["parameters"],
            json!({"return_full_text": false})
        );
    }

    #[test]
    fn image_tasks_upload_raw_bytes() {
        let d = &hf()
            .prepare("huggingface_object_detection", json!({"image_base64": "AQID"}))
            .unwrap()[0];
        match &d.body {
            Body::Bytes { data, .. } => assert_eq!(data, &vec![1u8, 2, 3]),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn bad_base64_is_validation() {
        let err = hf()
            .prepare("huggingface_automatic_speech_recognition", json!({"audio_base64": "***"}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
