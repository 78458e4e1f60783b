//! DeepL translation API.
//!
//! Keys ending in `:fx` belong to the free plan and are served from a
//! different host.  Boolean options are sent as `"1"`/`"0"`.

use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::{ParamSet, scalar_text};
use crate::request::{MultipartField, RequestDescriptor, TimeoutClass, encode_segment};
use crate::shape;
use crate::traits::AdapterType;

const PRO_BASE_URL: &str = "https://api.deepl.com/v2";
const FREE_BASE_URL: &str = "https://api-free.deepl.com/v2";
const FREE_KEY_SUFFIX: &str = ":fx";

/// Characters sent for language detection.
const DETECT_CHARS: usize = 1000;
/// Characters of the input echoed back by detection.
const ECHO_CHARS: usize = 100;

/// DeepL provider context.
pub struct DeepL {
    key: Credential,
    base_url: String,
}

type Op = Operation<DeepL>;

/// API root for a key when no override is configured.
pub fn default_base_url(key: &str) -> &'static str {
    if key.ends_with(FREE_KEY_SUFFIX) {
        FREE_BASE_URL
    } else {
        PRO_BASE_URL
    }
}

impl DeepL {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url))
            .secret_header("Authorization", format!("DeepL-Auth-Key {}", self.key.expose()))
    }

    fn document(&self, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let path = format!("/document/{}{suffix}", encode_segment(a.require_str("document_id")?));
        Ok(self
            .call(Method::POST, &path)
            .json_params(ParamSet::new().forward(a, "document_key")))
    }
}

/// `text` as a list, whether the caller passed one string or several.
fn text_list(a: &Args) -> Result<Value> {
    match a.require("text")? {
        Value::String(s) => Ok(json!([s])),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(Value::Array(items.clone())),
        _ => Err(a.invalid("`text` must be a string or a list of strings")),
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Glossary entries as one `source<sep>target` pair per line.
fn glossary_entries(entries: &Map<String, Value>, format: &str) -> String {
    let sep = if format == "csv" { "," } else { "\t" };
    entries
        .iter()
        .map(|(k, v)| format!("{k}{sep}{}", scalar_text(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn detected(a: &Args, body: Value) -> Result<Value> {
    let lang = body
        .pointer("/translations/0/detected_source_language")
        .cloned();
    let Some(lang) = lang else {
        return Ok(body);
    };
    let text = a.require_str("text")?;
    let echo = if text.chars().count() > ECHO_CHARS {
        format!("{}...", truncate_chars(text, ECHO_CHARS))
    } else {
        text.to_string()
    };
    Ok(json!({ "detected_language": lang, "text": echo }))
}

fn formality() -> Param {
    Param::string("formality").one_of(&["default", "more", "less", "prefer_more", "prefer_less"])
}

impl Provider for DeepL {
    const ID: &'static str = "deepl";
    const ADAPTER_TYPE: AdapterType = AdapterType::Translation;
    const ENV_VARS: &'static [&'static str] = &["DEEPL_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        let key = require(env, Self::ID, "DEEPL_API_KEY")?;
        let base_url = settings.base_url_or(default_base_url(key.expose()));
        Ok(Self { key, base_url })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("deepl_translate_text", "Translate one string or a list of strings")
                .param(Param::any("text").required().describe("String or list of strings"))
                .param(Param::string("target_lang").required().describe("e.g. DE, FR, ES"))
                .param(Param::string("source_lang").describe("Detected when omitted"))
                .param(formality())
                .param(Param::boolean("preserve_formatting").default(false))
                .param(Param::string("tag_handling").one_of(&["xml", "html"]))
                .param(Param::string("split_sentences").default("1").one_of(&["0", "1", "nonewlines"]))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .set("text", text_list(a)?)
                        .forward(a, "target_lang")
                        .set("preserve_formatting", flag(a.bool_or("preserve_formatting", false)?))
                        .forward_all(a, &["split_sentences", "source_lang", "formality", "tag_handling"]);
                    Ok(cx.call(Method::POST, "/translate").json_params(body))
                }),
            Op::new(
                "deepl_translate_document",
                "Upload a document (PDF, DOCX, PPTX, ...) for translation",
            )
            .param(Param::string("document").required().describe("Base64 file content"))
            .param(Param::string("filename").required().describe("Used for format detection"))
            .param(Param::string("target_lang").required())
            .param(Param::string("source_lang"))
            .param(formality())
            .request(|cx, a| {
                let data = shape::base64_decode(a, "document")?;
                let mut fields: Vec<MultipartField> = ParamSet::new()
                    .forward_all(a, &["target_lang", "source_lang", "formality"])
                    .to_form()
                    .into_iter()
                    .map(|(name, value)| MultipartField::Text { name, value })
                    .collect();
                fields.push(MultipartField::File {
                    name: "file".into(),
                    filename: a.require_str("filename")?.to_string(),
                    content_type: "application/octet-stream".into(),
                    data,
                });
                Ok(cx
                    .call(Method::POST, "/document")
                    .multipart(fields)
                    .timeout(TimeoutClass::Long))
            }),
            Op::new("deepl_get_document_status", "Translation progress of an uploaded document")
                .param(Param::string("document_id").required())
                .param(Param::string("document_key").required())
                .request(|cx, a| cx.document(a, "")),
            Op::new("deepl_download_translated_document", "Download a finished translation as base64")
                .param(Param::string("document_id").required())
                .param(Param::string("document_key").required())
                .request(|cx, a| Ok(cx.document(a, "/result")?.timeout(TimeoutClass::Long)))
                .shape(|a, r| {
                    let mut out = shape::binary(&r, "content", "application/octet-stream");
                    if let Some(obj) = out.as_object_mut() {
                        obj.insert("success".into(), json!(true));
                        obj.insert("document_id".into(), json!(a.require_str("document_id")?));
                        obj.insert("size".into(), json!(r.body.len()));
                    }
                    Ok(out)
                }),
            Op::new("deepl_detect_language", "Detect the language of a text")
                .param(Param::string("text").required())
                .request(|cx, a| {
                    let sample = truncate_chars(a.require_str("text")?, DETECT_CHARS);
                    Ok(cx
                        .call(Method::POST, "/translate")
                        .json(json!({ "text": [sample], "target_lang": "EN" })))
                })
                .shape(|a, r| detected(a, r.json()?)),
            Op::new("deepl_list_languages", "Supported source or target languages")
                .param(Param::string("language_type").default("target").one_of(&["source", "target"]))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/languages")
                        .query(ParamSet::new().forward_as(a, "language_type", "type")))
                })
                .shape(|_, r| Ok(json!({ "languages": r.json()? }))),
            Op::new("deepl_get_usage", "Character usage in the current billing period")
                .request(|cx, _| Ok(cx.call(Method::GET, "/usage"))),
            // -- Glossaries --
            Op::new("deepl_list_glossaries", "Custom glossaries")
                .request(|cx, _| Ok(cx.call(Method::GET, "/glossaries"))),
            Op::new("deepl_create_glossary", "Create a glossary from a source-to-target map")
                .param(Param::string("name").required())
                .param(Param::string("source_lang").required())
                .param(Param::string("target_lang").required())
                .param(Param::object("entries").required().describe("{\"source term\": \"target term\"}"))
                .param(Param::string("entries_format").default("tsv").one_of(&["tsv", "csv"]))
                .request(|cx, a| {
                    let format = a.str_or("entries_format", "tsv")?;
                    let entries = a
                        .object("entries")?
                        .ok_or_else(|| a.invalid("missing required parameter `entries`"))?;
                    let body = ParamSet::new()
                        .forward_all(a, &["name", "source_lang", "target_lang"])
                        .set("entries", glossary_entries(entries, format))
                        .set("entries_format", format);
                    Ok(cx.call(Method::POST, "/glossaries").json_params(body))
                }),
            Op::new("deepl_get_glossary", "Glossary details")
                .param(Param::string("glossary_id").required())
                .request(|cx, a| {
                    Ok(cx.call(
                        Method::GET,
                        &format!("/glossaries/{}", encode_segment(a.require_str("glossary_id")?)),
                    ))
                }),
            Op::new("deepl_delete_glossary", "Delete a glossary")
                .param(Param::string("glossary_id").required())
                .request(|cx, a| {
                    Ok(cx.call(
                        Method::DELETE,
                        &format!("/glossaries/{}", encode_segment(a.require_str("glossary_id")?)),
                    ))
                })
                .shape(|a, _| Ok(shape::ack("glossary_id", a.require_str("glossary_id")?))),
            Op::new("deepl_translate_with_glossary", "Translate using a custom glossary")
                .param(Param::any("text").required())
                .param(Param::string("target_lang").required())
                .param(Param::string("glossary_id").required())
                .param(Param::string("source_lang"))
                .param(formality())
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .set("text", text_list(a)?)
                        .forward_all(a, &["target_lang", "glossary_id", "source_lang", "formality"]);
                    Ok(cx.call(Method::POST, "/translate").json_params(body))
                }),
        ]
    }
}
