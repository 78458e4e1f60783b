//! Brave Search API.

use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::ParamSet;
use crate::request::RequestDescriptor;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

/// Brave returns at most this many results per request.
const MAX_COUNT: i64 = 20;

/// Brave Search provider context.
pub struct Brave {
    key: Credential,
    base_url: String,
}

type Op = Operation<Brave>;

impl Brave {
    fn search(&self, endpoint: &str, params: ParamSet) -> RequestDescriptor {
        RequestDescriptor::get(format!("{}/{endpoint}", self.base_url))
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip")
            .secret_header("X-Subscription-Token", self.key.expose())
            .query(params)
    }
}

/// `q`, capped `count` and `offset`, plus locale filters.
fn base_query(a: &Args) -> Result<ParamSet> {
    let count = a.i64("count")?.map(|c| c.min(MAX_COUNT));
    Ok(ParamSet::new()
        .forward_as(a, "query", "q")
        .maybe("count", count)
        .forward_all(a, &["offset", "country", "search_lang"]))
}

fn search_params(op: Op) -> Op {
    op.param(Param::string("query").required())
        .param(Param::integer("count").default(10).describe("Results (1-20)"))
        .param(Param::integer("offset").default(0))
        .param(Param::string("country").describe("e.g. US, GB, FR"))
        .param(Param::string("search_lang").describe("e.g. en, es"))
}

fn safesearch() -> Param {
    Param::string("safesearch")
        .default("moderate")
        .one_of(&["off", "moderate", "strict"])
}

fn freshness() -> Param {
    Param::string("freshness").describe("pd, pw, pm, py, or a YYYY-MM-DDtoYYYY-MM-DD range")
}

/// Condense a summarizer-enabled web search into summary, entities and
/// the first `count` sources.
fn summarize(a: &Args, body: &Value) -> Result<Value> {
    let count = a.i64_or("count", 5)?.clamp(0, MAX_COUNT) as usize;
    let include_entities = a.bool_or("entity_info", true)?;
    let sources: Vec<Value> = body
        .pointer("/web/results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(count)
                .map(|item| {
                    json!({
                        "title": item.get("title"),
                        "url": item.get("url"),
                        "description": item.get("description"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(json!({
        "summary": body.pointer("/summarizer/key").and_then(Value::as_str).unwrap_or(""),
        "entities": if include_entities { body.get("entities").cloned().unwrap_or_else(|| json!([])) } else { json!([]) },
        "infobox": body.get("infobox").cloned().unwrap_or_else(|| json!({})),
        "sources": sources,
    }))
}

impl Provider for Brave {
    const ID: &'static str = "brave";
    const ADAPTER_TYPE: AdapterType = AdapterType::Search;
    const ENV_VARS: &'static [&'static str] = &["BRAVE_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "BRAVE_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            search_params(Op::new("brave_web_search", "Web search"))
                .param(safesearch())
                .param(freshness())
                .param(Param::boolean("text_decorations").default(true))
                .param(Param::boolean("spellcheck").default(true))
                .request(|cx, a| {
                    let q = base_query(a)?.forward_all(
                        a,
                        &["safesearch", "freshness", "text_decorations", "spellcheck"],
                    );
                    Ok(cx.search("web/search", q))
                }),
            search_params(Op::new("brave_news_search", "Recent news articles"))
                .param(safesearch())
                .param(freshness())
                .param(Param::boolean("spellcheck").default(true))
                .request(|cx, a| {
                    let q = base_query(a)?.forward_all(a, &["safesearch", "freshness", "spellcheck"]);
                    Ok(cx.search("news/search", q))
                }),
            search_params(Op::new("brave_image_search", "Image search"))
                .param(safesearch())
                .param(Param::boolean("spellcheck").default(true))
                .request(|cx, a| {
                    let q = base_query(a)?.forward_all(a, &["safesearch", "spellcheck"]);
                    Ok(cx.search("images/search", q))
                }),
            search_params(Op::new("brave_video_search", "Video search"))
                .param(safesearch())
                .param(Param::boolean("spellcheck").default(true))
                .request(|cx, a| {
                    let q = base_query(a)?.forward_all(a, &["safesearch", "spellcheck"]);
                    Ok(cx.search("videos/search", q))
                }),
            Op::new("brave_suggest", "Query autocompletion; returns the suggestion list")
                .param(Param::string("query").required())
                .param(Param::string("country"))
                .param(Param::string("search_lang"))
                .request(|cx, a| {
                    Ok(cx.search(
                        "suggest",
                        ParamSet::new()
                            .forward_as(a, "query", "q")
                            .forward_all(a, &["country", "search_lang"]),
                    ))
                })
                .shape(|_, r| {
                    let body = r.json()?;
                    Ok(body.get("results").cloned().unwrap_or_else(|| json!([])))
                }),
            search_params(Op::new("brave_local_search", "Places and businesses near a location"))
                .request(|cx, a| Ok(cx.search("local/search", base_query(a)?))),
            Op::new(
                "brave_summarize_search",
                "Search with the summarizer enabled; returns summary, entities and sources",
            )
            .param(Param::string("query").required())
            .param(Param::integer("count").default(5).describe("Sources to include (1-20)"))
            .param(Param::boolean("entity_info").default(true))
            .request(|cx, a| {
                let q = base_query(a)?
                    .set("summary", true)
                    .forward(a, "entity_info");
                Ok(cx.search("web/search", q))
            })
            .shape(|a, r| summarize(a, &r.json()?)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;

    fn brave() -> ServiceAdapter<Brave> {
        adapter(&[("BRAVE_API_KEY", "bsk")])
    }

    #[test]
    fn count_is_capped_and_header_set() {
        let d = &brave()
            .prepare("brave_web_search", json!({"query": "rust", "count": 50}))
            .unwrap()[0];
        assert_eq!(d.url, "https://api.search.brave.com/res/v1/web/search");
        assert_eq!(d.query_value("count"), Some("20"));
        assert_eq!(d.query_value("q"), Some("rust"));
        assert_eq!(d.query_value("spellcheck"), Some("true"));
        assert_eq!(d.header_value("x-subscription-token"), Some("bsk"));
        assert!(d.query_value("freshness").is_none());
    }

    #[test]
    fn summarize_shapes_sources() {
        let body = json!({
            "summarizer": {"key": "sum-1"},
            "entities": [{"name": "Rust"}],
            "web": {"results": [
                {"title": "a", "url": "u1", "description": "d1", "extra": 1},
                {"title": "b", "url": "u2", "description": "d2"},
                {"title": "c", "url": "u3", "description": "d3"}
            ]}
        });
        let a = Args::from_value("brave_summarize_search", json!({"count": 2, "entity_info": false})).unwrap();
        let out = summarize(&a, &body).unwrap();
        assert_eq!(out["summary"], "sum-1");
        assert_eq!(out["entities"], json!([]));
        assert_eq!(out["sources"].as_array().unwrap().len(), 2);
        assert!(out["sources"][0].get("extra").is_none());
    }
}
