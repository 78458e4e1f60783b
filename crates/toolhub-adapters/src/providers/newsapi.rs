//! NewsAPI headlines and article search.

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::ParamSet;
use crate::request::RequestDescriptor;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
const MAX_PAGE_SIZE: i64 = 100;

const CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

/// NewsAPI provider context.
pub struct NewsApi {
    key: Credential,
    base_url: String,
}

type Op = Operation<NewsApi>;

impl NewsApi {
    fn get(&self, path: &str, query: ParamSet) -> RequestDescriptor {
        RequestDescriptor::get(format!("{}{path}", self.base_url))
            .secret_header("X-Api-Key", self.key.expose())
            .query(query)
    }

    fn everything(&self, query: ParamSet) -> RequestDescriptor {
        self.get("/everything", query)
    }

    fn headlines(&self, query: ParamSet) -> RequestDescriptor {
        self.get("/top-headlines", query)
    }
}

/// `pageSize` capped at 100, plus `page` when the operation pages.
fn page(a: &Args) -> Result<ParamSet> {
    let size = a.i64("page_size")?.map(|n| n.min(MAX_PAGE_SIZE));
    Ok(ParamSet::new()
        .maybe("pageSize", size)
        .forward(a, "page"))
}

fn paged(op: Op) -> Op {
    op.param(Param::integer("page_size").default(20).describe("Max 100"))
        .param(Param::integer("page").default(1))
}

fn dated(op: Op) -> Op {
    op.param(Param::string("from_date").describe("YYYY-MM-DD"))
        .param(Param::string("to_date").describe("YYYY-MM-DD"))
        .param(
            Param::string("sort_by")
                .default("publishedAt")
                .one_of(&["relevancy", "popularity", "publishedAt"]),
        )
}

fn date_range(a: &Args) -> ParamSet {
    ParamSet::new()
        .forward_as(a, "from_date", "from")
        .forward_as(a, "to_date", "to")
        .forward_as(a, "sort_by", "sortBy")
}

fn category() -> Param {
    Param::string("category").one_of(CATEGORIES)
}

impl Provider for NewsApi {
    const ID: &'static str = "newsapi";
    const ADAPTER_TYPE: AdapterType = AdapterType::Search;
    const ENV_VARS: &'static [&'static str] = &["NEWS_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "NEWS_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            paged(dated(Op::new("newsapi_search_everything", "Search all indexed articles")))
                .param(Param::string("q").required())
                .param(Param::string("sources").describe("Comma-separated source IDs"))
                .param(Param::string("domains").describe("Comma-separated domains"))
                .param(Param::string("language"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["q", "sources", "domains", "language"])
                        .extend(date_range(a))
                        .extend(page(a)?);
                    Ok(cx.everything(query))
                }),
            paged(Op::new(
                "newsapi_get_top_headlines",
                "Breaking headlines; sources cannot be combined with country or category",
            ))
            .param(Param::string("country").describe("2-letter ISO code"))
            .param(category())
            .param(Param::string("sources"))
            .param(Param::string("q"))
            .request(|cx, a| {
                let query = ParamSet::new()
                    .forward_all(a, &["country", "category", "sources", "q"])
                    .extend(page(a)?);
                Ok(cx.headlines(query))
            }),
            paged(dated(Op::new("newsapi_search_by_source", "Articles from specific sources")))
                .param(Param::string("sources").required())
                .param(Param::string("q"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["sources", "q"])
                        .extend(date_range(a))
                        .extend(page(a)?);
                    Ok(cx.everything(query))
                }),
            Op::new("newsapi_get_sources", "Available news sources")
                .param(category())
                .param(Param::string("language"))
                .param(Param::string("country"))
                .request(|cx, a| {
                    Ok(cx.get(
                        "/top-headlines/sources",
                        ParamSet::new().forward_all(a, &["category", "language", "country"]),
                    ))
                }),
            paged(Op::new("newsapi_search_by_category", "Top headlines in a category"))
                .param(category().required())
                .param(Param::string("country"))
                .param(Param::string("q"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["category", "country", "q"])
                        .extend(page(a)?);
                    Ok(cx.headlines(query))
                }),
            paged(Op::new("newsapi_search_by_country", "Top headlines for a country"))
                .param(Param::string("country").required())
                .param(category())
                .param(Param::string("q"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["country", "category", "q"])
                        .extend(page(a)?);
                    Ok(cx.headlines(query))
                }),
            paged(dated(Op::new("newsapi_search_by_language", "Articles in one language")))
                .param(Param::string("language").required())
                .param(Param::string("q").required())
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["language", "q"])
                        .extend(date_range(a))
                        .extend(page(a)?);
                    Ok(cx.everything(query))
                }),
            Op::new("newsapi_get_trending_topics", "Current headlines for a country and category")
                .param(Param::string("country").default("us"))
                .param(category().default("general"))
                .param(Param::integer("page_size").default(20))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["country", "category"])
                        .extend(page(a)?);
                    Ok(cx.headlines(query))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;

    fn prepare(tool: &str, params: serde_json::Value) -> RequestDescriptor {
        adapter::<NewsApi>(&[("NEWS_API_KEY", "n")])
            .prepare(tool, params)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn page_size_is_capped() {
        let d = prepare("newsapi_search_everything", json!({"q": "rust", "page_size": 500}));
        assert_eq!(d.query_value("pageSize"), Some("100"));
        assert_eq!(d.query_value("sortBy"), Some("publishedAt"));
        assert!(d.query_value("from").is_none());
        assert_eq!(d.header_value("X-Api-Key"), Some("n"));
    }

    #[test]
    fn date_range_uses_wire_names() {
        let d = prepare(
            "newsapi_search_by_language",
            json!({"language": "de", "q": "bahn", "from_date": "2024-01-01"}),
        );
        assert!(d.url.ends_with("/everything"));
        assert_eq!(d.query_value("from"), Some("2024-01-01"));
    }

    #[test]
    fn trending_has_no_page_number() {
        let d = prepare("newsapi_get_trending_topics", json!({}));
        assert!(d.url.ends_with("/top-headlines"));
        assert_eq!(d.query_value("country"), Some("us"));
        assert_eq!(d.query_value("category"), Some("general"));
        assert!(d.query_value("page").is_none());
    }
}
