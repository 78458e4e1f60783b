//! Context7 documentation API.

use reqwest::Method;
use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.context7.com/v1";
const MAX_SEARCH_RESULTS: i64 = 50;

/// Context7 provider context.
pub struct Context7 {
    key: Credential,
    base_url: String,
}

type Op = Operation<Context7>;

impl Context7 {
    fn call(&self, method: Method, endpoint: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}/{endpoint}", self.base_url))
            .bearer(&self.key)
            .timeout(TimeoutClass::Standard)
    }

    fn lookup(&self, endpoint: &str, params: ParamSet) -> RequestDescriptor {
        self.call(Method::GET, endpoint).query(params)
    }

    fn submit(&self, endpoint: &str, body: ParamSet) -> RequestDescriptor {
        self.call(Method::POST, endpoint).json_params(body)
    }
}

/// `body[field]`, or an empty list when the field is missing.
fn list_field(body: Value, field: &str) -> Value {
    match body {
        Value::Object(mut map) => map.remove(field).unwrap_or_else(|| json!([])),
        _ => json!([]),
    }
}

impl Provider for Context7 {
    const ID: &'static str = "context7";
    const ADAPTER_TYPE: AdapterType = AdapterType::Documents;
    const ENV_VARS: &'static [&'static str] = &["CONTEXT7_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "CONTEXT7_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("context7_search_documentation", "Search documentation across libraries")
                .param(Param::string("query").required())
                .param(Param::string("language"))
                .param(Param::string("framework"))
                .param(Param::integer("limit").default(10).describe("Maximum 50"))
                .request(|cx, a| {
                    let limit = a.i64("limit")?.map(|l| l.min(MAX_SEARCH_RESULTS));
                    let q = ParamSet::new()
                        .forward_as(a, "query", "q")
                        .maybe("limit", limit)
                        .forward_all(a, &["language", "framework"]);
                    Ok(cx.lookup("search", q))
                })
                .shape(|_, r| Ok(list_field(r.json()?, "results"))),
            Op::new("context7_get_library_docs", "Documentation for a library")
                .param(Param::string("library").required())
                .param(Param::string("version"))
                .param(Param::string("topic"))
                .request(|cx, a| {
                    Ok(cx.lookup(
                        "docs",
                        ParamSet::new().forward_all(a, &["library", "version", "topic"]),
                    ))
                }),
            Op::new("context7_get_code_examples", "Code examples for a library and use case")
                .param(Param::string("library").required())
                .param(Param::string("use_case").required())
                .param(Param::string("language"))
                .request(|cx, a| {
                    Ok(cx.submit(
                        "examples",
                        ParamSet::new().forward_all(a, &["library", "use_case", "language"]),
                    ))
                })
                .shape(|_, r| Ok(list_field(r.json()?, "examples"))),
            Op::new("context7_explain_code", "Explain a code snippet with doc references")
                .param(Param::string("code").required())
                .param(Param::string("language"))
                .param(Param::string("context"))
                .request(|cx, a| {
                    Ok(cx.submit(
                        "explain",
                        ParamSet::new().forward_all(a, &["code", "language", "context"]),
                    ))
                }),
            Op::new("context7_get_api_reference", "Reference for one function, class or method")
                .param(Param::string("library").required())
                .param(Param::string("api_name").required())
                .param(Param::string("version"))
                .request(|cx, a| {
                    Ok(cx.lookup(
                        "api-reference",
                        ParamSet::new()
                            .forward(a, "library")
                            .forward_as(a, "api_name", "api")
                            .forward(a, "version"),
                    ))
                }),
            Op::new("context7_compare_libraries", "Compare libraries for a use case")
                .param(Param::array("libraries", ParamKind::String).required())
                .param(Param::string("use_case").required())
                .param(Param::string("language"))
                .request(|cx, a| {
                    Ok(cx.submit(
                        "compare",
                        ParamSet::new().forward_all(a, &["libraries", "use_case", "language"]),
                    ))
                }),
            Op::new("context7_get_migration_guide", "Migrate between libraries or versions")
                .param(Param::string("from_library").required())
                .param(Param::string("to_library").required())
                .param(Param::string("from_version"))
                .param(Param::string("to_version"))
                .request(|cx, a| {
                    Ok(cx.submit(
                        "migrate",
                        ParamSet::new()
                            .forward_as(a, "from_library", "from")
                            .forward_as(a, "to_library", "to")
                            .forward_all(a, &["from_version", "to_version"]),
                    ))
                }),
            Op::new("context7_get_best_practices", "Recommended patterns for a library")
                .param(Param::string("library").required())
                .param(Param::string("topic"))
                .request(|cx, a| {
                    Ok(cx.lookup(
                        "best-practices",
                        ParamSet::new().forward_all(a, &["library", "topic"]),
                    ))
                }),
            Op::new("context7_troubleshoot_error", "Causes and fixes for an error message")
                .param(Param::string("error_message").required())
                .param(Param::string("library"))
                .param(Param::string("code_context"))
                .request(|cx, a| {
                    Ok(cx.submit(
                        "troubleshoot",
                        ParamSet::new()
                            .forward_as(a, "error_message", "error")
                            .forward_all(a, &["library", "code_context"]),
                    ))
                }),
            Op::new("context7_list_supported_libraries", "Supported libraries")
                .param(Param::string("language"))
                .param(Param::string("category"))
                .request(|cx, a| {
                    Ok(cx.lookup(
                        "libraries",
                        ParamSet::new().forward_all(a, &["language", "category"]),
                    ))
                })
                .shape(|_, r| Ok(list_field(r.json()?, "libraries"))),
            Op::new("context7_get_changelog", "Release notes for a library")
                .param(Param::string("library").required())
                .param(Param::string("from_version"))
                .param(Param::string("to_version"))
                .request(|cx, a| {
                    Ok(cx.lookup(
                        "changelog",
                        ParamSet::new().forward_all(a, &["library", "from_version", "to_version"]),
                    ))
                }),
        ]
    }
}
