//! Pinecone vector database.
//!
//! Index management goes to the control plane.  Vector operations go to
//! the index's own host, which needs `PINECONE_ENVIRONMENT`; that variable
//! is checked per call, so control-plane tools work without it.

use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, optional, require};
use crate::error::{AdapterError, Result};
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass, encode_segment};
use crate::traits::AdapterType;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// Pinecone provider context.
pub struct Pinecone {
    key: Credential,
    environment: Option<String>,
    base_override: Option<String>,
}

type Op = Operation<Pinecone>;

impl Pinecone {
    fn control(&self, method: reqwest::Method, path: &str) -> RequestDescriptor {
        let base = self.base_override.as_deref().unwrap_or(CONTROL_PLANE_URL);
        RequestDescriptor::new(method, format!("{base}{path}"))
            .secret_header("Api-Key", self.key.expose())
            .timeout(TimeoutClass::Metadata)
    }

    /// Host serving the vectors of `index`.
    pub fn index_host(&self, index: &str) -> Result<String> {
        let environment = self.environment.as_deref().ok_or_else(|| {
            AdapterError::ConfigError(
                "PINECONE_ENVIRONMENT must be set for vector operations".into(),
            )
        })?;
        Ok(match &self.base_override {
            Some(base) => base.clone(),
            None => format!("https://{index}-{environment}.svc.pinecone.io"),
        })
    }

    fn data(&self, method: reqwest::Method, a: &Args, path: &str) -> Result<RequestDescriptor> {
        let host = self.index_host(host_label(a)?)?;
        Ok(RequestDescriptor::new(method, format!("{host}{path}"))
            .secret_header("Api-Key", self.key.expose())
            .timeout(TimeoutClass::Standard))
    }
}

/// The index name, which becomes part of a hostname: lowercase
/// alphanumerics and `-` only.
fn host_label(a: &Args) -> Result<&str> {
    let name = a.require_str("index_name")?;
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(name)
    } else {
        Err(a.invalid(format!(
            "`index_name` must contain only lowercase letters, digits and '-', got {name:?}"
        )))
    }
}

fn index_name() -> Param {
    Param::string("index_name").required()
}

fn namespace() -> Param {
    Param::string("namespace").default("")
}

impl Provider for Pinecone {
    const ID: &'static str = "pinecone";
    const ADAPTER_TYPE: AdapterType = AdapterType::VectorDatabase;
    const ENV_VARS: &'static [&'static str] = &["PINECONE_API_KEY"];
    const OPTIONAL_ENV_VARS: &'static [&'static str] = &["PINECONE_ENVIRONMENT"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "PINECONE_API_KEY")?,
            environment: optional(env, "PINECONE_ENVIRONMENT"),
            base_override: settings.base_url.clone(),
        })
    }

    fn operations() -> Vec<Op> {
        use reqwest::Method;

        vec![
            // -- Control plane --
            Op::new("pinecone_list_indexes", "Indexes in the project")
                .request(|cx, _| Ok(cx.control(Method::GET, "/indexes"))),
            Op::new("pinecone_create_index", "Create an index")
                .param(Param::string("name").required())
                .param(Param::integer("dimension").required())
                .param(Param::string("metric").default("cosine").one_of(&["cosine", "euclidean", "dotproduct"]))
                .param(Param::string("spec_type").default("serverless").one_of(&["serverless", "pod"]))
                .param(Param::string("cloud").default("aws"))
                .param(Param::string("region").default("us-east-1"))
                .request(|cx, a| {
                    let mut spec = serde_json::Map::new();
                    spec.insert(
                        a.require_str("spec_type")?.to_string(),
                        ParamSet::new().forward_all(a, &["cloud", "region"]).to_json(),
                    );
                    let body = ParamSet::new()
                        .forward_all(a, &["name", "dimension", "metric"])
                        .set("spec", Value::Object(spec));
                    Ok(cx
                        .control(Method::POST, "/indexes")
                        .timeout(TimeoutClass::Standard)
                        .json_params(body))
                }),
            Op::new("pinecone_describe_index", "Index configuration and status")
                .param(index_name())
                .request(|cx, a| {
                    let name = encode_segment(a.require_str("index_name")?);
                    Ok(cx.control(Method::GET, &format!("/indexes/{name}")))
                }),
            Op::new("pinecone_delete_index", "Delete an index")
                .param(index_name())
                .request(|cx, a| {
                    let name = encode_segment(a.require_str("index_name")?);
                    Ok(cx
                        .control(Method::DELETE, &format!("/indexes/{name}"))
                        .timeout(TimeoutClass::Standard))
                })
                .shape(|a, _| Ok(json!({ "status": "deleted", "index": a.require_str("index_name")? }))),
            Op::new("pinecone_create_collection", "Snapshot an index into a collection")
                .param(Param::string("name").required())
                .param(Param::string("source_index").required())
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "name")
                        .forward_as(a, "source_index", "source");
                    Ok(cx
                        .control(Method::POST, "/collections")
                        .timeout(TimeoutClass::Standard)
                        .json_params(body))
                }),
            // -- Data plane --
            Op::new("pinecone_upsert_vectors", "Insert or update vectors")
                .param(index_name())
                .param(
                    Param::array("vectors", ParamKind::Object)
                        .required()
                        .describe("[{\"id\", \"values\", \"metadata\"?}]"),
                )
                .param(namespace())
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["vectors", "namespace"]);
                    Ok(cx.data(Method::POST, a, "/vectors/upsert")?.json_params(body))
                }),
            Op::new("pinecone_query_vectors", "Nearest neighbours of a vector or a stored id")
                .param(index_name())
                .param(Param::array("vector", ParamKind::Number))
                .param(Param::string("id"))
                .param(Param::integer("top_k").default(10))
                .param(namespace())
                .param(Param::boolean("include_values").default(false))
                .param(Param::boolean("include_metadata").default(true))
                .param(Param::object("filter").describe("{\"genre\": {\"$eq\": \"drama\"}}"))
                .request(|cx, a| {
                    let target = if a.has("vector") {
                        ParamSet::new().forward(a, "vector")
                    } else if a.has("id") {
                        ParamSet::new().forward(a, "id")
                    } else {
                        return Err(a.invalid("provide either `vector` or `id`"));
                    };
                    let body = ParamSet::new()
                        .forward_as(a, "top_k", "topK")
                        .forward(a, "namespace")
                        .forward_as(a, "include_values", "includeValues")
                        .forward_as(a, "include_metadata", "includeMetadata")
                        .extend(target)
                        .forward(a, "filter");
                    Ok(cx.data(Method::POST, a, "/query")?.json_params(body))
                }),
            Op::new("pinecone_fetch_vectors", "Vectors by id")
                .param(index_name())
                .param(Param::array("ids", ParamKind::String).required())
                .param(namespace())
                .request(|cx, a| {
                    let query = ParamSet::new().forward_all(a, &["ids", "namespace"]);
                    Ok(cx.data(Method::GET, a, "/vectors/fetch")?.query(query))
                }),
            Op::new("pinecone_delete_vectors", "Delete by ids, by filter, or everything in a namespace")
                .param(index_name())
                .param(Param::array("ids", ParamKind::String))
                .param(Param::boolean("delete_all").default(false))
                .param(Param::object("filter"))
                .param(namespace())
                .request(|cx, a| {
                    let selector = if a.has("ids") {
                        ParamSet::new().forward(a, "ids")
                    } else if a.bool_or("delete_all", false)? {
                        ParamSet::new().set("deleteAll", true)
                    } else if a.has("filter") {
                        ParamSet::new().forward(a, "filter")
                    } else {
                        return Err(a.invalid("provide `ids`, `delete_all: true` or `filter`"));
                    };
                    let body = ParamSet::new().forward(a, "namespace").extend(selector);
                    Ok(cx.data(Method::POST, a, "/vectors/delete")?.json_params(body))
                })
                .shape(|_, _| Ok(json!({ "status": "deleted" }))),
            Op::new("pinecone_update_vector", "Replace values and/or merge metadata")
                .param(index_name())
                .param(Param::string("id").required())
                .param(Param::array("values", ParamKind::Number))
                .param(Param::object("set_metadata"))
                .param(namespace())
                .request(|cx, a| {
                    if !a.has("values") && !a.has("set_metadata") {
                        return Err(a.invalid("provide `values` or `set_metadata`"));
                    }
                    let body = ParamSet::new()
                        .forward_all(a, &["id", "namespace", "values"])
                        .forward_as(a, "set_metadata", "setMetadata");
                    Ok(cx.data(Method::POST, a, "/vectors/update")?.json_params(body))
                })
                .shape(|a, _| Ok(json!({ "status": "updated", "id": a.require_str("id")? }))),
            Op::new("pinecone_describe_index_stats", "Vector counts per namespace")
                .param(index_name())
                .param(Param::object("filter"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward(a, "filter");
                    Ok(cx
                        .data(Method::POST, a, "/describe_index_stats")?
                        .timeout(TimeoutClass::Metadata)
                        .json_params(body))
                }),
            Op::new("pinecone_list_vector_ids", "Vector ids in a namespace")
                .param(index_name())
                .param(namespace())
                .param(Param::string("prefix"))
                .param(Param::integer("limit"))
                .request(|cx, a| {
                    let query = ParamSet::new().forward_all(a, &["namespace", "prefix", "limit"]);
                    Ok(cx.data(Method::GET, a, "/vectors/list")?.query(query))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::providers::test_support::adapter;

    const KEY: (&str, &str) = ("PINECONE_API_KEY", "pc");

    #[test]
    fn data_plane_host_includes_environment() {
        let d = &adapter::<Pinecone>(&[KEY, ("PINECONE_ENVIRONMENT", "us-west1-gcp")])
            .prepare("pinecone_fetch_vectors", json!({"index_name": "docs", "ids": ["a", "b"]}))
            .unwrap()[0];
        assert!(d.url.starts_with("https://docs-us-west1-gcp.svc.pinecone.io/vectors/fetch"));
        assert_eq!(d.header_value("Api-Key"), Some("pc"));
        assert_eq!(d.query.iter().filter(|(k, _)| k == "ids").count(), 2);
    }

    #[test]
    fn missing_environment_only_blocks_data_plane() {
        let pc = adapter::<Pinecone>(&[KEY]);
        assert!(pc.prepare("pinecone_list_indexes", json!({})).is_ok());
        let err = pc
            .prepare("pinecone_upsert_vectors", json!({"index_name": "docs", "vectors": []}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn index_names_cannot_redirect_the_host() {
        let pc = adapter::<Pinecone>(&[KEY, ("PINECONE_ENVIRONMENT", "e")]);
        for name in ["evil.com/x", "a@attacker.io", "docs.evil", "Docs", "-docs", ""] {
            let err = pc
                .prepare("pinecone_fetch_vectors", json!({"index_name": name, "ids": ["a"]}))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{name}");
        }
        assert!(pc
            .prepare("pinecone_fetch_vectors", json!({"index_name": "docs-2", "ids": ["a"]}))
            .is_ok());
    }

    #[test]
    fn query_needs_vector_or_id() {
        let pc = adapter::<Pinecone>(&[KEY, ("PINECONE_ENVIRONMENT", "e")]);
        let err = pc.prepare("pinecone_query_vectors", json!({"index_name": "docs"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let d = &pc
            .prepare("pinecone_query_vectors", json!({"index_name": "docs", "id": "v1"}))
            .unwrap()[0];
        let body = d.json_body().unwrap();
        assert_eq!(body["id"], "v1");
        assert_eq!(body["topK"], 10);
        assert_eq!(body["includeMetadata"], true);
    }

    #[test]
    fn delete_selector_precedence() {
        let pc = adapter::<Pinecone>(&[KEY, ("PINECONE_ENVIRONMENT", "e")]);
        let d = &pc
            .prepare(
                "pinecone_delete_vectors",
                json!({"index_name": "docs", "delete_all": true, "filter": {"a": 1}}),
            )
            .unwrap()[0];
        assert_eq!(d.json_body().unwrap(), &json!({"namespace": "", "deleteAll": true}));
        assert!(pc
            .prepare("pinecone_delete_vectors", json!({"index_name": "docs"}))
            .is_err());
    }

    #[test]
    fn create_index_nests_spec_by_type() {
        let d = &adapter::<Pinecone>(&[KEY])
            .prepare("pinecone_create_index", json!({"name": "docs", "dimension": 3}))
            .unwrap()[0];
        assert_eq!(
            d.json_body().unwrap()["spec"],
            json!({"serverless": {"cloud": "aws", "region": "us-east-1"}})
        );
    }
}
