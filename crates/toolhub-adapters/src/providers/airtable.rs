//! Airtable bases, tables and records.

use reqwest::Method;
use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, cap_batch, encode_segment};
use crate::traits::AdapterType;
use crate::transport::ResponseEnvelope;

const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

/// Airtable accepts at most this many records per bulk write.
pub const MAX_BATCH: usize = 10;

/// Airtable provider context.
pub struct Airtable {
    token: Credential,
    base_url: String,
}

type Op = Operation<Airtable>;

impl Airtable {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url)).bearer(&self.token)
    }

    /// `/{base}/{table}` plus optional `/{record}`.
    fn table(&self, method: Method, a: &Args, record: Option<&str>) -> Result<RequestDescriptor> {
        let mut path = format!(
            "/{}/{}",
            encode_segment(a.require_str("base_id")?),
            encode_segment(a.require_str("table_id_or_name")?)
        );
        if let Some(id) = record {
            path.push('/');
            path.push_str(&encode_segment(id));
        }
        Ok(self.call(method, &path))
    }

    fn schema(&self, a: &Args) -> Result<RequestDescriptor> {
        let base = encode_segment(a.require_str("base_id")?);
        Ok(self.call(Method::GET, &format!("/meta/bases/{base}/tables")))
    }
}

/// PATCH merges the given fields; PUT clears every field not supplied.
pub fn update_method(replace_all: bool) -> Method {
    if replace_all { Method::PUT } else { Method::PATCH }
}

fn list_query(a: &Args) -> Result<ParamSet> {
    let mut set = ParamSet::new()
        .forward_as(a, "fields", "fields[]")
        .forward_as(a, "filter_by_formula", "filterByFormula")
        .forward_as(a, "max_records", "maxRecords")
        .forward_as(a, "page_size", "pageSize")
        .forward(a, "view")
        .forward(a, "offset");
    if let Some(sort) = a.array("sort")? {
        for (i, entry) in sort.iter().enumerate() {
            let field = entry
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| a.invalid(format!("sort[{i}] needs a `field`")))?;
            let direction = entry
                .get("direction")
                .and_then(Value::as_str)
                .unwrap_or("asc");
            set = set
                .set(&format!("sort[{i}][field]"), field)
                .set(&format!("sort[{i}][direction]"), direction);
        }
    }
    Ok(set)
}

/// Wrap bare field maps in `{"fields": ...}`; records that already carry
/// `fields` pass through.
fn record_payload(record: &Value) -> Value {
    if record.get("fields").is_some() {
        record.clone()
    } else {
        json!({ "fields": record })
    }
}

/// Pick one table out of a base schema by id or name.
fn find_table(a: &Args, response: ResponseEnvelope) -> Result<Value> {
    let wanted = a.require_str("table_id_or_name")?;
    let schema = response.json()?;
    schema
        .get("tables")
        .and_then(Value::as_array)
        .and_then(|tables| {
            tables.iter().find(|t| {
                t.get("id").and_then(Value::as_str) == Some(wanted)
                    || t.get("name").and_then(Value::as_str) == Some(wanted)
            })
        })
        .cloned()
        .ok_or_else(|| a.invalid(format!("table `{wanted}` not found in base")))
}

fn base_table(op: Op) -> Op {
    op.param(Param::string("base_id").required().describe("Base id (app...)"))
        .param(Param::string("table_id_or_name").required())
}

fn list_params(op: Op) -> Op {
    op.param(Param::array("fields", ParamKind::String).describe("Only return these fields"))
        .param(Param::integer("max_records"))
        .param(Param::integer("page_size").describe("Records per page (max 100)"))
        .param(Param::string("view"))
        .param(Param::string("offset").describe("Pagination cursor"))
        .param(
            Param::array("sort", ParamKind::Object)
                .describe("List of {field, direction} where direction is asc or desc"),
        )
}

impl Provider for Airtable {
    const ID: &'static str = "airtable";
    const ADAPTER_TYPE: AdapterType = AdapterType::Productivity;
    const ENV_VARS: &'static [&'static str] = &["AIRTABLE_ACCESS_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "AIRTABLE_ACCESS_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Metadata --
            Op::new("airtable_list_bases", "List bases the token can access")
                .param(Param::string("offset"))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/meta/bases")
                        .query(ParamSet::new().forward(a, "offset")))
                }),
            Op::new("airtable_get_base_schema", "Tables, fields and views of a base")
                .param(Param::string("base_id").required())
                .request(|cx, a| cx.schema(a)),
            base_table(Op::new("airtable_get_table_fields", "Field definitions of one table"))
                .request(|cx, a| cx.schema(a))
                .shape(|a, r| {
                    let table = find_table(a, r)?;
                    Ok(json!({
                        "table_id": table.get("id"),
                        "table_name": table.get("name"),
                        "fields": table.get("fields").cloned().unwrap_or_else(|| json!([])),
                    }))
                }),
            base_table(Op::new("airtable_list_views", "Views of one table"))
                .request(|cx, a| cx.schema(a))
                .shape(|a, r| {
                    let table = find_table(a, r)?;
                    Ok(json!({
                        "table_id": table.get("id"),
                        "table_name": table.get("name"),
                        "views": table.get("views").cloned().unwrap_or_else(|| json!([])),
                    }))
                }),
            // -- Records --
            list_params(base_table(Op::new("airtable_list_records", "List records in a table")))
                .param(Param::string("filter_by_formula").describe("Airtable formula"))
                .request(|cx, a| Ok(cx.table(Method::GET, a, None)?.query(list_query(a)?))),
            list_params(base_table(Op::new(
                "airtable_search_records",
                "List records matching a formula",
            )))
            .param(
                Param::string("formula")
                    .required()
                    .describe("e.g. SEARCH('acme', {Company})"),
            )
            .request(|cx, a| {
                let query = list_query(a)?.set("filterByFormula", a.require_str("formula")?);
                Ok(cx.table(Method::GET, a, None)?.query(query))
            }),
            base_table(Op::new("airtable_get_record", "Retrieve one record"))
                .param(Param::string("record_id").required())
                .request(|cx, a| cx.table(Method::GET, a, Some(a.require_str("record_id")?))),
            base_table(Op::new("airtable_create_record", "Create one record"))
                .param(Param::object("fields").required())
                .param(Param::boolean("typecast").describe("Let Airtable coerce values"))
                .request(|cx, a| {
                    Ok(cx
                        .table(Method::POST, a, None)?
                        .json_params(ParamSet::new().forward_all(a, &["fields", "typecast"])))
                }),
            base_table(Op::new(
                "airtable_update_record",
                "Update one record; replace_all clears fields not supplied",
            ))
            .param(Param::string("record_id").required())
            .param(Param::object("fields").required())
            .param(Param::boolean("replace_all").default(false))
            .param(Param::boolean("typecast"))
            .request(|cx, a| {
                let method = update_method(a.bool_or("replace_all", false)?);
                Ok(cx
                    .table(method, a, Some(a.require_str("record_id")?))?
                    .json_params(ParamSet::new().forward_all(a, &["fields", "typecast"])))
            }),
            base_table(Op::new("airtable_delete_record", "Delete one record"))
                .param(Param::string("record_id").required())
                .request(|cx, a| cx.table(Method::DELETE, a, Some(a.require_str("record_id")?))),
            // -- Bulk --
            base_table(Op::new(
                "airtable_bulk_create_records",
                "Create up to 10 records; extra records are ignored",
            ))
            .param(
                Param::array("records", ParamKind::Object)
                    .required()
                    .describe("Field maps, or {fields: {...}} objects"),
            )
            .param(Param::boolean("typecast"))
            .request(|cx, a| {
                let records: Vec<Value> = cap_batch(a.require_array("records")?, MAX_BATCH)
                    .iter()
                    .map(record_payload)
                    .collect();
                Ok(cx.table(Method::POST, a, None)?.json_params(
                    ParamSet::new()
                        .set("records", records)
                        .forward(a, "typecast"),
                ))
            }),
            base_table(Op::new(
                "airtable_bulk_update_records",
                "Update up to 10 records; extra records are ignored",
            ))
            .param(
                Param::array("records", ParamKind::Object)
                    .required()
                    .describe("Objects of the form {id, fields}"),
            )
            .param(Param::boolean("replace_all").default(false))
            .param(Param::boolean("typecast"))
            .request(|cx, a| {
                let records = cap_batch(a.require_array("records")?, MAX_BATCH).to_vec();
                if let Some(i) = records.iter().position(|r| r.get("id").is_none()) {
                    return Err(a.invalid(format!("records[{i}] needs an `id`")));
                }
                let method = update_method(a.bool_or("replace_all", false)?);
                Ok(cx.table(method, a, None)?.json_params(
                    ParamSet::new()
                        .set("records", records)
                        .forward(a, "typecast"),
                ))
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;

    fn airtable() -> ServiceAdapter<Airtable> {
        adapter(&[("AIRTABLE_ACCESS_TOKEN", "pat123")])
    }

    fn target() -> Value {
        json!({"base_id": "appX", "table_id_or_name": "Tasks"})
    }

    fn with(extra: Value) -> Value {
        let mut v = target();
        for (k, val) in extra.as_object().unwrap() {
            v[k] = val.clone();
        }
        v
    }

    // -- Update verbs --

    #[test]
    fn update_defaults_to_patch() {
        let d = &airtable()
            .prepare(
                "airtable_update_record",
                with(json!({"record_id": "rec1", "fields": {"Name": "a"}})),
            )
            .unwrap()[0];
        assert_eq!(d.method, Method::PATCH);
        assert!(d.url.ends_with("/appX/Tasks/rec1"));
    }

    #[test]
    fn replace_all_uses_put() {
        let d = &airtable()
            .prepare(
                "airtable_update_record",
                with(json!({"record_id": "rec1", "fields": {}, "replace_all": true})),
            )
            .unwrap()[0];
        assert_eq!(d.method, Method::PUT);
        assert_eq!(update_method(false), Method::PATCH);
    }

    // -- Bulk --

    #[test]
    fn bulk_create_caps_at_ten_and_wraps_fields() {
        let records: Vec<Value> = (0..15).map(|i| json!({"Name": i})).collect();
        let d = &airtable()
            .prepare("airtable_bulk_create_records", with(json!({"records": records})))
            .unwrap()[0];
        let sent = d.json_body().unwrap()["records"].as_array().unwrap();
        assert_eq!(sent.len(), MAX_BATCH);
        assert_eq!(sent[0], json!({"fields": {"Name": 0}}));
        assert!(d.json_body().unwrap().get("typecast").is_none());
    }

    #[test]
    fn bulk_update_requires_ids() {
        let err = airtable()
            .prepare(
                "airtable_bulk_update_records",
                with(json!({"records": [{"fields": {}}]})),
            )
            .unwrap_err();
        assert!(err.to_string().contains("`id`"));
    }

    // -- Listing --

    #[test]
    fn list_query_encodes_fields_and_sort() {
        let d = &airtable()
            .prepare(
                "airtable_list_records",
                with(json!({
                    "fields": ["Name", "Status"],
                    "sort": [{"field": "Name"}],
                    "page_size": 50
                })),
            )
            .unwrap()[0];
        assert_eq!(
            d.query,
            vec![
                ("fields[]".to_string(), "Name".to_string()),
                ("fields[]".to_string(), "Status".to_string()),
                ("pageSize".to_string(), "50".to_string()),
                ("sort[0][field]".to_string(), "Name".to_string()),
                ("sort[0][direction]".to_string(), "asc".to_string()),
            ]
        );
    }

    #[test]
    fn search_sets_formula() {
        let d = &airtable()
            .prepare(
                "airtable_search_records",
                with(json!({"formula": "{Done}=1"})),
            )
            .unwrap()[0];
        assert_eq!(d.query_value("filterByFormula"), Some("{Done}=1"));
    }

    // -- Schema shapers --

    #[test]
    fn find_table_matches_by_name_or_id() {
        let body = json!({"tables": [
            {"id": "tbl1", "name": "Tasks", "fields": [{"name": "Name"}], "views": []},
        ]});
        let a = Args::from_value("t", target()).unwrap();
        let t = find_table(&a, ResponseEnvelope::from_json(&body)).unwrap();
        assert_eq!(t["id"], "tbl1");

        let a = Args::from_value("t", json!({"table_id_or_name": "Nope"})).unwrap();
        let err = find_table(&a, ResponseEnvelope::from_json(&body)).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }
}
