//! Asana workspaces, projects and tasks.
//!
//! Write bodies are wrapped in `{"data": {...}}`.  Most reads accept
//! `opt_fields` to select response fields.

use reqwest::Method;
use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Asana provider context.
pub struct Asana {
    token: Credential,
    base_url: String,
}

type Op = Operation<Asana>;

impl Asana {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url)).bearer(&self.token)
    }

    /// `/{collection}/{gid}{suffix}` with the gid taken from `key`.
    fn item(&self, method: Method, a: &Args, collection: &str, key: &str, suffix: &str) -> Result<RequestDescriptor> {
        let gid = encode_segment(a.require_str(key)?);
        Ok(self.call(method, &format!("/{collection}/{gid}{suffix}")))
    }

    fn write(&self, method: Method, path: &str, data: ParamSet) -> RequestDescriptor {
        self.call(method, path).json(json!({ "data": data.to_json() }))
    }
}

fn opt_fields() -> Param {
    Param::string("opt_fields").describe("Comma-separated field names to include")
}

fn limit() -> Param {
    Param::integer("limit")
        .describe("Results per page (max 100)")
        .default(20)
}

fn read_query(a: &Args, keys: &[&str]) -> ParamSet {
    ParamSet::new().forward_all(a, keys).forward(a, "opt_fields")
}

impl Provider for Asana {
    const ID: &'static str = "asana";
    const ADAPTER_TYPE: AdapterType = AdapterType::Productivity;
    const ENV_VARS: &'static [&'static str] = &["ASANA_PERSONAL_ACCESS_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "ASANA_PERSONAL_ACCESS_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("asana_list_workspaces", "Workspaces visible to the token")
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/workspaces").query(read_query(a, &["limit"])))
                }),
            // -- Projects --
            Op::new("asana_list_projects", "Projects in a workspace")
                .param(Param::string("workspace").required())
                .param(Param::boolean("archived").default(false))
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/projects")
                        .query(read_query(a, &["workspace", "archived", "limit"])))
                }),
            Op::new("asana_get_project", "One project")
                .param(Param::string("project_gid").required())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .item(Method::GET, a, "projects", "project_gid", "")?
                        .query(read_query(a, &[])))
                }),
            Op::new("asana_create_project", "Create a project in a workspace")
                .param(Param::string("workspace").required())
                .param(Param::string("name").required())
                .param(Param::string("notes"))
                .param(Param::string("color"))
                .param(Param::string("due_date").describe("YYYY-MM-DD"))
                .param(Param::string("start_date").describe("YYYY-MM-DD"))
                .param(Param::boolean("public").default(true))
                .request(|cx, a| {
                    Ok(cx.write(
                        Method::POST,
                        "/projects",
                        ParamSet::new().forward_all(
                            a,
                            &["workspace", "name", "public", "notes", "color", "due_date", "start_date"],
                        ),
                    ))
                }),
            // -- Tasks --
            Op::new("asana_list_tasks", "Tasks filtered by project, section, or assignee+workspace")
                .param(Param::string("project"))
                .param(Param::string("section"))
                .param(Param::string("assignee").describe("User GID or \"me\"; needs workspace"))
                .param(Param::string("workspace"))
                .param(Param::string("completed_since").describe("ISO 8601 or \"now\""))
                .param(Param::string("modified_since"))
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    if !a.has("project") && !a.has("section") && !(a.has("assignee") && a.has("workspace")) {
                        return Err(a.invalid("provide `project`, `section`, or `assignee` with `workspace`"));
                    }
                    Ok(cx.call(Method::GET, "/tasks").query(read_query(
                        a,
                        &["limit", "project", "section", "assignee", "workspace", "completed_since", "modified_since"],
                    )))
                }),
            Op::new("asana_get_task", "One task")
                .param(Param::string("task_gid").required())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .item(Method::GET, a, "tasks", "task_gid", "")?
                        .query(read_query(a, &[])))
                }),
            Op::new("asana_create_task", "Create a task")
                .param(Param::string("name").required())
                .param(Param::string("workspace"))
                .param(Param::array("projects", ParamKind::String))
                .param(Param::string("notes"))
                .param(Param::string("assignee"))
                .param(Param::string("due_on").describe("YYYY-MM-DD"))
                .param(Param::string("start_on").describe("YYYY-MM-DD"))
                .param(Param::array("tags", ParamKind::String))
                .request(|cx, a| {
                    if !a.has("workspace") && !a.has("projects") {
                        return Err(a.invalid("provide `workspace` or `projects`"));
                    }
                    Ok(cx.write(
                        Method::POST,
                        "/tasks",
                        ParamSet::new().forward_all(
                            a,
                            &["name", "workspace", "projects", "notes", "assignee", "due_on", "start_on", "tags"],
                        ),
                    ))
                }),
            Op::new("asana_update_task", "Update fields of a task")
                .param(Param::string("task_gid").required())
                .param(Param::string("name"))
                .param(Param::string("notes"))
                .param(Param::string("assignee"))
                .param(Param::string("due_on"))
                .param(Param::string("start_on"))
                .param(Param::boolean("completed"))
                .request(|cx, a| {
                    let gid = encode_segment(a.require_str("task_gid")?);
                    Ok(cx.write(
                        Method::PUT,
                        &format!("/tasks/{gid}"),
                        ParamSet::new().forward_all(
                            a,
                            &["name", "notes", "assignee", "due_on", "start_on", "completed"],
                        ),
                    ))
                }),
            Op::new("asana_complete_task", "Mark a task complete")
                .param(Param::string("task_gid").required())
                .request(|cx, a| {
                    let gid = encode_segment(a.require_str("task_gid")?);
                    Ok(cx.write(
                        Method::PUT,
                        &format!("/tasks/{gid}"),
                        ParamSet::new().set("completed", true),
                    ))
                }),
            Op::new("asana_delete_task", "Delete a task")
                .param(Param::string("task_gid").required())
                .request(|cx, a| cx.item(Method::DELETE, a, "tasks", "task_gid", "")),
            Op::new("asana_add_task_comment", "Comment on a task")
                .param(Param::string("task_gid").required())
                .param(Param::string("text").required())
                .request(|cx, a| {
                    let gid = encode_segment(a.require_str("task_gid")?);
                    Ok(cx.write(
                        Method::POST,
                        &format!("/tasks/{gid}/stories"),
                        ParamSet::new().forward(a, "text"),
                    ))
                }),
            // -- Sections and tags --
            Op::new("asana_list_sections", "Sections of a project")
                .param(Param::string("project_gid").required())
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .item(Method::GET, a, "projects", "project_gid", "/sections")?
                        .query(read_query(a, &["limit"])))
                }),
            Op::new("asana_create_section", "Add a section to a project")
                .param(Param::string("project_gid").required())
                .param(Param::string("name").required())
                .request(|cx, a| {
                    let gid = encode_segment(a.require_str("project_gid")?);
                    Ok(cx.write(
                        Method::POST,
                        &format!("/projects/{gid}/sections"),
                        ParamSet::new().forward(a, "name"),
                    ))
                }),
            Op::new("asana_list_tags", "Tags in a workspace")
                .param(Param::string("workspace").required())
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/tags").query(read_query(a, &["workspace", "limit"])))
                }),
            Op::new("asana_create_tag", "Create a tag")
                .param(Param::string("workspace").required())
                .param(Param::string("name").required())
                .param(Param::string("color"))
                .request(|cx, a| {
                    Ok(cx.write(
                        Method::POST,
                        "/tags",
                        ParamSet::new().forward_all(a, &["workspace", "name", "color"]),
                    ))
                }),
            // -- Search, portfolios, users --
            Op::new("asana_search_workspace", "Typeahead search for tasks, projects, users and more")
                .param(Param::string("workspace").required())
                .param(
                    Param::string("resource_type")
                        .required()
                        .one_of(&["task", "project", "user", "portfolio", "tag"]),
                )
                .param(Param::string("query").required())
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/typeahead").query(read_query(
                        a,
                        &["workspace", "resource_type", "query", "limit"],
                    )))
                }),
            Op::new("asana_list_portfolios", "Portfolios in a workspace")
                .param(Param::string("workspace").required())
                .param(Param::string("owner").describe("User GID or \"me\""))
                .param(limit())
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/portfolios")
                        .query(read_query(a, &["workspace", "limit", "owner"])))
                }),
            Op::new("asana_get_user", "User details")
                .param(Param::string("user_gid").default("me"))
                .param(opt_fields())
                .request(|cx, a| {
                    Ok(cx
                        .item(Method::GET, a, "users", "user_gid", "")?
                        .query(read_query(a, &[])))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;

    fn asana() -> ServiceAdapter<Asana> {
        adapter(&[("ASANA_PERSONAL_ACCESS_TOKEN", "0/abc")])
    }

    #[test]
    fn writes_are_wrapped_in_data() {
        let d = &asana()
            .prepare("asana_create_task", json!({"name": "Ship", "workspace": "W1"}))
            .unwrap()[0];
        assert_eq!(
            d.json_body().unwrap(),
            &json!({"data": {"name": "Ship", "workspace": "W1"}})
        );
    }

    #[test]
    fn update_sends_explicit_false() {
        let d = &asana()
            .prepare("asana_update_task", json!({"task_gid": "1", "completed": false}))
            .unwrap()[0];
        assert_eq!(d.method, Method::PUT);
        assert_eq!(d.json_body().unwrap()["data"], json!({"completed": false}));
    }

    #[test]
    fn list_projects_sends_archived_literal() {
        let d = &asana()
            .prepare("asana_list_projects", json!({"workspace": "W1"}))
            .unwrap()[0];
        assert_eq!(d.query_value("archived"), Some("false"));
        assert_eq!(d.query_value("limit"), Some("20"));
        assert!(d.query_value("opt_fields").is_none());
    }

    #[test]
    fn list_tasks_needs_a_scope() {
        let err = asana().prepare("asana_list_tasks", json!({"assignee": "me"})).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn get_user_defaults_to_me() {
        let d = &asana().prepare("asana_get_user", json!({})).unwrap()[0];
        assert!(d.url.ends_with("/users/me"));
    }
}
