//! Todoist REST API v2.
//!
//! Updates are POSTs to the item URL, not PATCH.

use reqwest::Method;
use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::shape;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.todoist.com/rest/v2";

/// Todoist provider context.
pub struct Todoist {
    token: Credential,
    base_url: String,
}

type Op = Operation<Todoist>;

impl Todoist {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url)).bearer(&self.token)
    }

    fn item(&self, method: Method, collection: &str, a: &Args, key: &str, suffix: &str) -> Result<RequestDescriptor> {
        let id = encode_segment(&a.require_id(key)?);
        Ok(self.call(method, &format!("/{collection}/{id}{suffix}")))
    }
}

/// Comments hang off a task or a project; the task wins when both are given.
fn comment_parent(a: &Args) -> Result<ParamSet> {
    if a.has("task_id") {
        Ok(ParamSet::new().forward(a, "task_id"))
    } else if a.has("project_id") {
        Ok(ParamSet::new().forward(a, "project_id"))
    } else {
        Err(a.invalid("provide either `task_id` or `project_id`"))
    }
}

fn due(op: Op) -> Op {
    op.param(Param::string("due_string").describe("Natural language, e.g. \"tomorrow at 5pm\""))
        .param(Param::string("due_date").describe("YYYY-MM-DD"))
        .param(Param::string("due_datetime").describe("RFC 3339 UTC"))
        .param(Param::string("due_lang").default("en"))
        .param(Param::string("assignee_id"))
        .param(Param::array("labels", ParamKind::String))
        .param(Param::string("description"))
}

const DUE_FIELDS: &[&str] = &[
    "description",
    "labels",
    "due_string",
    "due_date",
    "due_datetime",
    "due_lang",
    "assignee_id",
];

fn task_id() -> Param {
    Param::string("task_id").required()
}

fn project_id() -> Param {
    Param::string("project_id").required()
}

fn view_style() -> Param {
    Param::string("view_style").one_of(&["list", "board"])
}

impl Provider for Todoist {
    const ID: &'static str = "todoist";
    const ADAPTER_TYPE: AdapterType = AdapterType::Productivity;
    const ENV_VARS: &'static [&'static str] = &["TODOIST_API_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "TODOIST_API_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Tasks --
            Op::new("todoist_list_tasks", "Active tasks, optionally filtered")
                .param(Param::string("project_id"))
                .param(Param::string("label"))
                .param(Param::string("filter").describe("Todoist filter query, e.g. \"today | overdue\""))
                .param(Param::string("lang").default("en"))
                .request(|cx, a| {
                    let query = ParamSet::new().forward_all(a, &["lang", "project_id", "label", "filter"]);
                    Ok(cx.call(Method::GET, "/tasks").query(query))
                }),
            Op::new("todoist_get_task", "One active task")
                .param(task_id())
                .request(|cx, a| cx.item(Method::GET, "tasks", a, "task_id", "")),
            due(Op::new("todoist_create_task", "Create a task"))
                .param(Param::string("content").required())
                .param(Param::integer("priority").default(1).describe("1 (normal) to 4 (urgent)"))
                .param(Param::string("project_id"))
                .param(Param::string("section_id"))
                .param(Param::string("parent_id"))
                .param(Param::integer("order"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_all(
                            a,
                            &["content", "priority", "project_id", "section_id", "parent_id", "order"],
                        )
                        .forward_all(a, DUE_FIELDS);
                    Ok(cx.call(Method::POST, "/tasks").json_params(body))
                }),
            due(Op::new("todoist_update_task", "Change a task's fields"))
                .param(task_id())
                .param(Param::string("content"))
                .param(Param::integer("priority"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_all(a, &["content", "priority"])
                        .forward_all(a, DUE_FIELDS);
                    Ok(cx.item(Method::POST, "tasks", a, "task_id", "")?.json_params(body))
                }),
            Op::new("todoist_complete_task", "Complete a task")
                .param(task_id())
                .request(|cx, a| cx.item(Method::POST, "tasks", a, "task_id", "/close"))
                .shape(|a, _| Ok(shape::ack("task_id", &a.require_id("task_id")?))),
            Op::new("todoist_reopen_task", "Reopen a completed task")
                .param(task_id())
                .request(|cx, a| cx.item(Method::POST, "tasks", a, "task_id", "/reopen"))
                .shape(|a, _| Ok(shape::ack("task_id", &a.require_id("task_id")?))),
            Op::new("todoist_delete_task", "Delete a task")
                .param(task_id())
                .request(|cx, a| cx.item(Method::DELETE, "tasks", a, "task_id", ""))
                .shape(|a, _| Ok(shape::ack("task_id", &a.require_id("task_id")?))),
            // -- Projects --
            Op::new("todoist_list_projects", "All projects")
                .request(|cx, _| Ok(cx.call(Method::GET, "/projects"))),
            Op::new("todoist_get_project", "One project")
                .param(project_id())
                .request(|cx, a| cx.item(Method::GET, "projects", a, "project_id", "")),
            Op::new("todoist_create_project", "Create a project")
                .param(Param::string("name").required())
                .param(Param::string("parent_id"))
                .param(Param::string("color"))
                .param(Param::boolean("is_favorite").default(false))
                .param(view_style().default("list"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &["name", "is_favorite", "view_style", "parent_id", "color"],
                    );
                    Ok(cx.call(Method::POST, "/projects").json_params(body))
                }),
            Op::new("todoist_update_project", "Rename or restyle a project")
                .param(project_id())
                .param(Param::string("name"))
                .param(Param::string("color"))
                .param(Param::boolean("is_favorite"))
                .param(view_style())
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["name", "color", "is_favorite", "view_style"]);
                    Ok(cx.item(Method::POST, "projects", a, "project_id", "")?.json_params(body))
                }),
            Op::new("todoist_delete_project", "Delete a project and its tasks")
                .param(project_id())
                .request(|cx, a| cx.item(Method::DELETE, "projects", a, "project_id", ""))
                .shape(|a, _| Ok(shape::ack("project_id", &a.require_id("project_id")?))),
            // -- Sections and labels --
            Op::new("todoist_list_sections", "Sections, optionally of one project")
                .param(Param::string("project_id"))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/sections")
                        .query(ParamSet::new().forward(a, "project_id")))
                }),
            Op::new("todoist_create_section", "Create a section in a project")
                .param(Param::string("name").required())
                .param(project_id())
                .param(Param::integer("order"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["name", "project_id", "order"]);
                    Ok(cx.call(Method::POST, "/sections").json_params(body))
                }),
            Op::new("todoist_list_labels", "Personal labels")
                .request(|cx, _| Ok(cx.call(Method::GET, "/labels"))),
            Op::new("todoist_create_label", "Create a personal label")
                .param(Param::string("name").required())
                .param(Param::string("color"))
                .param(Param::integer("order"))
                .param(Param::boolean("is_favorite").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["name", "is_favorite", "color", "order"]);
                    Ok(cx.call(Method::POST, "/labels").json_params(body))
                }),
            // -- Comments --
            Op::new("todoist_list_comments", "Comments on a task or project")
                .param(Param::string("task_id"))
                .param(Param::string("project_id"))
                .request(|cx, a| Ok(cx.call(Method::GET, "/comments").query(comment_parent(a)?))),
            Op::new("todoist_create_comment", "Comment on a task or project")
                .param(Param::string("content").required())
                .param(Param::string("task_id"))
                .param(Param::string("project_id"))
                .param(Param::object("attachment"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "content")
                        .extend(comment_parent(a)?)
                        .forward(a, "attachment");
                    Ok(cx.call(Method::POST, "/comments").json_params(body))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::providers::test_support::adapter;

    fn todoist() -> crate::operation::ServiceAdapter<Todoist> {
        adapter::<Todoist>(&[("TODOIST_API_TOKEN", "td")])
    }

    #[test]
    fn comments_need_a_parent() {
        let err = todoist()
            .prepare("todoist_create_comment", json!({"content": "hi"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let d = &todoist()
            .prepare(
                "todoist_list_comments",
                json!({"task_id": "1", "project_id": "2"}),
            )
            .unwrap()[0];
        assert_eq!(d.query_value("task_id"), Some("1"));
        assert!(d.query_value("project_id").is_none());
    }

    #[test]
    fn update_is_post_to_item() {
        let d = &todoist()
            .prepare("todoist_update_task", json!({"task_id": "7", "priority": 4}))
            .unwrap()[0];
        assert_eq!(d.method, Method::POST);
        assert!(d.url.ends_with("/tasks/7"));
        assert_eq!(d.json_body().unwrap(), &json!({"priority": 4, "due_lang": "en"}));
    }

    #[test]
    fn create_task_sends_defaults() {
        let d = &todoist()
            .prepare("todoist_create_task", json!({"content": "Buy milk", "order": 0}))
            .unwrap()[0];
        let body = d.json_body().unwrap();
        assert_eq!(body["priority"], 1);
        assert_eq!(body["order"], 0);
        assert!(body.get("labels").is_none());
    }
}
