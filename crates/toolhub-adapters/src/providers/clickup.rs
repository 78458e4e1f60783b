//! ClickUp API v2.
//!
//! The token goes in a raw `Authorization` header, without a scheme.
//! ClickUp calls workspaces "teams" in its URLs.

use reqwest::Method;
use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::shape;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

/// ClickUp provider context.
pub struct ClickUp {
    token: Credential,
    base_url: String,
}

type Op = Operation<ClickUp>;

impl ClickUp {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url))
            .secret_header("Authorization", self.token.expose())
    }

    /// `/{collection}/{id}{suffix}`
    fn under(&self, method: Method, collection: &str, id: &str, suffix: &str) -> RequestDescriptor {
        self.call(method, &format!("/{collection}/{}{suffix}", encode_segment(id)))
    }
}

fn workspace_id() -> Param {
    Param::string("workspace_id").required().describe("Workspace (team) ID")
}

fn archived() -> Param {
    Param::boolean("archived").default(false)
}

impl Provider for ClickUp {
    const ID: &'static str = "clickup";
    const ADAPTER_TYPE: AdapterType = AdapterType::Productivity;
    const ENV_VARS: &'static [&'static str] = &["CLICKUP_API_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "CLICKUP_API_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Hierarchy --
            Op::new("clickup_list_workspaces", "Workspaces the token can access")
                .request(|cx, _| Ok(cx.call(Method::GET, "/team"))),
            Op::new("clickup_list_spaces", "Spaces in a workspace")
                .param(workspace_id())
                .param(archived())
                .request(|cx, a| {
                    Ok(cx
                        .under(Method::GET, "team", a.require_str("workspace_id")?, "/space")
                        .query(ParamSet::new().forward(a, "archived")))
                }),
            Op::new("clickup_get_space", "Space details")
                .param(Param::string("space_id").required())
                .request(|cx, a| Ok(cx.under(Method::GET, "space", a.require_str("space_id")?, ""))),
            Op::new("clickup_list_folders", "Folders in a space")
                .param(Param::string("space_id").required())
                .param(archived())
                .request(|cx, a| {
                    Ok(cx
                        .under(Method::GET, "space", a.require_str("space_id")?, "/folder")
                        .query(ParamSet::new().forward(a, "archived")))
                }),
            Op::new("clickup_list_lists", "Lists in a folder, or folderless lists in a space")
                .param(Param::string("folder_id"))
                .param(Param::string("space_id"))
                .param(archived())
                .request(|cx, a| {
                    let desc = if let Some(folder) = a.str("folder_id")? {
                        cx.under(Method::GET, "folder", folder, "/list")
                    } else if let Some(space) = a.str("space_id")? {
                        cx.under(Method::GET, "space", space, "/list")
                    } else {
                        return Err(a.invalid("either folder_id or space_id must be provided"));
                    };
                    Ok(desc.query(ParamSet::new().forward(a, "archived")))
                }),
            // -- Tasks --
            Op::new("clickup_list_tasks", "Tasks in a list, with filters")
                .param(Param::string("list_id").required())
                .param(archived())
                .param(Param::integer("page").default(0))
                .param(Param::string("order_by").default("created"))
                .param(Param::boolean("reverse").default(true))
                .param(Param::boolean("subtasks").default(true))
                .param(Param::boolean("include_closed").default(false))
                .param(Param::array("statuses", ParamKind::String))
                .param(Param::array("assignees", ParamKind::Any))
                .param(Param::array("tags", ParamKind::String))
                .param(Param::integer("due_date_gt").describe("Unix ms"))
                .param(Param::integer("due_date_lt").describe("Unix ms"))
                .request(|cx, a| {
                    let q = ParamSet::new()
                        .forward_all(
                            a,
                            &["archived", "page", "order_by", "reverse", "subtasks", "include_closed"],
                        )
                        .forward_as(a, "statuses", "statuses[]")
                        .forward_as(a, "assignees", "assignees[]")
                        .forward_as(a, "tags", "tags[]")
                        .forward_all(a, &["due_date_gt", "due_date_lt"]);
                    Ok(cx
                        .under(Method::GET, "list", a.require_str("list_id")?, "/task")
                        .query(q))
                }),
            Op::new("clickup_get_task", "Task details")
                .param(Param::string("task_id").required())
                .request(|cx, a| Ok(cx.under(Method::GET, "task", a.require_str("task_id")?, ""))),
            Op::new("clickup_create_task", "Create a task in a list")
                .param(Param::string("list_id").required())
                .param(Param::string("name").required())
                .param(Param::string("description"))
                .param(Param::array("assignees", ParamKind::Integer))
                .param(Param::array("tags", ParamKind::String))
                .param(Param::string("status"))
                .param(Param::integer("priority").describe("1 urgent, 2 high, 3 normal, 4 low"))
                .param(Param::integer("due_date").describe("Unix ms"))
                .param(Param::boolean("due_date_time").default(false))
                .param(Param::integer("time_estimate").describe("Milliseconds"))
                .param(Param::integer("start_date").describe("Unix ms"))
                .param(Param::boolean("start_date_time").default(false))
                .param(Param::boolean("notify_all").default(true))
                .param(Param::string("parent").describe("Parent task ID for subtasks"))
                .param(Param::array("custom_fields", ParamKind::Object))
                .request(|cx, a| {
                    let mut body = ParamSet::new().forward_all(
                        a,
                        &[
                            "name",
                            "notify_all",
                            "description",
                            "assignees",
                            "tags",
                            "status",
                            "priority",
                            "due_date",
                            "time_estimate",
                            "start_date",
                            "parent",
                            "custom_fields",
                        ],
                    );
                    // The *_time flags only mean something next to their date.
                    if a.has("due_date") {
                        body = body.forward(a, "due_date_time");
                    }
                    if a.has("start_date") {
                        body = body.forward(a, "start_date_time");
                    }
                    Ok(cx
                        .under(Method::POST, "list", a.require_str("list_id")?, "/task")
                        .json_params(body))
                }),
            Op::new("clickup_update_task", "Update task fields")
                .param(Param::string("task_id").required())
                .param(Param::string("name"))
                .param(Param::string("description"))
                .param(Param::string("status"))
                .param(Param::integer("priority"))
                .param(Param::integer("due_date"))
                .param(Param::integer("time_estimate"))
                .param(Param::object("assignees").describe("{\"add\": [ids], \"rem\": [ids]}"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &[
                            "name",
                            "description",
                            "status",
                            "priority",
                            "due_date",
                            "time_estimate",
                            "assignees",
                        ],
                    );
                    Ok(cx
                        .under(Method::PUT, "task", a.require_str("task_id")?, "")
                        .json_params(body))
                }),
            Op::new("clickup_delete_task", "Delete a task")
                .param(Param::string("task_id").required())
                .request(|cx, a| Ok(cx.under(Method::DELETE, "task", a.require_str("task_id")?, "")))
                .shape(|a, _| Ok(shape::ack("task_id", a.require_str("task_id")?))),
            // -- Comments --
            Op::new("clickup_add_task_comment", "Comment on a task")
                .param(Param::string("task_id").required())
                .param(Param::string("comment_text").required())
                .param(Param::integer("assignee"))
                .param(Param::boolean("notify_all").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["comment_text", "notify_all", "assignee"]);
                    Ok(cx
                        .under(Method::POST, "task", a.require_str("task_id")?, "/comment")
                        .json_params(body))
                }),
            Op::new("clickup_list_task_comments", "Comments on a task")
                .param(Param::string("task_id").required())
                .request(|cx, a| {
                    Ok(cx.under(Method::GET, "task", a.require_str("task_id")?, "/comment"))
                }),
            // -- Time tracking --
            Op::new("clickup_create_time_entry", "Record a time entry on a task")
                .param(Param::string("task_id").required())
                .param(Param::integer("duration").required().describe("Milliseconds"))
                .param(Param::integer("start").describe("Unix ms"))
                .param(Param::string("description"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["duration", "start", "description"]);
                    Ok(cx
                        .under(Method::POST, "task", a.require_str("task_id")?, "/time")
                        .json_params(body))
                }),
            Op::new("clickup_list_time_entries", "Time entries in a workspace")
                .param(workspace_id())
                .param(Param::integer("start_date"))
                .param(Param::integer("end_date"))
                .param(Param::integer("assignee"))
                .request(|cx, a| {
                    Ok(cx
                        .under(Method::GET, "team", a.require_str("workspace_id")?, "/time_entries")
                        .query(ParamSet::new().forward_all(a, &["start_date", "end_date", "assignee"])))
                }),
            // -- Goals and fields --
            Op::new("clickup_list_goals", "Goals in a workspace")
                .param(workspace_id())
                .request(|cx, a| {
                    Ok(cx.under(Method::GET, "team", a.require_str("workspace_id")?, "/goal"))
                }),
            Op::new("clickup_get_goal", "Goal details")
                .param(Param::string("goal_id").required())
                .request(|cx, a| Ok(cx.under(Method::GET, "goal", a.require_str("goal_id")?, ""))),
            Op::new("clickup_list_custom_fields", "Custom fields available on a list")
                .param(Param::string("list_id").required())
                .request(|cx, a| Ok(cx.under(Method::GET, "list", a.require_str("list_id")?, "/field"))),
            Op::new("clickup_search_tasks", "Search tasks across a workspace")
                .param(workspace_id())
                .param(Param::string("query").required())
                .param(Param::integer("start_date"))
                .param(Param::integer("end_date"))
                .param(Param::array("assignees", ParamKind::Any))
                .param(Param::array("statuses", ParamKind::String))
                .param(Param::array("tags", ParamKind::String))
                .request(|cx, a| {
                    let q = ParamSet::new()
                        .forward_all(a, &["query", "start_date", "end_date"])
                        .forward_as(a, "assignees", "assignees[]")
                        .forward_as(a, "statuses", "statuses[]")
                        .forward_as(a, "tags", "tags[]");
                    Ok(cx
                        .under(Method::GET, "team", a.require_str("workspace_id")?, "/task")
                        .query(q))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;

    fn clickup() -> ServiceAdapter<ClickUp> {
        adapter(&[("CLICKUP_API_TOKEN", "pk_1")])
    }

    #[test]
    fn raw_authorization_header() {
        let d = &clickup().prepare("clickup_list_workspaces", json!({})).unwrap()[0];
        assert_eq!(d.url, "https://api.clickup.com/api/v2/team");
        assert_eq!(d.header_value("authorization"), Some("pk_1"));
    }

    #[test]
    fn list_lists_needs_a_parent() {
        let err = clickup().prepare("clickup_list_lists", json!({})).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        let d = &clickup()
            .prepare("clickup_list_lists", json!({"space_id": "s1"}))
            .unwrap()[0];
        assert!(d.url.ends_with("/space/s1/list"));
        assert_eq!(d.query_value("archived"), Some("false"));
    }

    #[test]
    fn list_tasks_repeats_array_filters() {
        let d = &clickup()
            .prepare(
                "clickup_list_tasks",
                json!({"list_id": "L", "statuses": ["open", "review"]}),
            )
            .unwrap()[0];
        let statuses: Vec<_> = d.query.iter().filter(|(k, _)| k == "statuses[]").collect();
        assert_eq!(statuses.len(), 2);
        assert_eq!(d.query_value("reverse"), Some("true"));
        assert!(d.query_value("tags[]").is_none());
    }

    #[test]
    fn create_task_sends_zero_priority_and_date_flags() {
        let d = &clickup()
            .prepare(
                "clickup_create_task",
                json!({"list_id": "L", "name": "n", "priority": 0, "due_date": 1700000000000i64}),
            )
            .unwrap()[0];
        let body = d.json_body().unwrap();
        assert_eq!(body["priority"], 0);
        assert_eq!(body["due_date_time"], false);
        assert!(body.get("start_date_time").is_none());
        assert_eq!(body["notify_all"], true);
    }
}
