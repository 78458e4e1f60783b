//! Linear GraphQL API.
//!
//! Queries are assembled with the helpers in [`crate::graphql`]; every
//! caller-supplied value is rendered as an escaped literal.  Responses are
//! unwrapped to their `data` member.

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::graphql::{self, Filter};
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::RequestDescriptor;
use crate::shape;
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.linear.app/graphql";

// -- Selection sets --

const ISSUE_SUMMARY: &str = "id title description priority state { name type } \
    assignee { id name } labels { nodes { id name } } createdAt updatedAt";
const ISSUE_DETAIL: &str = "id title description priority estimate state { name type } \
    assignee { id name email } labels { nodes { id name color } } project { id name } \
    team { id name } createdAt updatedAt url";
const PROJECT_SUMMARY: &str =
    "id name description state progress targetDate lead { id name } createdAt";
const PROJECT_DETAIL: &str = "id name description state progress targetDate startDate \
    lead { id name } teams { nodes { id name } } url";
const TEAM_SUMMARY: &str = "id name key description private createdAt";
const TEAM_DETAIL: &str = "id name key description private members { nodes { id name email } } \
    projects { nodes { id name } }";
const CYCLE_SUMMARY: &str = "id number name startsAt endsAt progress completedIssueCount \
    issueCount team { id name }";
const CYCLE_DETAIL: &str = "id number name description startsAt endsAt progress \
    completedIssueCount issueCount team { id name } url";
const LABEL_SUMMARY: &str = "id name description color team { id name }";
const ROADMAP_ITEM: &str =
    "id name description state progress targetDate startDate lead { name }";
const MILESTONE: &str = "id name description targetDate project { id name }";

/// Linear provider context.
pub struct Linear {
    key: Credential,
    base_url: String,
}

type Op = Operation<Linear>;

impl Linear {
    fn graphql(&self, query: &str) -> RequestDescriptor {
        RequestDescriptor::post(&self.base_url)
            .secret_header("Authorization", self.key.expose())
            .json(graphql::body(query))
    }
}

fn first(a: &Args, default: i64) -> Result<Option<String>> {
    Ok(Some(format!("first: {}", a.i64_or("first", default)?)))
}

/// `field(args) { nodes { selection } }`
fn connection(field: &str, args: &str, selection: &str) -> String {
    format!("query {{ {field}{args} {{ nodes {{ {selection} }} }} }}")
}

/// `field(id: "...") { selection }`
fn by_id(field: &str, id: &str, selection: &str) -> String {
    format!("query {{ {field}(id: {}) {{ {selection} }} }}", graphql::string(id))
}

/// `mutation { name(args) { success payload } }`
fn mutation(name: &str, args: &str, payload: &str) -> String {
    format!("mutation {{ {name}({args}) {{ success {payload} }} }}")
}

fn team_filter(a: &Args) -> Result<Option<String>> {
    Ok(Filter::new().eq("team", "id", a.str("team_id")?).render())
}

impl Provider for Linear {
    const ID: &'static str = "linear";
    const ADAPTER_TYPE: AdapterType = AdapterType::Productivity;
    const ENV_VARS: &'static [&'static str] = &["LINEAR_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "LINEAR_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        let ops = vec![
            // -- Issues --
            Op::new("linear_list_issues", "Issues, filtered by team, project, assignee, label or state")
                .param(Param::string("team_id"))
                .param(Param::string("project_id"))
                .param(Param::string("assignee_id"))
                .param(Param::string("label_id"))
                .param(Param::string("state").describe("State name, e.g. In Progress"))
                .param(Param::integer("first").default(50))
                .request(|cx, a| {
                    let filter = Filter::new()
                        .eq("team", "id", a.str("team_id")?)
                        .eq("project", "id", a.str("project_id")?)
                        .eq("assignee", "id", a.str("assignee_id")?)
                        .eq("labels", "id", a.str("label_id")?)
                        .eq("state", "name", a.str("state")?);
                    let args = graphql::arguments([first(a, 50)?, filter.render()]);
                    Ok(cx.graphql(&connection("issues", &args, ISSUE_SUMMARY)))
                }),
            Op::new("linear_get_issue", "Issue details")
                .param(Param::string("issue_id").required())
                .request(|cx, a| Ok(cx.graphql(&by_id("issue", a.require_str("issue_id")?, ISSUE_DETAIL)))),
            Op::new("linear_create_issue", "Create an issue")
                .param(Param::string("team_id").required())
                .param(Param::string("title").required())
                .param(Param::string("description").describe("Markdown"))
                .param(Param::integer("priority").default(0).describe("0 none, 1 urgent, 2 high, 3 medium, 4 low"))
                .param(Param::string("assignee_id"))
                .param(Param::string("project_id"))
                .param(Param::array("label_ids", ParamKind::String))
                .request(|cx, a| {
                    let input = ParamSet::new()
                        .forward_as(a, "team_id", "teamId")
                        .forward(a, "title")
                        .forward(a, "priority")
                        .forward(a, "description")
                        .forward_as(a, "assignee_id", "assigneeId")
                        .forward_as(a, "project_id", "projectId")
                        .forward_as(a, "label_ids", "labelIds");
                    let args = format!("input: {}", graphql::input_object(&input));
                    Ok(cx.graphql(&mutation("issueCreate", &args, "issue { id title url }")))
                }),
            Op::new("linear_update_issue", "Update an issue")
                .param(Param::string("issue_id").required())
                .param(Param::string("title"))
                .param(Param::string("description"))
                .param(Param::integer("priority"))
                .param(Param::string("state_id"))
                .param(Param::string("assignee_id"))
                .request(|cx, a| {
                    let input = ParamSet::new()
                        .forward(a, "title")
                        .forward(a, "description")
                        .forward(a, "priority")
                        .forward_as(a, "state_id", "stateId")
                        .forward_as(a, "assignee_id", "assigneeId");
                    let args = format!(
                        "id: {}, input: {}",
                        graphql::string(a.require_str("issue_id")?),
                        graphql::input_object(&input)
                    );
                    Ok(cx.graphql(&mutation("issueUpdate", &args, "issue { id title state { name } }")))
                }),
            Op::new("linear_delete_issue", "Delete an issue")
                .param(Param::string("issue_id").required())
                .request(|cx, a| {
                    let args = format!("id: {}", graphql::string(a.require_str("issue_id")?));
                    Ok(cx.graphql(&mutation("issueDelete", &args, "")))
                }),
            Op::new("linear_add_comment", "Comment on an issue")
                .param(Param::string("issue_id").required())
                .param(Param::string("body").required().describe("Markdown"))
                .request(|cx, a| {
                    let input = ParamSet::new()
                        .forward_as(a, "issue_id", "issueId")
                        .forward(a, "body");
                    let args = format!("input: {}", graphql::input_object(&input));
                    Ok(cx.graphql(&mutation("commentCreate", &args, "comment { id body createdAt }")))
                }),
            // -- Projects --
            Op::new("linear_list_projects", "Projects, optionally for one team")
                .param(Param::string("team_id"))
                .param(Param::integer("first").default(50))
                .request(|cx, a| {
                    let args = graphql::arguments([first(a, 50)?, team_filter(a)?]);
                    Ok(cx.graphql(&connection("projects", &args, PROJECT_SUMMARY)))
                }),
            Op::new("linear_get_project", "Project details")
                .param(Param::string("project_id").required())
                .request(|cx, a| {
                    Ok(cx.graphql(&by_id("project", a.require_str("project_id")?, PROJECT_DETAIL)))
                }),
            Op::new("linear_create_project", "Create a project")
                .param(Param::string("name").required())
                .param(Param::array("team_ids", ParamKind::String).required())
                .param(Param::string("description"))
                .param(Param::string("target_date").describe("YYYY-MM-DD"))
                .param(Param::string("lead_id"))
                .request(|cx, a| {
                    let input = ParamSet::new()
                        .forward(a, "name")
                        .forward_as(a, "team_ids", "teamIds")
                        .forward(a, "description")
                        .forward_as(a, "target_date", "targetDate")
                        .forward_as(a, "lead_id", "leadId");
                    let args = format!("input: {}", graphql::input_object(&input));
                    Ok(cx.graphql(&mutation("projectCreate", &args, "project { id name url }")))
                }),
            // -- Teams --
            Op::new("linear_list_teams", "All teams")
                .request(|cx, _| Ok(cx.graphql(&connection("teams", "", TEAM_SUMMARY)))),
            Op::new("linear_get_team", "Team details with members and projects")
                .param(Param::string("team_id").required())
                .request(|cx, a| Ok(cx.graphql(&by_id("team", a.require_str("team_id")?, TEAM_DETAIL)))),
            // -- Cycles --
            Op::new("linear_list_cycles", "Sprint cycles, optionally for one team")
                .param(Param::string("team_id"))
                .param(Param::integer("first").default(20))
                .request(|cx, a| {
                    let args = graphql::arguments([first(a, 20)?, team_filter(a)?]);
                    Ok(cx.graphql(&connection("cycles", &args, CYCLE_SUMMARY)))
                }),
            Op::new("linear_get_cycle", "Cycle details")
                .param(Param::string("cycle_id").required())
                .request(|cx, a| Ok(cx.graphql(&by_id("cycle", a.require_str("cycle_id")?, CYCLE_DETAIL)))),
            // -- Labels --
            Op::new("linear_list_labels", "Issue labels, optionally for one team")
                .param(Param::string("team_id"))
                .request(|cx, a| {
                    let args = graphql::arguments([team_filter(a)?]);
                    Ok(cx.graphql(&connection("issueLabels", &args, LABEL_SUMMARY)))
                }),
            Op::new("linear_create_label", "Create an issue label")
                .param(Param::string("name").required())
                .param(Param::string("team_id").required())
                .param(Param::string("color").describe("Hex, e.g. #FF0000"))
                .param(Param::string("description"))
                .request(|cx, a| {
                    let input = ParamSet::new()
                        .forward(a, "name")
                        .forward_as(a, "team_id", "teamId")
                        .forward(a, "color")
                        .forward(a, "description");
                    let args = format!("input: {}", graphql::input_object(&input));
                    Ok(cx.graphql(&mutation("issueLabelCreate", &args, "issueLabel { id name color }")))
                }),
            // -- Search and planning --
            Op::new("linear_search_issues", "Full-text issue search")
                .param(Param::string("query_text").required())
                .param(Param::integer("first").default(20))
                .request(|cx, a| {
                    let args = graphql::arguments([
                        Some(format!("query: {}", graphql::string(a.require_str("query_text")?))),
                        first(a, 20)?,
                    ]);
                    Ok(cx.graphql(&connection(
                        "issueSearch",
                        &args,
                        "id title description state { name } assignee { name } url",
                    )))
                }),
            Op::new("linear_get_roadmap", "Projects with progress and target dates")
                .param(Param::integer("first").default(50))
                .request(|cx, a| {
                    let args = graphql::arguments([first(a, 50)?]);
                    Ok(cx.graphql(&connection("projects", &args, ROADMAP_ITEM)))
                }),
            Op::new("linear_list_milestones", "Project milestones")
                .param(Param::string("project_id"))
                .param(Param::integer("first").default(50))
                .request(|cx, a| {
                    let filter = Filter::new().eq("project", "id", a.str("project_id")?);
                    let args = graphql::arguments([first(a, 50)?, filter.render()]);
                    Ok(cx.graphql(&connection("projectMilestones", &args, MILESTONE)))
                }),
        ];
        ops.into_iter().map(|op| op.shape(shape::graphql_data)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;

    fn query_of(tool: &str, params: serde_json::Value) -> String {
        let d = adapter::<Linear>(&[("LINEAR_API_KEY", "lin_api")])
            .prepare(tool, params)
            .unwrap()
            .remove(0);
        d.json_body().unwrap()["query"].as_str().unwrap().to_string()
    }

    #[test]
    fn list_issues_includes_only_supplied_filters() {
        let q = query_of("linear_list_issues", json!({"team_id": "T1"}));
        assert!(q.contains(r#"issues(first: 50, filter: { team: { id: { eq: "T1" } } })"#));
        assert!(!q.contains("project:"));

        let q = query_of("linear_list_issues", json!({}));
        assert!(q.contains("issues(first: 50)"));
    }

    #[test]
    fn create_issue_escapes_and_keeps_zero_priority() {
        let q = query_of(
            "linear_create_issue",
            json!({"team_id": "T", "title": "Fix \"quotes\"", "label_ids": ["a", "b"]}),
        );
        assert!(q.contains(r#"title: "Fix \"quotes\"""#));
        assert!(q.contains("priority: 0"));
        assert!(q.contains(r#"labelIds: ["a", "b"]"#));
        assert!(!q.contains("description"));
    }

    #[test]
    fn requests_use_raw_authorization() {
        let d = adapter::<Linear>(&[("LINEAR_API_KEY", "lin_api")])
            .prepare("linear_list_teams", json!({}))
            .unwrap()
            .remove(0);
        assert_eq!(d.url, DEFAULT_BASE_URL);
        assert_eq!(d.header_value("authorization"), Some("lin_api"));
        assert_eq!(d.json_body().unwrap()["variables"], json!({}));
    }

    #[test]
    fn labels_without_team_have_no_arguments() {
        let q = query_of("linear_list_labels", json!({}));
        assert!(q.contains("issueLabels { nodes"));
    }
}
