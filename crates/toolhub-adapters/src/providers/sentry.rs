//! Sentry error tracking (web API v0).
//!
//! Sentry routes end in a trailing slash; every path here keeps it.

use reqwest::Method;
use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://sentry.io/api/0";

/// Sentry provider context.
pub struct Sentry {
    token: Credential,
    base_url: String,
}

type Op = Operation<Sentry>;

impl Sentry {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url))
            .bearer(&self.token)
            .timeout(TimeoutClass::Metadata)
    }

    fn org(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let org = encode_segment(a.require_str("organization_slug")?);
        Ok(self.call(method, &format!("/organizations/{org}/{suffix}")))
    }

    fn project(&self, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let org = encode_segment(a.require_str("organization_slug")?);
        let project = encode_segment(a.require_str("project_slug")?);
        Ok(self.call(Method::GET, &format!("/projects/{org}/{project}/{suffix}")))
    }

    fn issue(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let id = encode_segment(&a.require_id("issue_id")?);
        Ok(self.call(method, &format!("/issues/{id}/{suffix}")))
    }
}

/// Search expression for the issue list: `is:<status> project:<slug> <query>`,
/// from whichever parts are given.
pub fn issue_query(a: &Args) -> Result<Option<String>> {
    let parts: Vec<String> = [
        a.str("status")?.map(|s| format!("is:{s}")),
        a.str("project_slug")?.map(|p| format!("project:{p}")),
        a.str("query")?.map(str::to_string),
    ]
    .into_iter()
    .flatten()
    .collect();
    Ok((!parts.is_empty()).then(|| parts.join(" ")))
}

fn org_slug() -> Param {
    Param::string("organization_slug").required()
}

fn project_slug() -> Param {
    Param::string("project_slug").required()
}

fn issue_id() -> Param {
    Param::string("issue_id").required()
}

fn limit() -> Param {
    Param::integer("limit").default(25)
}

impl Provider for Sentry {
    const ID: &'static str = "sentry";
    const ADAPTER_TYPE: AdapterType = AdapterType::DevTools;
    const ENV_VARS: &'static [&'static str] = &["SENTRY_AUTH_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            token: require(env, Self::ID, "SENTRY_AUTH_TOKEN")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("sentry_list_organizations", "Organizations the token can access")
                .request(|cx, _| Ok(cx.call(Method::GET, "/organizations/"))),
            Op::new("sentry_list_projects", "Projects in an organization")
                .param(org_slug())
                .request(|cx, a| cx.org(Method::GET, a, "projects/")),
            Op::new("sentry_get_project", "Project details")
                .param(org_slug())
                .param(project_slug())
                .request(|cx, a| cx.project(a, "")),
            // -- Issues --
            Op::new("sentry_list_issues", "Issues in an organization")
                .param(org_slug())
                .param(Param::string("project_slug"))
                .param(Param::string("query").describe("e.g. \"level:error\""))
                .param(Param::string("status").one_of(&["unresolved", "resolved", "ignored"]))
                .param(limit())
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward(a, "limit")
                        .maybe("query", issue_query(a)?);
                    Ok(cx.org(Method::GET, a, "issues/")?.query(query))
                }),
            Op::new("sentry_get_issue", "Issue details")
                .param(issue_id())
                .request(|cx, a| cx.issue(Method::GET, a, "")),
            Op::new("sentry_update_issue", "Change status, assignee or flags")
                .param(issue_id())
                .param(Param::string("status").one_of(&[
                    "resolved",
                    "unresolved",
                    "ignored",
                    "resolvedInNextRelease",
                ]))
                .param(Param::string("assigned_to").describe("Username or email"))
                .param(Param::boolean("has_seen"))
                .param(Param::boolean("is_bookmarked"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "status")
                        .forward_as(a, "assigned_to", "assignedTo")
                        .forward_as(a, "has_seen", "hasSeen")
                        .forward_as(a, "is_bookmarked", "isBookmarked");
                    Ok(cx.issue(Method::PUT, a, "")?.json_params(body))
                }),
            Op::new("sentry_resolve_issue", "Mark an issue resolved")
                .param(issue_id())
                .request(|cx, a| Ok(cx.issue(Method::PUT, a, "")?.json(json!({ "status": "resolved" })))),
            Op::new("sentry_ignore_issue", "Mark an issue ignored")
                .param(issue_id())
                .request(|cx, a| Ok(cx.issue(Method::PUT, a, "")?.json(json!({ "status": "ignored" })))),
            Op::new("sentry_list_events", "Events grouped under an issue")
                .param(issue_id())
                .param(limit())
                .request(|cx, a| {
                    Ok(cx
                        .issue(Method::GET, a, "events/")?
                        .query(ParamSet::new().forward(a, "limit")))
                }),
            Op::new("sentry_get_event", "One event with stack trace and context")
                .param(org_slug())
                .param(project_slug())
                .param(Param::string("event_id").required())
                .request(|cx, a| {
                    let event = encode_segment(a.require_str("event_id")?);
                    cx.project(a, &format!("events/{event}/"))
                }),
            // -- Releases --
            Op::new("sentry_list_releases", "Releases of a project")
                .param(org_slug())
                .param(project_slug())
                .param(limit())
                .request(|cx, a| Ok(cx.project(a, "releases/")?.query(ParamSet::new().forward(a, "limit")))),
            Op::new("sentry_get_release", "Release details")
                .param(org_slug())
                .param(Param::string("version").required())
                .request(|cx, a| {
                    let version = encode_segment(a.require_str("version")?);
                    cx.org(Method::GET, a, &format!("releases/{version}/"))
                }),
            Op::new("sentry_create_release", "Create a release for one or more projects")
                .param(org_slug())
                .param(Param::string("version").required())
                .param(Param::array("projects", ParamKind::String).required())
                .param(
                    Param::array("refs", ParamKind::Object)
                        .describe("[{\"repository\": \"repo\", \"commit\": \"sha\"}]"),
                )
                .param(Param::array("commits", ParamKind::Object))
                .param(Param::string("date_released").describe("ISO 8601"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_all(a, &["version", "projects", "refs", "commits"])
                        .forward_as(a, "date_released", "dateReleased");
                    Ok(cx.org(Method::POST, a, "releases/")?.json_params(body))
                }),
            // -- Misc --
            Op::new("sentry_list_teams", "Teams in an organization")
                .param(org_slug())
                .request(|cx, a| cx.org(Method::GET, a, "teams/")),
            Op::new("sentry_get_project_stats", "Event counts over time")
                .param(org_slug())
                .param(project_slug())
                .param(Param::string("stat").default("received").one_of(&["received", "rejected", "blacklisted"]))
                .param(Param::string("resolution").default("1h").one_of(&["10s", "1h", "1d"]))
                .request(|cx, a| {
                    Ok(cx
                        .project(a, "stats/")?
                        .query(ParamSet::new().forward_all(a, &["stat", "resolution"])))
                }),
            Op::new("sentry_search_issues", "Issues matching a raw search expression")
                .param(org_slug())
                .param(Param::string("query").required())
                .param(limit())
                .param(Param::string("sort").default("date").one_of(&["date", "new", "priority", "freq", "user"]))
                .request(|cx, a| {
                    let query = ParamSet::new().forward_all(a, &["query", "limit", "sort"]);
                    Ok(cx.org(Method::GET, a, "issues/")?.query(query))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::adapter;

    fn prepare(tool: &str, params: serde_json::Value) -> RequestDescriptor {
        adapter::<Sentry>(&[("SENTRY_AUTH_TOKEN", "s")])
            .prepare(tool, params)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn issue_query_joins_given_parts() {
        let a = Args::from_value(
            "t",
            json!({"status": "unresolved", "project_slug": "web", "query": "level:error"}),
        )
        .unwrap();
        assert_eq!(
            issue_query(&a).unwrap().as_deref(),
            Some("is:unresolved project:web level:error")
        );
        let empty = Args::from_value("t", json!({})).unwrap();
        assert_eq!(issue_query(&empty).unwrap(), None);
    }

    #[test]
    fn list_issues_without_filters_sends_only_limit() {
        let d = prepare("sentry_list_issues", json!({"organization_slug": "acme"}));
        assert_eq!(d.url, "https://sentry.io/api/0/organizations/acme/issues/");
        assert_eq!(d.query_value("limit"), Some("25"));
        assert!(d.query_value("query").is_none());
    }

    #[test]
    fn update_issue_is_put_with_wire_names() {
        let d = prepare(
            "sentry_update_issue",
            json!({"issue_id": 42, "has_seen": false}),
        );
        assert_eq!(d.method, Method::PUT);
        assert!(d.url.ends_with("/issues/42/"));
        assert_eq!(d.json_body().unwrap(), &json!({"hasSeen": false}));
    }
}
