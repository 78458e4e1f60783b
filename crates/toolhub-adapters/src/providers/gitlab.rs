//! GitLab REST API v4.
//!
//! The API root is resolved in order: configured `base_url`, then
//! `GITLAB_URL` + `/api/v4`, then gitlab.com.  Project ids may be numeric or
//! a `group/project` path; either way they are percent-encoded into a
//! single path segment.

use reqwest::Method;
use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, optional, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment, normalize_base};
use crate::traits::AdapterType;

const DEFAULT_HOST: &str = "https://gitlab.com";

/// GitLab provider context.
pub struct GitLab {
    token: Credential,
    base_url: String,
}

type Op = Operation<GitLab>;

impl GitLab {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url))
            .secret_header("PRIVATE-TOKEN", self.token.expose())
    }

    /// `/projects/{project_id}{suffix}`
    fn project(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let id = encode_segment(&a.require_id("project_id")?);
        Ok(self.call(method, &format!("/projects/{id}{suffix}")))
    }

    /// Project-scoped when `project_id` is given, instance-wide otherwise.
    fn scoped(&self, a: &Args, collection: &str) -> Result<RequestDescriptor> {
        if a.has("project_id") {
            self.project(Method::GET, a, &format!("/{collection}"))
        } else {
            Ok(self.call(Method::GET, &format!("/{collection}")))
        }
    }
}

fn project_id() -> Param {
    Param::any("project_id")
        .required()
        .describe("Numeric id or namespace path such as group/project")
}

fn per_page() -> Param {
    Param::integer("per_page").default(20)
}

impl Provider for GitLab {
    const ID: &'static str = "gitlab";
    const ADAPTER_TYPE: AdapterType = AdapterType::DevTools;
    const ENV_VARS: &'static [&'static str] = &["GITLAB_PERSONAL_ACCESS_TOKEN"];
    const OPTIONAL_ENV_VARS: &'static [&'static str] = &["GITLAB_URL"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        let token = require(env, Self::ID, "GITLAB_PERSONAL_ACCESS_TOKEN")?;
        let host = optional(env, "GITLAB_URL").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let default = format!("{}/api/v4", normalize_base(&host));
        Ok(Self {
            token,
            base_url: settings.base_url_or(&default),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Projects --
            Op::new("gitlab_list_projects", "Projects visible to the token")
                .param(Param::string("visibility").one_of(&["public", "internal", "private"]))
                .param(Param::boolean("owned"))
                .param(Param::boolean("starred"))
                .param(Param::boolean("archived").default(false))
                .param(per_page())
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/projects").query(ParamSet::new().forward_all(
                        a,
                        &["per_page", "archived", "visibility", "owned", "starred"],
                    )))
                }),
            Op::new("gitlab_get_project", "Project details")
                .param(project_id())
                .request(|cx, a| cx.project(Method::GET, a, "")),
            // -- Issues --
            Op::new("gitlab_list_issues", "Issues in a project, or across the instance")
                .param(Param::any("project_id").describe("Omit to list issues across projects"))
                .param(Param::string("state").one_of(&["opened", "closed", "all"]))
                .param(Param::string("labels").describe("Comma-separated"))
                .param(Param::string("milestone"))
                .param(Param::integer("assignee_id"))
                .param(Param::integer("author_id"))
                .param(Param::string("scope").one_of(&["created_by_me", "assigned_to_me", "all"]))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(
                        a,
                        &[
                            "per_page",
                            "state",
                            "labels",
                            "milestone",
                            "assignee_id",
                            "author_id",
                            "scope",
                        ],
                    );
                    Ok(cx.scoped(a, "issues")?.query(q))
                }),
            Op::new("gitlab_get_issue", "One issue by project-local iid")
                .param(project_id())
                .param(Param::integer("issue_iid").required())
                .request(|cx, a| {
                    cx.project(Method::GET, a, &format!("/issues/{}", a.require_i64("issue_iid")?))
                }),
            Op::new("gitlab_create_issue", "Open an issue")
                .param(project_id())
                .param(Param::string("title").required())
                .param(Param::string("description"))
                .param(Param::array("assignee_ids", ParamKind::Integer))
                .param(Param::string("labels"))
                .param(Param::integer("milestone_id"))
                .param(Param::boolean("confidential").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &[
                            "title",
                            "confidential",
                            "description",
                            "assignee_ids",
                            "labels",
                            "milestone_id",
                        ],
                    );
                    Ok(cx.project(Method::POST, a, "/issues")?.json_params(body))
                }),
            Op::new("gitlab_update_issue", "Edit, close or reopen an issue")
                .param(project_id())
                .param(Param::integer("issue_iid").required())
                .param(Param::string("title"))
                .param(Param::string("description"))
                .param(Param::string("state_event").one_of(&["close", "reopen"]))
                .param(Param::array("assignee_ids", ParamKind::Integer))
                .param(Param::string("labels"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &["title", "description", "state_event", "assignee_ids", "labels"],
                    );
                    let path = format!("/issues/{}", a.require_i64("issue_iid")?);
                    Ok(cx.project(Method::PUT, a, &path)?.json_params(body))
                }),
            // -- Merge requests --
            Op::new("gitlab_list_merge_requests", "Merge requests in a project, or across the instance")
                .param(Param::any("project_id"))
                .param(Param::string("state").one_of(&["opened", "closed", "locked", "merged", "all"]))
                .param(Param::string("scope"))
                .param(Param::integer("author_id"))
                .param(Param::integer("assignee_id"))
                .param(Param::integer("reviewer_id"))
                .param(Param::string("labels"))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(
                        a,
                        &[
                            "per_page",
                            "state",
                            "scope",
                            "author_id",
                            "assignee_id",
                            "reviewer_id",
                            "labels",
                        ],
                    );
                    Ok(cx.scoped(a, "merge_requests")?.query(q))
                }),
            Op::new("gitlab_get_merge_request", "One merge request")
                .param(project_id())
                .param(Param::integer("mr_iid").required())
                .request(|cx, a| {
                    let path = format!("/merge_requests/{}", a.require_i64("mr_iid")?);
                    cx.project(Method::GET, a, &path)
                }),
            Op::new("gitlab_create_merge_request", "Open a merge request")
                .param(project_id())
                .param(Param::string("source_branch").required())
                .param(Param::string("target_branch").required())
                .param(Param::string("title").required())
                .param(Param::string("description"))
                .param(Param::integer("assignee_id"))
                .param(Param::array("reviewer_ids", ParamKind::Integer))
                .param(Param::string("labels"))
                .param(Param::boolean("remove_source_branch").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &[
                            "source_branch",
                            "target_branch",
                            "title",
                            "remove_source_branch",
                            "description",
                            "assignee_id",
                            "reviewer_ids",
                            "labels",
                        ],
                    );
                    Ok(cx.project(Method::POST, a, "/merge_requests")?.json_params(body))
                }),
            Op::new("gitlab_approve_merge_request", "Approve a merge request")
                .param(project_id())
                .param(Param::integer("mr_iid").required())
                .request(|cx, a| {
                    let path = format!("/merge_requests/{}/approve", a.require_i64("mr_iid")?);
                    cx.project(Method::POST, a, &path)
                }),
            Op::new("gitlab_merge_merge_request", "Merge, or merge when the pipeline succeeds")
                .param(project_id())
                .param(Param::integer("mr_iid").required())
                .param(Param::string("merge_commit_message"))
                .param(Param::boolean("should_remove_source_branch").default(false))
                .param(Param::boolean("merge_when_pipeline_succeeds").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &[
                            "should_remove_source_branch",
                            "merge_when_pipeline_succeeds",
                            "merge_commit_message",
                        ],
                    );
                    let path = format!("/merge_requests/{}/merge", a.require_i64("mr_iid")?);
                    Ok(cx.project(Method::PUT, a, &path)?.json_params(body))
                }),
            // -- Pipelines --
            Op::new("gitlab_list_pipelines", "Pipelines of a project")
                .param(project_id())
                .param(Param::string("scope").one_of(&["running", "pending", "finished", "branches", "tags"]))
                .param(Param::string("status"))
                .param(Param::string("ref"))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(a, &["per_page", "scope", "status", "ref"]);
                    Ok(cx.project(Method::GET, a, "/pipelines")?.query(q))
                }),
            Op::new("gitlab_get_pipeline", "One pipeline")
                .param(project_id())
                .param(Param::integer("pipeline_id").required())
                .request(|cx, a| {
                    let path = format!("/pipelines/{}", a.require_i64("pipeline_id")?);
                    cx.project(Method::GET, a, &path)
                }),
            Op::new("gitlab_retry_pipeline", "Retry failed jobs of a pipeline")
                .param(project_id())
                .param(Param::integer("pipeline_id").required())
                .request(|cx, a| {
                    let path = format!("/pipelines/{}/retry", a.require_i64("pipeline_id")?);
                    cx.project(Method::POST, a, &path)
                }),
            // -- Repository --
            Op::new("gitlab_list_commits", "Commits on a ref")
                .param(project_id())
                .param(Param::string("ref_name"))
                .param(Param::string("since").describe("ISO 8601"))
                .param(Param::string("until").describe("ISO 8601"))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(a, &["per_page", "ref_name", "since", "until"]);
                    Ok(cx.project(Method::GET, a, "/repository/commits")?.query(q))
                }),
            Op::new("gitlab_get_commit", "One commit by SHA")
                .param(project_id())
                .param(Param::string("sha").required())
                .request(|cx, a| {
                    let path = format!("/repository/commits/{}", encode_segment(a.require_str("sha")?));
                    cx.project(Method::GET, a, &path)
                }),
            Op::new("gitlab_search_code", "Search the instance, or one project")
                .param(
                    Param::string("scope")
                        .required()
                        .describe("projects, issues, merge_requests, milestones, blobs, commits, ..."),
                )
                .param(Param::string("search").required())
                .param(Param::any("project_id").describe("Restrict to one project"))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(a, &["scope", "search", "per_page"]);
                    Ok(cx.scoped(a, "search")?.query(q))
                }),
            Op::new("gitlab_list_branches", "Repository branches")
                .param(project_id())
                .param(Param::string("search"))
                .param(per_page())
                .request(|cx, a| {
                    let q = ParamSet::new().forward_all(a, &["per_page", "search"]);
                    Ok(cx.project(Method::GET, a, "/repository/branches")?.query(q))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MapEnv;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;
    use crate::transport::HttpTransport;

    fn gitlab() -> ServiceAdapter<GitLab> {
        adapter(&[("GITLAB_PERSONAL_ACCESS_TOKEN", "glpat")])
    }

    #[test]
    fn project_paths_are_encoded() {
        let d = &gitlab()
            .prepare("gitlab_get_issue", json!({"project_id": "group/sub/proj", "issue_iid": 7}))
            .unwrap()[0];
        assert_eq!(
            d.url,
            "https://gitlab.com/api/v4/projects/group%2Fsub%2Fproj/issues/7"
        );
        assert_eq!(d.header_value("private-token"), Some("glpat"));
    }

    #[test]
    fn numeric_project_ids_are_accepted() {
        let d = &gitlab()
            .prepare("gitlab_get_project", json!({"project_id": 42}))
            .unwrap()[0];
        assert!(d.url.ends_with("/projects/42"));
    }

    #[test]
    fn issues_without_project_are_global() {
        let d = &gitlab()
            .prepare("gitlab_list_issues", json!({"state": "opened"}))
            .unwrap()[0];
        assert_eq!(d.url, "https://gitlab.com/api/v4/issues");
        assert_eq!(d.query_value("per_page"), Some("20"));
    }

    #[test]
    fn base_url_precedence() {
        let env = MapEnv::new()
            .with("GITLAB_PERSONAL_ACCESS_TOKEN", "t")
            .with("GITLAB_URL", "https://git.corp.example/");
        let self_hosted =
            ServiceAdapter::<GitLab>::from_env(&env, &ProviderSettings::default(), HttpTransport::new())
                .unwrap();
        assert_eq!(self_hosted.provider().base_url, "https://git.corp.example/api/v4");

        let overridden = ServiceAdapter::<GitLab>::from_env(
            &env,
            &ProviderSettings::with_base_url("http://127.0.0.1:9000"),
            HttpTransport::new(),
        )
        .unwrap();
        assert_eq!(overridden.provider().base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn update_issue_is_put() {
        let d = &gitlab()
            .prepare(
                "gitlab_update_issue",
                json!({"project_id": "a/b", "issue_iid": 1, "state_event": "close", "labels": ""}),
            )
            .unwrap()[0];
        assert_eq!(d.method, Method::PUT);
        assert_eq!(d.json_body().unwrap()["labels"], "");
    }
}
