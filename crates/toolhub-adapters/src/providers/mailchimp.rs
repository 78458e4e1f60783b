//! Mailchimp Marketing API 3.0.
//!
//! The host depends on the data center encoded as the key's trailing
//! `-<dc>` segment.  It is derived on every call, so a malformed key fails
//! that call with a configuration error before any request is made.
//! Members are addressed by the MD5 of their lowercased email.

use md5::{Digest, Md5};
use reqwest::Method;
use serde_json::{Value, json};

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, data_center, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::shape;
use crate::traits::AdapterType;

/// Mailchimp provider context.
pub struct Mailchimp {
    key: Credential,
    base_override: Option<String>,
}

type Op = Operation<Mailchimp>;

/// Hex MD5 of the lowercased address, as used in member URLs.
pub fn subscriber_hash(email: &str) -> String {
    hex::encode(Md5::digest(email.to_lowercase().as_bytes()))
}

impl Mailchimp {
    /// API root for this key's data center.
    pub fn base_url(&self) -> Result<String> {
        let dc = data_center(Self::ID, &self.key)?;
        Ok(match &self.base_override {
            Some(base) => base.clone(),
            None => format!("https://{dc}.api.mailchimp.com/3.0"),
        })
    }

    fn call(&self, method: Method, path: &str) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::new(method, format!("{}{path}", self.base_url()?))
            .basic("anystring", Some(&self.key)))
    }

    fn list(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let id = encode_segment(a.require_str("list_id")?);
        self.call(method, &format!("/lists/{id}{suffix}"))
    }

    fn member(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let hash = subscriber_hash(a.require_str("email_address")?);
        self.list(method, a, &format!("/members/{hash}{suffix}"))
    }

    fn campaign(&self, method: Method, a: &Args, suffix: &str) -> Result<RequestDescriptor> {
        let id = encode_segment(a.require_str("campaign_id")?);
        self.call(method, &format!("/campaigns/{id}{suffix}"))
    }
}

fn paging(op: Op) -> Op {
    op.param(Param::integer("count").default(10))
        .param(Param::integer("offset").default(0))
}

fn page(a: &Args) -> ParamSet {
    ParamSet::new().forward_all(a, &["count", "offset"])
}

fn list_id() -> Param {
    Param::string("list_id").required().describe("Audience (list) ID")
}

fn member_status() -> Param {
    Param::string("status").one_of(&[
        "subscribed",
        "unsubscribed",
        "cleaned",
        "pending",
        "transactional",
    ])
}

impl Provider for Mailchimp {
    const ID: &'static str = "mailchimp";
    const ADAPTER_TYPE: AdapterType = AdapterType::Messaging;
    const ENV_VARS: &'static [&'static str] = &["MAILCHIMP_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "MAILCHIMP_API_KEY")?,
            base_override: settings.base_url.clone(),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Audiences --
            paging(Op::new("mailchimp_list_audiences", "Audiences (lists) in the account"))
                .request(|cx, a| Ok(cx.call(Method::GET, "/lists")?.query(page(a)))),
            Op::new("mailchimp_get_audience", "Audience details")
                .param(list_id())
                .request(|cx, a| cx.list(Method::GET, a, "")),
            // -- Members --
            paging(Op::new("mailchimp_list_audience_members", "Members of an audience"))
                .param(list_id())
                .param(member_status())
                .request(|cx, a| {
                    Ok(cx
                        .list(Method::GET, a, "/members")?
                        .query(page(a).forward(a, "status")))
                }),
            Op::new("mailchimp_add_member", "Subscribe an address to an audience")
                .param(list_id())
                .param(Param::string("email_address").required())
                .param(member_status().default("subscribed"))
                .param(Param::object("merge_fields").describe("e.g. {\"FNAME\": \"Ada\"}"))
                .param(Param::array("tags", ParamKind::String))
                .param(Param::boolean("vip").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(
                        a,
                        &["email_address", "status", "vip", "merge_fields", "tags"],
                    );
                    Ok(cx.list(Method::POST, a, "/members")?.json_params(body))
                }),
            Op::new("mailchimp_update_member", "Change a member's status or fields")
                .param(list_id())
                .param(Param::string("email_address").required())
                .param(member_status())
                .param(Param::object("merge_fields"))
                .param(Param::boolean("vip"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["status", "merge_fields", "vip"]);
                    Ok(cx.member(Method::PATCH, a, "")?.json_params(body))
                }),
            Op::new("mailchimp_delete_member", "Archive a member")
                .param(list_id())
                .param(Param::string("email_address").required())
                .request(|cx, a| cx.member(Method::DELETE, a, ""))
                .shape(|a, _| Ok(shape::ack("email", a.require_str("email_address")?))),
            Op::new("mailchimp_search_members", "Find members by email or name")
                .param(Param::string("query").required())
                .param(Param::string("list_id").describe("Restrict to one audience"))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/search-members")?
                        .query(ParamSet::new().forward_all(a, &["query", "list_id"])))
                }),
            Op::new("mailchimp_add_tags_to_member", "Add tags to a member")
                .param(list_id())
                .param(Param::string("email_address").required())
                .param(Param::array("tags", ParamKind::String).required())
                .param(Param::boolean("is_syncing").default(false))
                .request(|cx, a| {
                    let tags: Vec<Value> = a
                        .str_list("tags")?
                        .unwrap_or_default()
                        .into_iter()
                        .map(|name| json!({ "name": name, "status": "active" }))
                        .collect();
                    let body = ParamSet::new().set("tags", tags).forward(a, "is_syncing");
                    Ok(cx.member(Method::POST, a, "/tags")?.json_params(body))
                })
                .shape(|a, _| {
                    let mut out = shape::ack("email", a.require_str("email_address")?);
                    out["tags_added"] = json!(a.require_array("tags")?.len());
                    Ok(out)
                }),
            paging(Op::new("mailchimp_list_tags", "Tags defined on an audience"))
                .param(list_id())
                .request(|cx, a| Ok(cx.list(Method::GET, a, "/tag-search")?.query(page(a)))),
            // -- Campaigns --
            paging(Op::new("mailchimp_list_campaigns", "Campaigns, optionally by status"))
                .param(Param::string("status").one_of(&["save", "paused", "schedule", "sending", "sent"]))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/campaigns")?
                        .query(page(a).forward(a, "status")))
                }),
            Op::new("mailchimp_get_campaign", "Campaign details")
                .param(Param::string("campaign_id").required())
                .request(|cx, a| cx.campaign(Method::GET, a, "")),
            Op::new("mailchimp_create_campaign", "Create a draft campaign")
                .param(
                    Param::string("campaign_type")
                        .required()
                        .one_of(&["regular", "plaintext", "absplit", "rss", "variate"]),
                )
                .param(list_id())
                .param(Param::string("subject_line").required())
                .param(Param::string("from_name").required())
                .param(Param::string("reply_to").required())
                .param(Param::string("title"))
                .request(|cx, a| {
                    let settings = ParamSet::new()
                        .forward_all(a, &["subject_line", "from_name", "reply_to", "title"]);
                    let body = json!({
                        "type": a.require_str("campaign_type")?,
                        "recipients": { "list_id": a.require_str("list_id")? },
                        "settings": settings.to_json(),
                    });
                    Ok(cx.call(Method::POST, "/campaigns")?.json(body))
                }),
            Op::new("mailchimp_send_campaign", "Send now, or schedule when schedule_time is given")
                .param(Param::string("campaign_id").required())
                .param(Param::string("schedule_time").describe("ISO 8601 UTC"))
                .request(|cx, a| match a.str("schedule_time")? {
                    Some(when) => Ok(cx
                        .campaign(Method::POST, a, "/actions/schedule")?
                        .json(json!({ "schedule_time": when }))),
                    None => cx.campaign(Method::POST, a, "/actions/send"),
                })
                .shape(|a, _| {
                    let mut out = shape::ack("campaign_id", a.require_str("campaign_id")?);
                    out["scheduled"] = json!(a.has("schedule_time"));
                    Ok(out)
                }),
            paging(Op::new("mailchimp_list_templates", "Email templates"))
                .request(|cx, a| Ok(cx.call(Method::GET, "/templates")?.query(page(a)))),
            Op::new("mailchimp_get_campaign_reports", "Opens, clicks and bounces for a sent campaign")
                .param(Param::string("campaign_id").required())
                .request(|cx, a| {
                    let id = encode_segment(a.require_str("campaign_id")?);
                    cx.call(Method::GET, &format!("/reports/{id}"))
                }),
            // -- Segments --
            paging(Op::new("mailchimp_list_segments", "Segments of an audience"))
                .param(list_id())
                .request(|cx, a| Ok(cx.list(Method::GET, a, "/segments")?.query(page(a)))),
            Op::new("mailchimp_create_segment", "Create a segment, optionally static")
                .param(list_id())
                .param(Param::string("name").required())
                .param(Param::array("static_segment", ParamKind::String).describe("Member emails"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["name", "static_segment"]);
                    Ok(cx.list(Method::POST, a, "/segments")?.json_params(body))
                }),
        ]
    }
}
