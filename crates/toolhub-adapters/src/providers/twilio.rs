//! Twilio messaging and voice API.
//!
//! Authenticates with the account SID and auth token as an HTTP Basic pair;
//! both are required.  Writes are form-encoded.

use reqwest::Method;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_API_ROOT: &str = "https://api.twilio.com/2010-04-01";
const DEFAULT_LOOKUP_ROOT: &str = "https://lookups.twilio.com/v1";
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Twilio provider context.
pub struct Twilio {
    account_sid: String,
    auth_token: Credential,
    api_root: String,
    lookup_root: String,
}

type Op = Operation<Twilio>;

impl Twilio {
    /// Request against `/Accounts/{sid}{path}.json`.
    fn account(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(
            method,
            format!(
                "{}/Accounts/{}{path}.json",
                self.api_root,
                encode_segment(&self.account_sid)
            ),
        )
        .basic(&self.account_sid, Some(&self.auth_token))
    }

    fn lookup(&self, number: &str) -> RequestDescriptor {
        RequestDescriptor::get(format!(
            "{}/PhoneNumbers/{}",
            self.lookup_root,
            encode_segment(number)
        ))
        .basic(&self.account_sid, Some(&self.auth_token))
    }
}

fn whatsapp_address(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

fn message_form(a: &Args, to: String, from: String) -> Result<ParamSet> {
    Ok(ParamSet::new()
        .set("To", to)
        .set("From", from)
        .set("Body", a.require_str("body")?)
        .forward_as(a, "media_url", "MediaUrl"))
}

fn page_size() -> Param {
    Param::integer("page_size").default(50)
}

fn message_params(op: Op) -> Op {
    op.param(Param::string("to").required().describe("Destination number (E.164)"))
        .param(Param::string("from").required().describe("Twilio number or sender"))
        .param(Param::string("body").required())
        .param(Param::array("media_url", ParamKind::String).describe("Media URLs (MMS)"))
}

impl Provider for Twilio {
    const ID: &'static str = "twilio";
    const ADAPTER_TYPE: AdapterType = AdapterType::Messaging;
    const ENV_VARS: &'static [&'static str] = &["TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        let account_sid = require(env, Self::ID, "TWILIO_ACCOUNT_SID")?;
        let auth_token = require(env, Self::ID, "TWILIO_AUTH_TOKEN")?;
        Ok(Self {
            account_sid: account_sid.expose().to_string(),
            auth_token,
            api_root: settings.base_url_or(DEFAULT_API_ROOT),
            lookup_root: settings.base_url_or(DEFAULT_LOOKUP_ROOT),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Messages --
            message_params(Op::new("twilio_send_sms", "Send an SMS or MMS message")).request(
                |cx, a| {
                    let form = message_form(
                        a,
                        a.require_str("to")?.to_string(),
                        a.require_str("from")?.to_string(),
                    )?;
                    Ok(cx.account(Method::POST, "/Messages").form(form))
                },
            ),
            message_params(Op::new(
                "twilio_send_whatsapp",
                "Send a WhatsApp message; numbers get the `whatsapp:` prefix when missing",
            ))
            .request(|cx, a| {
                let form = message_form(
                    a,
                    whatsapp_address(a.require_str("to")?),
                    whatsapp_address(a.require_str("from")?),
                )?;
                Ok(cx.account(Method::POST, "/Messages").form(form))
            }),
            Op::new("twilio_list_messages", "List messages on the account")
                .param(page_size())
                .param(Param::string("to"))
                .param(Param::string("from"))
                .param(Param::string("date_sent").describe("YYYY-MM-DD"))
                .request(|cx, a| {
                    Ok(cx.account(Method::GET, "/Messages").query(
                        ParamSet::new()
                            .forward_as(a, "page_size", "PageSize")
                            .forward_as(a, "to", "To")
                            .forward_as(a, "from", "From")
                            .forward_as(a, "date_sent", "DateSent"),
                    ))
                }),
            Op::new("twilio_get_message", "Fetch one message")
                .param(Param::string("message_sid").required())
                .request(|cx, a| {
                    let sid = encode_segment(a.require_str("message_sid")?);
                    Ok(cx.account(Method::GET, &format!("/Messages/{sid}")))
                }),
            // -- Calls --
            Op::new("twilio_make_call", "Place an outbound call driven by a TwiML URL")
                .param(Param::string("to").required())
                .param(Param::string("from").required())
                .param(Param::string("url").required().describe("TwiML instructions URL"))
                .param(Param::string("method").default("POST").one_of(&["GET", "POST"]))
                .param(Param::string("status_callback"))
                .request(|cx, a| {
                    Ok(cx.account(Method::POST, "/Calls").form(
                        ParamSet::new()
                            .forward_as(a, "to", "To")
                            .forward_as(a, "from", "From")
                            .forward_as(a, "url", "Url")
                            .forward_as(a, "method", "Method")
                            .forward_as(a, "status_callback", "StatusCallback"),
                    ))
                }),
            Op::new("twilio_list_calls", "List calls on the account")
                .param(page_size())
                .param(Param::string("status").one_of(&[
                    "queued",
                    "ringing",
                    "in-progress",
                    "canceled",
                    "completed",
                    "failed",
                    "busy",
                    "no-answer",
                ]))
                .param(Param::string("to"))
                .param(Param::string("from"))
                .request(|cx, a| {
                    Ok(cx.account(Method::GET, "/Calls").query(
                        ParamSet::new()
                            .forward_as(a, "page_size", "PageSize")
                            .forward_as(a, "status", "Status")
                            .forward_as(a, "to", "To")
                            .forward_as(a, "from", "From"),
                    ))
                }),
            Op::new("twilio_get_call", "Fetch one call")
                .param(Param::string("call_sid").required())
                .request(|cx, a| {
                    let sid = encode_segment(a.require_str("call_sid")?);
                    Ok(cx.account(Method::GET, &format!("/Calls/{sid}")))
                }),
            // -- Account --
            Op::new("twilio_get_account_balance", "Current account balance")
                .request(|cx, _| Ok(cx.account(Method::GET, "/Balance"))),
            Op::new("twilio_list_phone_numbers", "List incoming phone numbers")
                .param(page_size())
                .param(Param::string("phone_number"))
                .param(Param::string("friendly_name"))
                .request(|cx, a| {
                    Ok(cx.account(Method::GET, "/IncomingPhoneNumbers").query(
                        ParamSet::new()
                            .forward_as(a, "page_size", "PageSize")
                            .forward_as(a, "phone_number", "PhoneNumber")
                            .forward_as(a, "friendly_name", "FriendlyName"),
                    ))
                }),
            Op::new("twilio_lookup_phone_number", "Carrier and caller-name lookup for a number")
                .param(Param::string("phone_number").required())
                .param(Param::string("country_code").describe("ISO country for national numbers"))
                .param(
                    Param::array("type", ParamKind::String)
                        .describe("Extra data: carrier, caller-name"),
                )
                .request(|cx, a| {
                    Ok(cx.lookup(a.require_str("phone_number")?).query(
                        ParamSet::new()
                            .forward_as(a, "country_code", "CountryCode")
                            .forward_as(a, "type", "Type"),
                    ))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::{adapter, try_adapter};
    use crate::request::Auth;
    use serde_json::json;

    fn twilio() -> ServiceAdapter<Twilio> {
        adapter(&[("TWILIO_ACCOUNT_SID", "AC123"), ("TWILIO_AUTH_TOKEN", "tok")])
    }

    #[test]
    fn both_credentials_are_required() {
        let err = try_adapter::<Twilio>(&[("TWILIO_ACCOUNT_SID", "AC123")]).unwrap_err();
        assert!(err.to_string().contains("TWILIO_AUTH_TOKEN"));
    }

    #[test]
    fn sms_uses_basic_auth_and_form() {
        let d = &twilio()
            .prepare(
                "twilio_send_sms",
                json!({"to": "+15550001", "from": "+15550002", "body": "hi"}),
            )
            .unwrap()[0];
        assert_eq!(
            d.url,
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        match &d.auth {
            Auth::Basic { username, password } => {
                assert_eq!(username, "AC123");
                assert_eq!(password.as_ref().unwrap().expose(), "tok");
            }
            other => panic!("unexpected auth {other:?}"),
        }
        let form = d.form_body().unwrap();
        assert!(!form.iter().any(|(k, _)| k == "MediaUrl"));
    }

    #[test]
    fn whatsapp_prefix_is_added_once() {
        let d = &twilio()
            .prepare(
                "twilio_send_whatsapp",
                json!({"to": "+1555", "from": "whatsapp:+1666", "body": "hi"}),
            )
            .unwrap()[0];
        let form = d.form_body().unwrap();
        assert!(form.contains(&("To".into(), "whatsapp:+1555".into())));
        assert!(form.contains(&("From".into(), "whatsapp:+1666".into())));
    }

    #[test]
    fn lookup_uses_lookup_host() {
        let d = &twilio()
            .prepare("twilio_lookup_phone_number", json!({"phone_number": "+15550001"}))
            .unwrap()[0];
        assert_eq!(d.url, "https://lookups.twilio.com/v1/PhoneNumbers/%2B15550001");
    }
}
