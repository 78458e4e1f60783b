//! Abstract API validation and lookup services.
//!
//! Every service lives on its own host (`https://<service>.abstractapi.com`)
//! and takes the API key as the `api_key` query parameter.

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass};
use crate::shape::{self, PREVIEW_CHARS};
use crate::traits::AdapterType;

/// Abstract API provider context.
pub struct AbstractApi {
    key: Credential,
    /// Replaces the per-service hosts: requests go to `{root}/{service}{path}`.
    root: Option<String>,
}

type Op = Operation<AbstractApi>;

impl AbstractApi {
    fn endpoint(&self, service: &str, path: &str) -> String {
        match &self.root {
            Some(root) => format!("{root}/{service}{path}"),
            None => format!("https://{service}.abstractapi.com/v1{path}"),
        }
    }

    /// GET `service` with the key and `params` in the query.
    fn get(&self, service: &str, path: &str, params: ParamSet) -> RequestDescriptor {
        RequestDescriptor::get(self.endpoint(service, path))
            .query(ParamSet::new().set("api_key", self.key.expose()).extend(params))
    }
}

fn rates_query(a: &Args) -> ParamSet {
    ParamSet::new().forward_all(a, &["base", "target", "date"])
}

impl Provider for AbstractApi {
    const ID: &'static str = "abstract";
    const ADAPTER_TYPE: AdapterType = AdapterType::Data;
    const ENV_VARS: &'static [&'static str] = &["ABSTRACT_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "ABSTRACT_API_KEY")?,
            root: settings.base_url.clone(),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Validation --
            Op::new("abstract_validate_email", "Check deliverability and quality of an email")
                .param(Param::string("email").required())
                .request(|cx, a| {
                    Ok(cx.get("emailvalidation", "/", ParamSet::new().forward(a, "email")))
                }),
            Op::new("abstract_validate_phone", "Validate a phone number and identify its carrier")
                .param(Param::string("phone").required())
                .param(Param::string("country_code").describe("ISO code for national numbers"))
                .request(|cx, a| {
                    Ok(cx.get(
                        "phonevalidation",
                        "/",
                        ParamSet::new().forward_all(a, &["phone", "country_code"]),
                    ))
                }),
            Op::new("abstract_validate_vat", "Validate an EU VAT number")
                .param(Param::string("vat_number").required())
                .request(|cx, a| {
                    Ok(cx.get("vatapi", "/", ParamSet::new().forward(a, "vat_number")))
                }),
            // -- IP intelligence --
            Op::new("abstract_geolocate_ip", "Geolocate an IP (caller's IP when omitted)")
                .param(Param::string("ip_address"))
                .param(Param::string("fields").describe("Comma-separated fields to return"))
                .request(|cx, a| {
                    Ok(cx.get(
                        "ipgeolocation",
                        "/",
                        ParamSet::new().forward_all(a, &["ip_address", "fields"]),
                    ))
                }),
            Op::new("abstract_get_ip_info", "ISP, ASN and connection details of an IP")
                .param(Param::string("ip_address").required())
                .request(|cx, a| {
                    Ok(cx.get("ipgeolocation", "/", ParamSet::new().forward(a, "ip_address")))
                }),
            Op::new("abstract_check_vpn", "Detect VPN, proxy or hosting-provider IPs")
                .param(Param::string("ip_address").required())
                .request(|cx, a| {
                    Ok(cx.get(
                        "ipgeolocation",
                        "/",
                        ParamSet::new()
                            .forward(a, "ip_address")
                            .set("fields", "security"),
                    ))
                }),
            // -- Time --
            Op::new(
                "abstract_get_timezone",
                "Current time at a location name or latitude/longitude",
            )
            .param(Param::string("location"))
            .param(Param::number("latitude"))
            .param(Param::number("longitude"))
            .request(|cx, a| {
                let by_coords = a.has("latitude") && a.has("longitude");
                if !a.has("location") && !by_coords {
                    return Err(a.invalid("provide `location` or both `latitude` and `longitude`"));
                }
                let params = if a.has("location") {
                    ParamSet::new().forward(a, "location")
                } else {
                    ParamSet::new().forward_all(a, &["latitude", "longitude"])
                };
                Ok(cx.get("timezone", "/current_time/", params))
            }),
            Op::new("abstract_convert_timezone", "Convert a datetime between locations")
                .param(Param::string("base_location").required())
                .param(Param::string("base_datetime").required().describe("YYYY-MM-DD HH:MM:SS"))
                .param(Param::string("target_location").required())
                .request(|cx, a| {
                    Ok(cx.get(
                        "timezone",
                        "/convert_time/",
                        ParamSet::new().forward_all(
                            a,
                            &["base_location", "base_datetime", "target_location"],
                        ),
                    ))
                }),
            Op::new("abstract_get_holidays", "Public holidays for a country and date")
                .param(Param::string("country").required().describe("ISO 3166 alpha-2"))
                .param(Param::integer("year").required())
                .param(Param::integer("month"))
                .param(Param::integer("day"))
                .request(|cx, a| {
                    Ok(cx.get(
                        "holidays",
                        "/",
                        ParamSet::new().forward_all(a, &["country", "year", "month", "day"]),
                    ))
                }),
            // -- Currency --
            Op::new("abstract_get_exchange_rates", "Live exchange rates for a base currency")
                .param(Param::string("base").default("USD"))
                .param(Param::string("target").describe("Comma-separated target currencies"))
                .request(|cx, a| Ok(cx.get("exchange-rates", "/live/", rates_query(a)))),
            Op::new(
                "abstract_convert_currency",
                "Convert an amount using live or historical rates",
            )
            .param(Param::string("base").required())
            .param(Param::string("target").required())
            .param(Param::number("amount").required())
            .param(Param::string("date").describe("YYYY-MM-DD for historical rates"))
            .request(|cx, a| {
                let path = if a.has("date") { "/historical/" } else { "/live/" };
                Ok(cx.get("exchange-rates", path, rates_query(a)))
            })
            .shape(|a, r| {
                let target = a.require_str("target")?;
                let amount = a.require("amount")?;
                Ok(shape::attach_converted_amount(r.json()?, target, amount))
            }),
            // -- Web --
            Op::new("abstract_get_company_info", "Company profile from a domain")
                .param(Param::string("domain").required())
                .request(|cx, a| {
                    Ok(cx.get("companyenrichment", "/", ParamSet::new().forward(a, "domain")))
                }),
            Op::new("abstract_scrape_url", "Fetch a page through the scraping proxy")
                .param(Param::string("url").required())
                .param(Param::boolean("render_js").default(false))
                .request(|cx, a| {
                    Ok(cx
                        .get(
                            "scrape",
                            "/",
                            ParamSet::new().forward_all(a, &["url", "render_js"]),
                        )
                        .timeout(TimeoutClass::Standard))
                })
                .shape(|_, r| match r.json() {
                    Ok(v) => Ok(v),
                    Err(_) => Ok(json!({ "content": r.text(), "content_type": r.content_type() })),
                }),
            Op::new(
                "abstract_generate_screenshot",
                "Screenshot a page; returns a hex preview of the image",
            )
            .param(Param::string("url").required())
            .param(Param::integer("width").default(1920))
            .param(Param::integer("height").default(1080))
            .param(Param::boolean("full_page").default(false))
            .request(|cx, a| {
                Ok(cx
                    .get(
                        "screenshot",
                        "/",
                        ParamSet::new().forward_all(a, &["url", "width", "height", "full_page"]),
                    )
                    .timeout(TimeoutClass::Standard))
            })
            .shape(|a, r| {
                Ok(json!({
                    "success": true,
                    "url": a.require_str("url")?,
                    "image_data": shape::hex_preview(&r.body, PREVIEW_CHARS),
                    "size_bytes": r.body.len(),
                    "content_type": r.content_type(),
                    "note": "image_data is a truncated hex preview; request the screenshot URL directly for the full image",
                }))
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;
    use crate::transport::ResponseEnvelope;

    fn abstract_api() -> ServiceAdapter<AbstractApi> {
        adapter(&[("ABSTRACT_API_KEY", "k1")])
    }

    #[test]
    fn key_goes_first_in_query() {
        let d = &abstract_api()
            .prepare("abstract_validate_email", json!({"email": "a@b.co"}))
            .unwrap()[0];
        assert_eq!(d.url, "https://emailvalidation.abstractapi.com/v1/");
        assert_eq!(d.query[0], ("api_key".to_string(), "k1".to_string()));
        assert_eq!(d.query_value("email"), Some("a@b.co"));
    }

    #[test]
    fn timezone_needs_location_or_coordinates() {
        let err = abstract_api()
            .prepare("abstract_get_timezone", json!({"latitude": 1.0}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let d = &abstract_api()
            .prepare(
                "abstract_get_timezone",
                json!({"latitude": 51.5, "longitude": -0.12}),
            )
            .unwrap()[0];
        assert!(d.url.ends_with("/current_time/"));
        assert!(d.query_value("location").is_none());
    }

    #[test]
    fn historical_endpoint_when_date_given() {
        let d = &abstract_api()
            .prepare(
                "abstract_convert_currency",
                json!({"base": "USD", "target": "EUR", "amount": 10, "date": "2024-01-02"}),
            )
            .unwrap()[0];
        assert!(d.url.ends_with("/v1/historical/"));
        assert!(d.query_value("amount").is_none());
    }

    #[test]
    fn screenshot_flags_are_lowercase() {
        let d = &abstract_api()
            .prepare("abstract_generate_screenshot", json!({"url": "https://x.dev"}))
            .unwrap()[0];
        assert_eq!(d.query_value("full_page"), Some("false"));
        assert_eq!(d.query_value("width"), Some("1920"));
        assert_eq!(d.timeout, TimeoutClass::Standard);
    }

    #[test]
    fn scrape_falls_back_to_text() {
        let ops = AbstractApi::operations();
        let op = ops.iter().find(|o| o.name == "abstract_scrape_url").unwrap();
        let a = Args::from_value("abstract_scrape_url", json!({"url": "u"})).unwrap();
        let out = (op.shape)(&a, ResponseEnvelope::new(200, "text/html", "<p>x</p>")).unwrap();
        assert_eq!(out["content"], "<p>x</p>");
    }
}
