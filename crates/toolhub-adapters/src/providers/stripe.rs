//! Stripe payments API.
//!
//! Reads use query strings; writes are `application/x-www-form-urlencoded`
//! with nested maps flattened to `metadata[key]=value`.

use reqwest::Method;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::Param;
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

/// Stripe provider context.
pub struct Stripe {
    key: Credential,
    base_url: String,
}

type Op = Operation<Stripe>;

impl Stripe {
    fn call(&self, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, format!("{}{path}", self.base_url)).bearer(&self.key)
    }

    fn get_by_id(&self, collection: &str, id: &str) -> RequestDescriptor {
        self.call(Method::GET, &format!("/{collection}/{}", encode_segment(id)))
    }
}

fn limit() -> Param {
    Param::integer("limit")
        .describe("Number of objects to return (1-100)")
        .default(10)
}

fn starting_after() -> Param {
    Param::string("starting_after").describe("Cursor: object id to start after")
}

impl Provider for Stripe {
    const ID: &'static str = "stripe";
    const ADAPTER_TYPE: AdapterType = AdapterType::Payments;
    const ENV_VARS: &'static [&'static str] = &["STRIPE_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "STRIPE_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Customers --
            Op::new("stripe_list_customers", "List customers, newest first")
                .param(limit())
                .param(starting_after())
                .param(Param::string("email").describe("Only customers with this email"))
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/customers").query(
                        ParamSet::new().forward_all(a, &["limit", "starting_after", "email"]),
                    ))
                }),
            Op::new("stripe_get_customer", "Retrieve one customer")
                .param(Param::string("customer_id").required())
                .request(|cx, a| Ok(cx.get_by_id("customers", a.require_str("customer_id")?))),
            Op::new(
                "stripe_search_customers",
                "Search customers with Stripe's search query language",
            )
            .param(
                Param::string("query")
                    .required()
                    .describe("e.g. email:'jane@example.com'"),
            )
            .param(limit())
            .request(|cx, a| {
                Ok(cx
                    .call(Method::GET, "/customers/search")
                    .query(ParamSet::new().forward_all(a, &["query", "limit"])))
            }),
            // -- Charges --
            Op::new("stripe_list_charges", "List charges")
                .param(limit())
                .param(starting_after())
                .param(Param::string("customer").describe("Only charges for this customer"))
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/charges").query(
                        ParamSet::new().forward_all(a, &["limit", "starting_after", "customer"]),
                    ))
                }),
            Op::new("stripe_get_charge", "Retrieve one charge")
                .param(Param::string("charge_id").required())
                .request(|cx, a| Ok(cx.get_by_id("charges", a.require_str("charge_id")?))),
            // -- Subscriptions --
            Op::new("stripe_list_subscriptions", "List subscriptions")
                .param(limit())
                .param(starting_after())
                .param(Param::string("customer"))
                .param(Param::string("status").one_of(&[
                    "active",
                    "past_due",
                    "unpaid",
                    "canceled",
                    "incomplete",
                    "incomplete_expired",
                    "trialing",
                    "paused",
                    "all",
                ]))
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/subscriptions").query(
                        ParamSet::new()
                            .forward_all(a, &["limit", "starting_after", "customer", "status"]),
                    ))
                }),
            Op::new("stripe_get_subscription", "Retrieve one subscription")
                .param(Param::string("subscription_id").required())
                .request(|cx, a| {
                    Ok(cx.get_by_id("subscriptions", a.require_str("subscription_id")?))
                }),
            // -- Payments --
            Op::new("stripe_create_payment_intent", "Create a PaymentIntent")
                .param(
                    Param::integer("amount")
                        .required()
                        .describe("Amount in the smallest currency unit (e.g. cents)"),
                )
                .param(Param::string("currency").default("usd"))
                .param(Param::string("customer"))
                .param(Param::string("description"))
                .param(Param::object("metadata").describe("String key/value pairs"))
                .request(|cx, a| {
                    Ok(cx.call(Method::POST, "/payment_intents").form(
                        ParamSet::new().forward_all(
                            a,
                            &["amount", "currency", "customer", "description", "metadata"],
                        ),
                    ))
                }),
            // -- Catalog and billing --
            Op::new("stripe_list_products", "List products")
                .param(limit())
                .param(Param::boolean("active").describe("Filter on active state"))
                .request(|cx, a| {
                    Ok(cx
                        .call(Method::GET, "/products")
                        .query(ParamSet::new().forward_all(a, &["limit", "active"])))
                }),
            Op::new("stripe_list_invoices", "List invoices")
                .param(limit())
                .param(starting_after())
                .param(Param::string("customer"))
                .param(Param::string("status").one_of(&[
                    "draft",
                    "open",
                    "paid",
                    "uncollectible",
                    "void",
                ]))
                .request(|cx, a| {
                    Ok(cx.call(Method::GET, "/invoices").query(
                        ParamSet::new()
                            .forward_all(a, &["limit", "starting_after", "customer", "status"]),
                    ))
                }),
            Op::new("stripe_get_invoice", "Retrieve one invoice")
                .param(Param::string("invoice_id").required())
                .request(|cx, a| Ok(cx.get_by_id("invoices", a.require_str("invoice_id")?))),
        ]
    }
}
