//! Integration tests for toolhub-adapters.
//!
//! Every test points a provider at a local `wiremock` server through
//! `ProviderSettings::with_base_url` and checks what actually went over
//! the wire and what came back.

use std::time::Duration;

use serde_json::{Value, json};
use toolhub_adapters::{
    Adapter, ErrorKind, HttpTransport, MapEnv, Provider, ProviderSettings, Registry,
    ServiceAdapter, ToolhubConfig,
};
use toolhub_adapters::providers::{
    AbstractApi, Airtable, Claude, Gemini, Linear, Mailchimp, OpenAi, Stripe,
};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn adapter<P: Provider>(server: &MockServer, vars: &[(&str, &str)]) -> ServiceAdapter<P> {
    let env = vars
        .iter()
        .fold(MapEnv::new(), |env, (k, v)| env.with(k, v));
    ServiceAdapter::from_env(
        &env,
        &ProviderSettings::with_base_url(&server.uri()),
        HttpTransport::new(),
    )
    .unwrap()
}

async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

fn query_keys(req: &Request) -> Vec<String> {
    req.url.query_pairs().map(|(k, _)| k.into_owned()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
//  Request building
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn omitted_parameters_never_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(header("authorization", "Bearer sk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let stripe = adapter::<Stripe>(&server, &[("STRIPE_API_KEY", "sk_test")]);
    stripe
        .execute_tool("stripe_list_customers", json!({"email": null}))
        .await
        .unwrap();

    let reqs = received(&server).await;
    assert_eq!(query_keys(&reqs[0]), vec!["limit".to_string()]);
}

#[tokio::test]
async fn bulk_create_sends_at_most_ten_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/appX/Tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;

    let records: Vec<Value> = (0..12).map(|i| json!({"Name": format!("r{i}")})).collect();
    let airtable = adapter::<Airtable>(&server, &[("AIRTABLE_ACCESS_TOKEN", "pat")]);
    airtable
        .execute_tool(
            "airtable_bulk_create_records",
            json!({"base_id": "appX", "table_id_or_name": "Tasks", "records": records}),
        )
        .await
        .unwrap();

    let body: Value = received(&server).await[0].body_json().unwrap();
    let sent = body["records"].as_array().unwrap();
    assert_eq!(sent.len(), 10);
    assert_eq!(sent[0], json!({"fields": {"Name": "r0"}}));
    assert_eq!(sent[9]["fields"]["Name"], "r9");
}

#[tokio::test]
async fn update_mode_selects_patch_or_put() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/appX/Tasks/rec1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/appX/Tasks/rec1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec1"})))
        .expect(1)
        .mount(&server)
        .await;

    let airtable = adapter::<Airtable>(&server, &[("AIRTABLE_ACCESS_TOKEN", "pat")]);
    for replace_all in [false, true] {
        airtable
            .execute_tool(
                "airtable_update_record",
                json!({
                    "base_id": "appX",
                    "table_id_or_name": "Tasks",
                    "record_id": "rec1",
                    "fields": {"Status": "Done"},
                    "replace_all": replace_all,
                }),
            )
            .await
            .unwrap();
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Lazy credentials
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn mailchimp_host_is_derived_from_the_key() {
    let env = MapEnv::new().with("MAILCHIMP_API_KEY", "abc123-us5");
    let mc = ServiceAdapter::<Mailchimp>::from_env(
        &env,
        &ProviderSettings::default(),
        HttpTransport::new(),
    )
    .unwrap();
    assert!(mc.provider().base_url().unwrap().contains("us5"));
}

#[tokio::test]
async fn mailchimp_key_without_data_center_fails_before_any_request() {
    let server = MockServer::start().await;
    let mc = adapter::<Mailchimp>(&server, &[("MAILCHIMP_API_KEY", "abc123")]);

    let err = mc
        .execute_tool("mailchimp_list_audiences", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(received(&server).await.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
//  Response shaping
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn currency_conversion_attaches_converted_amount() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exchange-rates/live/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "exchange_rates": {"EUR": 0.9}
        })))
        .mount(&server)
        .await;

    let abs = adapter::<AbstractApi>(&server, &[("ABSTRACT_API_KEY", "ab")]);
    let out = abs
        .execute_tool(
            "abstract_convert_currency",
            json!({"base": "USD", "target": "EUR", "amount": 100}),
        )
        .await
        .unwrap();
    assert_eq!(out["converted_amount"], json!(90.0));
    assert_eq!(out["amount"], json!(100));

    let reqs = received(&server).await;
    let key = reqs[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "api_key")
        .map(|(_, v)| v.into_owned());
    assert_eq!(key.as_deref(), Some("ab"));
}

#[tokio::test]
async fn chat_joins_text_blocks_and_skips_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "A"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "B"}
            ]
        })))
        .mount(&server)
        .await;

    let claude = adapter::<Claude>(&server, &[("ANTHROPIC_API_KEY", "sk-ant")]);
    let out = claude
        .execute_tool("claude_chat", json!({"prompt": "hi"}))
        .await
        .unwrap();
    assert_eq!(out, json!("A\nB"));
}

#[tokio::test]
async fn binary_responses_are_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "audio/mpeg"))
        .mount(&server)
        .await;

    let openai = adapter::<OpenAi>(&server, &[("OPENAI_API_KEY", "sk")]);
    let out = openai
        .execute_tool("openai_text_to_speech", json!({"text": "hello"}))
        .await
        .unwrap();
    assert_eq!(out["audio"], "AQID");
    assert_eq!(out["content_type"], "audio/mpeg");
}

// ═══════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn upstream_errors_keep_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/cus_missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"message": "No such customer"}})),
        )
        .mount(&server)
        .await;

    let stripe = adapter::<Stripe>(&server, &[("STRIPE_API_KEY", "sk_test")]);
    let err = stripe
        .execute_tool("stripe_get_customer", json!({"customer_id": "cus_missing"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("No such customer"));
}

#[tokio::test]
async fn graphql_errors_without_data_are_upstream_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errors": [{"message": "bad id"}]})),
        )
        .mount(&server)
        .await;

    let linear = adapter::<Linear>(&server, &[("LINEAR_API_KEY", "lin")]);
    let err = linear
        .execute_tool("linear_get_issue", json!({"issue_id": "X-1"}))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(200));
    assert!(err.to_string().contains("bad id"));
}

#[tokio::test]
async fn validation_errors_send_nothing() {
    let server = MockServer::start().await;
    let stripe = adapter::<Stripe>(&server, &[("STRIPE_API_KEY", "sk_test")]);
    let err = stripe
        .execute_tool("stripe_get_customer", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(received(&server).await.is_empty());
}

#[tokio::test]
async fn slow_upstream_is_a_timeout_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"models": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let gemini = ServiceAdapter::<Gemini>::from_env(
        &MapEnv::new().with("GEMINI_API_KEY", "g"),
        &ProviderSettings::with_base_url(&server.uri()),
        HttpTransport::new().with_timeout_cap(Duration::from_millis(200)),
    )
    .unwrap();

    let err = gemini
        .execute_tool("gemini_list_models", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.status(), None);
    assert_eq!(err.to_json()["kind"], "timeout");
}

#[tokio::test]
async fn network_errors_keep_query_keys_out_of_messages() {
    let gemini = ServiceAdapter::<Gemini>::from_env(
        &MapEnv::new().with("GEMINI_API_KEY", "SUPERSECRETKEY"),
        &ProviderSettings::with_base_url("http://127.0.0.1:1"),
        HttpTransport::new(),
    )
    .unwrap();

    let err = gemini
        .execute_tool("gemini_list_models", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!err.to_string().contains("SUPERSECRETKEY"));
    assert!(!err.to_json().to_string().contains("SUPERSECRETKEY"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Determinism
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn repeated_calls_shape_identically() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "cus_1", "balance": 0, "delinquent": false}],
            "has_more": false
        })))
        .expect(2)
        .mount(&server)
        .await;

    let stripe = adapter::<Stripe>(&server, &[("STRIPE_API_KEY", "sk_test")]);
    let params = json!({"limit": 1});
    let first = stripe
        .execute_tool("stripe_list_customers", params.clone())
        .await
        .unwrap();
    let second = stripe
        .execute_tool("stripe_list_customers", params)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Fan-out
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn one_failed_slot_does_not_spoil_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":generateContent$"))
        .and(body_string_contains("boom"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":generateContent$"))
        .and(body_string_contains("fine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        })))
        .mount(&server)
        .await;

    let gemini = adapter::<Gemini>(&server, &[("GEMINI_API_KEY", "g")]);
    let out = gemini
        .execute_tool(
            "gemini_batch_generate",
            json!({"prompts": ["fine", "boom", "fine again"]}),
        )
        .await
        .unwrap();

    let results = out["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["key"], "0");
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[1]["error"]["status"], 500);
    assert_eq!(results[2]["ok"], true);
    assert_eq!(
        results[2]["value"]["candidates"][0]["content"]["parts"][0]["text"],
        "ok"
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn registry_routes_calls_through_configured_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/charges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "ch_1"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ToolhubConfig::parse(&format!(
        "[providers.stripe]\nbase_url = \"{}\"\n",
        server.uri()
    ))
    .unwrap();
    let env = MapEnv::new().with("STRIPE_API_KEY", "sk_test");
    let registry = Registry::from_env(&env, &config, HttpTransport::new());

    let out = registry
        .call("stripe_list_charges", json!({"limit": 1}))
        .await
        .unwrap();
    assert_eq!(out["data"][0]["id"], "ch_1");
}
