//! HTTP transport.
//!
//! [`HttpTransport::send`] performs exactly one round trip for a
//! [`RequestDescriptor`].  There is no retry.  A response outside 2xx
//! becomes [`AdapterError::Upstream`] with the status and raw body; an
//! expired time budget becomes [`AdapterError::Timeout`].

use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};
use crate::request::{Auth, Body, MultipartField, RequestDescriptor};

/// User-Agent sent on every request.
const USER_AGENT: &str = concat!("toolhub/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Raw status, headers and body of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseEnvelope {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// A 200 response with a JSON body.
    pub fn from_json(value: &Value) -> Self {
        Self::new(200, "application/json", value.to_string())
    }

    /// Header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Decode the body as JSON.  An empty body decodes to `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            AdapterError::Internal(format!("response body is not valid JSON: {e}"))
        })
    }

    /// The body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A cheap-to-clone HTTP client shared by all adapters.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    /// Upper bound applied on top of each request's timeout class.
    timeout_cap: Option<Duration>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout_cap: None,
        }
    }

    /// Use a preconfigured client (proxies, custom roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout_cap: None,
        }
    }

    /// Never wait longer than `cap`, whatever the request's timeout class.
    pub fn with_timeout_cap(mut self, cap: Duration) -> Self {
        self.timeout_cap = Some(cap);
        self
    }

    fn effective_timeout(&self, class: Duration) -> Duration {
        match self.timeout_cap {
            Some(cap) => class.min(cap),
            None => class,
        }
    }

    /// Perform one round trip.
    pub async fn send(&self, tool: &str, desc: RequestDescriptor) -> Result<ResponseEnvelope> {
        let timeout = self.effective_timeout(desc.timeout.duration());
        let seconds = timeout.as_secs();
        let started = Instant::now();
        debug!(
            tool,
            method = %desc.method,
            url = %desc.url,
            timeout_secs = seconds,
            "sending request"
        );

        let mut req = self
            .client
            .request(desc.method.clone(), &desc.url)
            .timeout(timeout);

        for h in &desc.headers {
            req = req.header(h.name.as_str(), h.value.as_str());
        }

        req = match &desc.auth {
            Auth::None => req,
            Auth::Bearer(token) => req.bearer_auth(token.expose()),
            Auth::Basic { username, password } => {
                req.basic_auth(username, password.as_ref().map(|p| p.expose()))
            }
        };

        if !desc.query.is_empty() {
            req = req.query(&desc.query);
        }

        req = match desc.body {
            Body::Empty => req,
            Body::Json(value) => req.json(&value),
            Body::Form(pairs) => req.form(&pairs),
            Body::Bytes { content_type, data } => req.header(CONTENT_TYPE, content_type).body(data),
            Body::Multipart(fields) => {
                let form = multipart_form(fields).map_err(|e| classify(tool, seconds, e))?;
                req.multipart(form)
            }
        };

        let response = req.send().await.map_err(|e| classify(tool, seconds, e))?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(tool, seconds, e))?
            .to_vec();

        debug!(
            tool,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response received"
        );

        if !status.is_success() {
            warn!(tool, status = status.as_u16(), "upstream returned an error status");
            return Err(AdapterError::Upstream {
                tool_name: tool.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ResponseEnvelope {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn multipart_form(fields: Vec<MultipartField>) -> std::result::Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name, value),
            MultipartField::File {
                name,
                filename,
                content_type,
                data,
            } => {
                let part = Part::bytes(data).file_name(filename).mime_str(&content_type)?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

/// Map a reqwest failure onto the adapter taxonomy.
///
/// The URL is stripped first: some providers carry their key in the query.
fn classify(tool: &str, seconds: u64, e: reqwest::Error) -> AdapterError {
    let e = e.without_url();
    if e.is_timeout() {
        AdapterError::Timeout {
            seconds,
            reason: format!("request for tool `{tool}` did not complete"),
        }
    } else if e.is_builder() {
        AdapterError::invalid(tool, format!("could not build request: {e}"))
    } else {
        AdapterError::Network {
            tool_name: tool.to_string(),
            reason: e.to_string(),
        }
    }
}
