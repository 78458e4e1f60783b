//! Request descriptors.
//!
//! A [`RequestDescriptor`] is the fully assembled method, URL, headers,
//! authentication, query and body for one call.  Builders produce one per
//! invocation; the transport consumes it.  Nothing here touches the network,
//! so descriptors can be inspected directly in tests.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::credentials::Credential;
use crate::payload::ParamSet;

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Per-call time budget, chosen by operation cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Metadata lookups and simple reads (30s).
    Metadata,
    /// Ordinary API calls (60s).
    Standard,
    /// Rendering, conversion and inference calls (120s).
    Long,
    /// OCR and large document analysis (180s).
    Heavy,
    /// Long-running generation (300s).
    Generation,
}

impl TimeoutClass {
    pub fn seconds(self) -> u64 {
        match self {
            Self::Metadata => 30,
            Self::Standard => 60,
            Self::Long => 120,
            Self::Heavy => 180,
            Self::Generation => 300,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(self.seconds())
    }
}

// ---------------------------------------------------------------------------
// Descriptor parts
// ---------------------------------------------------------------------------

/// How the request authenticates.
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    None,
    Bearer(Credential),
    Basic {
        username: String,
        password: Option<Credential>,
    },
}

/// One request header.  Sensitive values are redacted in `Debug`.
#[derive(Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub value: String,
    pub sensitive: bool,
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.sensitive { "****" } else { &self.value };
        write!(f, "{}: {}", self.name, value)
    }
}

/// A field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    Bytes { content_type: String, data: Vec<u8> },
    Multipart(Vec<MultipartField>),
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Everything needed to perform one HTTP round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Vec<Header>,
    pub auth: Auth,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub timeout: TimeoutClass,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            auth: Auth::None,
            query: Vec::new(),
            body: Body::Empty,
            timeout: TimeoutClass::Metadata,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn bearer(mut self, token: &Credential) -> Self {
        self.auth = Auth::Bearer(token.clone());
        self
    }

    pub fn basic(mut self, username: &str, password: Option<&Credential>) -> Self {
        self.auth = Auth::Basic {
            username: username.to_string(),
            password: password.cloned(),
        };
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.to_string(),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    /// A header carrying a secret (API key headers).
    pub fn secret_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.to_string(),
            value: value.into(),
            sensitive: true,
        });
        self
    }

    /// Append the present entries of `params` to the query string.
    pub fn query(mut self, params: ParamSet) -> Self {
        self.query.extend(params.to_query());
        self
    }

    pub fn query_pair(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    /// JSON body built from the present entries of `params`.
    pub fn json_params(self, params: ParamSet) -> Self {
        self.json(params.to_json())
    }

    pub fn form(mut self, params: ParamSet) -> Self {
        self.body = Body::Form(params.to_form());
        self
    }

    pub fn bytes(mut self, content_type: &str, data: Vec<u8>) -> Self {
        self.body = Body::Bytes {
            content_type: content_type.to_string(),
            data,
        };
        self
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = Body::Multipart(fields);
        self
    }

    pub fn timeout(mut self, class: TimeoutClass) -> Self {
        self.timeout = class;
        self
    }

    // -- Inspection --

    /// First header value with the given name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// First query value with the given name.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The JSON body, if there is one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The form body, if there is one.
    pub fn form_body(&self) -> Option<&[(String, String)]> {
        match &self.body {
            Body::Form(pairs) => Some(pairs),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Percent-encode a caller-supplied identifier for use as one path segment.
///
/// Only unreserved characters pass through, so `group/project` becomes
/// `group%2Fproject`.
pub fn encode_segment(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 2);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        }
    }
    encoded
}

/// Truncate a batch to the provider's ceiling.  Excess items are dropped
/// without error.
pub fn cap_batch<T>(items: &[T], limit: usize) -> &[T] {
    if items.len() > limit {
        debug!(supplied = items.len(), limit, "truncating batch to provider limit");
        &items[..limit]
    } else {
        items
    }
}

/// Strip trailing slashes from a configured base URL.
pub fn normalize_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_records_everything() {
        let key = Credential::new("secret");
        let d = RequestDescriptor::post("https://api.example.com/v1/items")
            .bearer(&key)
            .header("Accept", "application/json")
            .query(ParamSet::new().set("dry_run", true))
            .json(json!({"name": "a"}))
            .timeout(TimeoutClass::Long);
        assert_eq!(d.method, Method::POST);
        assert_eq!(d.auth, Auth::Bearer(key));
        assert_eq!(d.header_value("accept"), Some("application/json"));
        assert_eq!(d.query_value("dry_run"), Some("true"));
        assert_eq!(d.json_body(), Some(&json!({"name": "a"})));
        assert_eq!(d.timeout.seconds(), 120);
    }

    #[test]
    fn secret_headers_are_redacted_in_debug() {
        let d = RequestDescriptor::get("https://x").secret_header("x-api-key", "sk-123");
        let dbg = format!("{d:?}");
        assert!(!dbg.contains("sk-123"));
        assert!(dbg.contains("x-api-key: ****"));
        assert_eq!(d.header_value("X-API-KEY"), Some("sk-123"));
    }

    #[test]
    fn encode_segment_escapes_reserved_characters() {
        assert_eq!(encode_segment("group/project"), "group%2Fproject");
        assert_eq!(encode_segment("a b?c#d"), "a%20b%3Fc%23d");
        assert_eq!(encode_segment("simple-id_1.2~x"), "simple-id_1.2~x");
    }

    #[test]
    fn cap_batch_truncates_silently() {
        let items: Vec<u32> = (0..15).collect();
        assert_eq!(cap_batch(&items, 10).len(), 10);
        assert_eq!(cap_batch(&items[..3], 10).len(), 3);
    }

    #[test]
    fn timeout_classes_are_ordered() {
        let secs: Vec<u64> = [
            TimeoutClass::Metadata,
            TimeoutClass::Standard,
            TimeoutClass::Long,
            TimeoutClass::Heavy,
            TimeoutClass::Generation,
        ]
        .iter()
        .map(|c| c.seconds())
        .collect();
        assert_eq!(secs, vec![30, 60, 120, 180, 300]);
    }
}
