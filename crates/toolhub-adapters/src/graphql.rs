//! GraphQL query-string assembly.
//!
//! Queries are built by interpolation, so every caller-supplied value goes
//! through [`literal`] first.  Filter fragments are included only for the
//! filters that were supplied.

use serde_json::{Value, json};

use crate::payload::ParamSet;

/// Render a JSON value as a GraphQL input literal.
///
/// Strings are escaped with JSON rules, which GraphQL string literals share.
/// Object keys are emitted bare.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", literal(v)))
                .collect();
            format!("{{ {} }}", inner.join(", "))
        }
    }
}

/// A quoted, escaped GraphQL string.
pub fn string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// `{ key: value, ... }` from the present entries of `set`, in order.
pub fn input_object(set: &ParamSet) -> String {
    let inner: Vec<String> = set
        .present()
        .map(|(k, v)| format!("{k}: {}", literal(v)))
        .collect();
    format!("{{ {} }}", inner.join(", "))
}

/// Conditionally assembled `filter: { ... }` argument.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field: { attr: { eq: "value" } }` when `value` is supplied.
    pub fn eq(mut self, field: &str, attr: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.clauses
                .push(format!("{field}: {{ {attr}: {{ eq: {} }} }}", string(v)));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `filter: { a, b }`, or `None` when no clause was added.
    pub fn render(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(format!("filter: {{ {} }}", self.clauses.join(", ")))
        }
    }
}

/// `(a, b)` from the supplied argument fragments, or an empty string.
pub fn arguments<I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(", "))
    }
}

/// The POST body for a query.
pub fn body(query: &str) -> Value {
    json!({ "query": query, "variables": {} })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_escaped() {
        assert_eq!(string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(string("a\nb"), r#""a\nb""#);
    }

    #[test]
    fn filter_includes_only_supplied_clauses() {
        let f = Filter::new()
            .eq("team", "id", Some("T1"))
            .eq("project", "id", None)
            .eq("state", "name", Some("In Progress"));
        assert_eq!(
            f.render().unwrap(),
            r#"filter: { team: { id: { eq: "T1" } }, state: { name: { eq: "In Progress" } } }"#
        );
        assert!(Filter::new().eq("team", "id", None).render().is_none());
    }

    #[test]
    fn arguments_skip_missing_parts() {
        assert_eq!(
            arguments([Some("first: 50".to_string()), None]),
            "(first: 50)"
        );
        assert_eq!(arguments([None::<String>]), "");
    }

    #[test]
    fn input_object_renders_present_entries() {
        let set = ParamSet::new()
            .set("teamId", "T1")
            .set("title", "Fix \"bug\"")
            .set("priority", 0)
            .maybe::<String>("description", None)
            .set("labelIds", json!(["L1", "L2"]));
        assert_eq!(
            input_object(&set),
            r#"{ teamId: "T1", title: "Fix \"bug\"", priority: 0, labelIds: ["L1", "L2"] }"#
        );
    }
}
