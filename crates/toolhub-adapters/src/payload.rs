//! Presence-tagged parameter sets.
//!
//! A [`ParamSet`] is an ordered list of named slots, each either
//! [`Slot::Present`] or [`Slot::Absent`].  Builders add every field they know
//! about and the serializers drop absent slots, so "not supplied" never
//! reaches the wire as `null` or `""`.

use serde_json::{Map, Value};

use crate::params::Args;

/// One named slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Present(Value),
    Absent,
}

/// Ordered mapping from parameter name to a present/absent-tagged value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    entries: Vec<(String, Slot)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value that is always sent.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, Slot::Present(value.into()));
        self
    }

    /// Add a value that is sent only when `Some`.
    pub fn maybe<T: Into<Value>>(mut self, name: &str, value: Option<T>) -> Self {
        let slot = match value {
            Some(v) => Slot::Present(v.into()),
            None => Slot::Absent,
        };
        self.push(name, slot);
        self
    }

    /// Copy `key` from the caller's arguments under the same name.
    pub fn forward(self, args: &Args, key: &str) -> Self {
        self.forward_as(args, key, key)
    }

    /// Copy `key` from the caller's arguments under a different wire name.
    pub fn forward_as(mut self, args: &Args, key: &str, name: &str) -> Self {
        let slot = match args.get(key) {
            Some(v) => Slot::Present(v.clone()),
            None => Slot::Absent,
        };
        self.push(name, slot);
        self
    }

    /// Forward several keys unchanged.
    pub fn forward_all(self, args: &Args, keys: &[&str]) -> Self {
        keys.iter().fold(self, |set, key| set.forward(args, key))
    }

    /// Replace a slot, or append it if the name is new.
    fn push(&mut self, name: &str, slot: Slot) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = slot,
            None => self.entries.push((name.to_string(), slot)),
        }
    }

    /// Present entries in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().filter_map(|(n, s)| match s {
            Slot::Present(v) => Some((n.as_str(), v)),
            Slot::Absent => None,
        })
    }

    /// Names that will be sent.
    pub fn sent_keys(&self) -> Vec<&str> {
        self.present().map(|(n, _)| n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }

    /// Look up a present value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.present().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Merge another set after this one.
    pub fn extend(mut self, other: ParamSet) -> Self {
        for (name, slot) in other.entries {
            self.push(&name, slot);
        }
        self
    }

    // -- Serializers --

    /// JSON object with native types.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .present()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect();
        Value::Object(map)
    }

    /// URL query pairs.
    ///
    /// Booleans render as `"true"`/`"false"`, arrays repeat the key and
    /// objects flatten to `name[key]`.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, value) in self.present() {
            flatten(name, value, &mut out);
        }
        out
    }

    /// `application/x-www-form-urlencoded` pairs.  Same rules as
    /// [`ParamSet::to_query`].
    pub fn to_form(&self) -> Vec<(String, String)> {
        self.to_query()
    }
}

/// Render a scalar for a query string or form body.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn flatten(name: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                out.push((name.to_string(), scalar_text(item)));
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&format!("{name}[{k}]"), v, out);
            }
        }
        scalar => out.push((name.to_string(), scalar_text(scalar))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(v: &[(&str, &str)]) -> Vec<(String, String)> {
        v.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    // -- Presence --

    #[test]
    fn absent_slots_are_never_serialized() {
        let set = ParamSet::new()
            .set("q", "rust")
            .maybe::<String>("lang", None)
            .maybe("page", Some(2));
        assert_eq!(set.sent_keys(), vec!["q", "page"]);
        assert_eq!(set.to_json(), json!({"q": "rust", "page": 2}));
        assert_eq!(set.to_query(), pairs(&[("q", "rust"), ("page", "2")]));
    }

    #[test]
    fn forward_copies_only_supplied_keys() {
        let args = Args::from_value("t", json!({"a": 0, "b": null, "c": ""})).unwrap();
        let set = ParamSet::new().forward_all(&args, &["a", "b", "c", "d"]);
        assert_eq!(set.sent_keys(), vec!["a", "c"]);
        assert_eq!(set.to_json(), json!({"a": 0, "c": ""}));
    }

    #[test]
    fn later_slot_replaces_earlier() {
        let set = ParamSet::new().set("limit", 10).maybe::<i64>("limit", None);
        assert!(set.is_empty());
    }

    // -- Encoding --

    #[test]
    fn query_booleans_are_lowercase_literals() {
        let set = ParamSet::new().set("archived", false).set("subtasks", true);
        assert_eq!(
            set.to_query(),
            pairs(&[("archived", "false"), ("subtasks", "true")])
        );
        assert_eq!(set.to_json(), json!({"archived": false, "subtasks": true}));
    }

    #[test]
    fn arrays_repeat_the_key() {
        let set = ParamSet::new().set("fields[]", json!(["Name", "Status"]));
        assert_eq!(
            set.to_query(),
            pairs(&[("fields[]", "Name"), ("fields[]", "Status")])
        );
    }

    #[test]
    fn objects_flatten_with_brackets() {
        let set = ParamSet::new().set("metadata", json!({"order": "42"}));
        assert_eq!(set.to_form(), pairs(&[("metadata[order]", "42")]));
    }
}
