//! Tool parameter schemas and caller arguments.
//!
//! [`Param`] declares one parameter (type, optionality, default) and renders
//! to JSON Schema for discovery.  [`Args`] is the caller's parameter object
//! after it has been checked against those declarations: required keys are
//! present, types match, and declared defaults are filled in.
//!
//! A key counts as *present* when the caller supplied it with a non-null
//! value.  `""`, `0` and `false` are present.

use serde_json::{Map, Value, json};

use crate::error::{AdapterError, Result};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Accepts any JSON value (e.g. "string or list of strings").
    Any,
}

impl ParamKind {
    fn schema_type(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Any => None,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub items: Option<ParamKind>,
    pub choices: Vec<&'static str>,
}

impl Param {
    fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            required: false,
            default: None,
            items: None,
            choices: Vec::new(),
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn object(name: &'static str) -> Self {
        Self::new(name, ParamKind::Object)
    }

    pub fn any(name: &'static str) -> Self {
        Self::new(name, ParamKind::Any)
    }

    /// An array whose elements are of `items` type.
    pub fn array(name: &'static str, items: ParamKind) -> Self {
        let mut p = Self::new(name, ParamKind::Array);
        p.items = Some(items);
        p
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Value used when the caller omits the parameter.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn one_of(mut self, choices: &[&'static str]) -> Self {
        self.choices = choices.to_vec();
        self
    }

    fn schema(&self) -> Value {
        let mut s = Map::new();
        if let Some(t) = self.kind.schema_type() {
            s.insert("type".into(), json!(t));
        }
        if !self.description.is_empty() {
            s.insert("description".into(), json!(self.description));
        }
        if let Some(items) = self.items.and_then(ParamKind::schema_type) {
            s.insert("items".into(), json!({ "type": items }));
        }
        if let Some(d) = &self.default {
            s.insert("default".into(), d.clone());
        }
        if !self.choices.is_empty() {
            s.insert("enum".into(), json!(self.choices));
        }
        Value::Object(s)
    }
}

/// Render a parameter list as a JSON Schema object.
pub fn schema(params: &[Param]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.to_string(), p.schema()))
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name)
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

// ---------------------------------------------------------------------------
// Caller arguments
// ---------------------------------------------------------------------------

/// Validated caller arguments for one tool invocation.
#[derive(Debug, Clone)]
pub struct Args {
    tool: String,
    map: Map<String, Value>,
}

impl Args {
    /// Check `params` against `declared` and fill in defaults.
    ///
    /// Keys the declaration does not mention are kept as-is so providers can
    /// accept pass-through fields.
    pub fn parse(tool: &str, params: Value, declared: &[Param]) -> Result<Self> {
        let mut map = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(AdapterError::invalid(
                    tool,
                    format!("parameters must be a JSON object, got {}", type_name(&other)),
                ));
            }
        };

        for p in declared {
            let supplied = map.get(p.name).filter(|v| !v.is_null());
            match supplied {
                Some(v) => {
                    if !p.kind.accepts(v) {
                        return Err(AdapterError::invalid(
                            tool,
                            format!(
                                "`{}` must be {}, got {}",
                                p.name,
                                p.kind.schema_type().unwrap_or("any"),
                                type_name(v)
                            ),
                        ));
                    }
                    if let (Some(items), Some(arr)) = (p.items, v.as_array()) {
                        if let Some(bad) = arr.iter().find(|e| !items.accepts(e)) {
                            return Err(AdapterError::invalid(
                                tool,
                                format!("`{}` contains a {} element", p.name, type_name(bad)),
                            ));
                        }
                    }
                    if !p.choices.is_empty() {
                        let s = v.as_str().unwrap_or_default();
                        if !p.choices.contains(&s) {
                            return Err(AdapterError::invalid(
                                tool,
                                format!("`{}` must be one of {}", p.name, p.choices.join(", ")),
                            ));
                        }
                    }
                }
                None if p.required => {
                    return Err(AdapterError::invalid(
                        tool,
                        format!("missing required parameter `{}`", p.name),
                    ));
                }
                None => {
                    if let Some(d) = &p.default {
                        map.insert(p.name.to_string(), d.clone());
                    }
                }
            }
        }

        Ok(Self {
            tool: tool.to_string(),
            map,
        })
    }

    /// Arguments with no declarations, for tests and internal callers.
    pub fn from_value(tool: &str, params: Value) -> Result<Self> {
        Self::parse(tool, params, &[])
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// A validation error attributed to this tool.
    pub fn invalid(&self, reason: impl Into<String>) -> AdapterError {
        AdapterError::invalid(&self.tool, reason)
    }

    /// The value of `key` if present and non-null.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| self.invalid(format!("missing required parameter `{key}`")))
    }

    pub fn str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.wrong_type(key, "a string", other)),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str(key)?
            .ok_or_else(|| self.invalid(format!("missing required parameter `{key}`")))
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        Ok(self.str(key)?.unwrap_or(default))
    }

    pub fn i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "an integer", v)),
        }
    }

    pub fn require_i64(&self, key: &str) -> Result<i64> {
        self.i64(key)?
            .ok_or_else(|| self.invalid(format!("missing required parameter `{key}`")))
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.i64(key)?.unwrap_or(default))
    }

    pub fn f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "a number", v)),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(key, "a boolean", other)),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.bool(key)?.unwrap_or(default))
    }

    pub fn array(&self, key: &str) -> Result<Option<&Vec<Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(a)) => Ok(Some(a)),
            Some(other) => Err(self.wrong_type(key, "an array", other)),
        }
    }

    pub fn require_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.array(key)?
            .ok_or_else(|| self.invalid(format!("missing required parameter `{key}`")))
    }

    /// A list of strings.  A bare string is treated as a one-element list.
    pub fn str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.wrong_type(key, "a list of strings", v))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.wrong_type(key, "a list of strings", other)),
        }
    }

    pub fn object(&self, key: &str) -> Result<Option<&Map<String, Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(m)) => Ok(Some(m)),
            Some(other) => Err(self.wrong_type(key, "an object", other)),
        }
    }

    /// An identifier that may be supplied as a string or an integer,
    /// rendered as a string for path insertion.
    pub fn require_id(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(self.wrong_type(key, "a non-empty string or integer", other)),
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, got: &Value) -> AdapterError {
        self.invalid(format!("`{key}` must be {expected}, got {}", type_name(got)))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> Vec<Param> {
        vec![
            Param::string("id").required(),
            Param::integer("limit").default(10),
            Param::boolean("archived"),
            Param::array("tags", ParamKind::String),
            Param::string("order").one_of(&["asc", "desc"]),
        ]
    }

    // -- Schema --

    #[test]
    fn schema_lists_required_and_defaults() {
        let s = schema(&declared());
        assert_eq!(s["type"], "object");
        assert_eq!(s["required"], json!(["id"]));
        assert_eq!(s["properties"]["limit"]["default"], 10);
        assert_eq!(s["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(s["properties"]["order"]["enum"], json!(["asc", "desc"]));
    }

    // -- Parsing --

    #[test]
    fn missing_required_is_rejected() {
        let err = Args::parse("t", json!({}), &declared()).unwrap_err();
        assert!(err.to_string().contains("`id`"));
    }

    #[test]
    fn defaults_are_filled_in() {
        let a = Args::parse("t", json!({"id": "x"}), &declared()).unwrap();
        assert_eq!(a.i64("limit").unwrap(), Some(10));
        assert!(!a.has("archived"));
    }

    #[test]
    fn null_counts_as_absent() {
        let a = Args::parse("t", json!({"id": "x", "archived": null}), &declared()).unwrap();
        assert!(!a.has("archived"));
        assert_eq!(a.bool("archived").unwrap(), None);
    }

    #[test]
    fn falsy_values_are_present() {
        let a = Args::parse(
            "t",
            json!({"id": "", "limit": 0, "archived": false}),
            &declared(),
        )
        .unwrap();
        assert_eq!(a.str("id").unwrap(), Some(""));
        assert_eq!(a.i64("limit").unwrap(), Some(0));
        assert_eq!(a.bool("archived").unwrap(), Some(false));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = Args::parse("t", json!({"id": 5}), &declared()).unwrap_err();
        assert!(err.to_string().contains("must be string"));
        let err = Args::parse("t", json!({"id": "x", "tags": [1]}), &declared()).unwrap_err();
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn choices_are_enforced() {
        let err = Args::parse("t", json!({"id": "x", "order": "up"}), &declared()).unwrap_err();
        assert!(err.to_string().contains("asc, desc"));
    }

    #[test]
    fn non_object_params_are_rejected() {
        assert!(Args::parse("t", json!([1, 2]), &[]).is_err());
        assert!(Args::parse("t", Value::Null, &[]).is_ok());
    }

    // -- Accessors --

    #[test]
    fn str_list_accepts_single_string() {
        let a = Args::from_value("t", json!({"a": "one", "b": ["x", "y"]})).unwrap();
        assert_eq!(a.str_list("a").unwrap(), Some(vec!["one".to_string()]));
        assert_eq!(a.str_list("b").unwrap().unwrap().len(), 2);
    }

    #[test]
    fn require_id_accepts_numbers() {
        let a = Args::from_value("t", json!({"movie_id": 550, "gid": "123"})).unwrap();
        assert_eq!(a.require_id("movie_id").unwrap(), "550");
        assert_eq!(a.require_id("gid").unwrap(), "123");
        assert!(a.require_id("missing").is_err());
    }
}
