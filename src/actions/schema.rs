//! Parameter schemas for actions
//!
//! A schema is an explicit list of field descriptors. Arguments are checked
//! against it before any handler runs, and defaults are filled in.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::FieldViolation;

/// Type of a single parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// A string that must parse as an absolute URL
    Url,
    Object,
    Array,
    /// Any JSON value
    Any,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Url => value
                .as_str()
                .map(|s| url::Url::parse(s).is_ok())
                .unwrap_or(false),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Any => true,
        }
    }

    fn json_type(self) -> Option<&'static str> {
        match self {
            FieldType::String | FieldType::Url => Some("string"),
            FieldType::Integer => Some("integer"),
            FieldType::Number => Some("number"),
            FieldType::Boolean => Some("boolean"),
            FieldType::Object => Some("object"),
            FieldType::Array => Some("array"),
            FieldType::Any => None,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            FieldType::Url => "an absolute URL",
            FieldType::String => "a string",
            FieldType::Integer => "an integer",
            FieldType::Number => "a number",
            FieldType::Boolean => "a boolean",
            FieldType::Object => "an object",
            FieldType::Array => "an array",
            FieldType::Any => "any value",
        }
    }
}

/// Descriptor of one named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    /// Value used when the field is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Parameter schema of an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    fields: Vec<FieldSpec>,
}

impl ParamSchema {
    /// A schema with no parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field that must be present
    pub fn required(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: true,
            default: None,
        });
        self
    }

    /// Add a field that may be omitted
    pub fn optional(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
            default: None,
        });
        self
    }

    /// Add a field that falls back to `default` when omitted
    pub fn with_default(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        self.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
            default: Some(default),
        });
        self
    }

    // Later declarations of the same name replace earlier ones.
    fn push(&mut self, field: FieldSpec) {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
    }

    /// Field descriptors in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check raw arguments and fill defaults.
    ///
    /// `null` is accepted as "no arguments". Every offending field is
    /// reported, not only the first.
    pub fn validate(&self, raw: &Value) -> std::result::Result<ValidatedArgs, Vec<FieldViolation>> {
        let empty = Map::new();
        let args = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(vec![FieldViolation::new(
                    "",
                    format!("arguments must be an object, got {}", json_kind(other)),
                )])
            }
        };

        let mut violations = Vec::new();
        let mut validated = Map::new();

        for name in args.keys() {
            if !self.fields.iter().any(|f| &f.name == name) {
                violations.push(FieldViolation::new(name, "unexpected field"));
            }
        }

        for field in &self.fields {
            match args.get(&field.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &field.default {
                        validated.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        violations.push(FieldViolation::new(&field.name, "missing required field"));
                    }
                }
                Some(value) if field.field_type.matches(value) => {
                    validated.insert(field.name.clone(), value.clone());
                }
                Some(value) => {
                    violations.push(FieldViolation::new(
                        &field.name,
                        format!(
                            "expected {}, got {}",
                            field.field_type.expected(),
                            json_kind(value)
                        ),
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(ValidatedArgs(validated))
        } else {
            Err(violations)
        }
    }

    /// Render as a JSON Schema object for function-calling models
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = Map::new();
            if let Some(ty) = field.field_type.json_type() {
                prop.insert("type".into(), Value::from(ty));
            }
            if field.field_type == FieldType::Url {
                prop.insert("format".into(), Value::from("uri"));
            }
            prop.insert("description".into(), Value::from(field.description.clone()));
            if let Some(default) = &field.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(prop));

            if field.required {
                required.push(Value::from(field.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Arguments that passed schema validation, with defaults applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    /// Get a string argument by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Get a boolean argument by key
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    /// Get an integer argument by key
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(|v| v.as_i64())
    }

    /// Get the raw JSON value of an argument
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserialize all arguments into a typed parameter struct
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// The validated arguments as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
