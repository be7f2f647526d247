//! Tool declarations and argument coercion
//!
//! Declares callable tools with typed, described parameters and renders the
//! JSON schema structured tool calling consumes. Arguments coming back from
//! the model are coerced against the declared types before dispatch.

use crate::{NatterError, Result};
use serde_json::{json, Map, Value};

/// Semantic type of a tool parameter
#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    /// Free-form string
    String,

    /// Boolean flag
    Bool,

    /// Whole number
    Integer,

    /// Floating-point number
    Number,

    /// Closed set of accepted string values, compared case-insensitively;
    /// coercion canonicalizes to the declared spelling
    Enum(Vec<String>),
}

impl ParamType {
    /// Render this type as a JSON-schema fragment
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Bool => json!({ "type": "boolean" }),
            ParamType::Integer => json!({ "type": "integer" }),
            ParamType::Number => json!({ "type": "number" }),
            ParamType::Enum(values) => json!({ "type": "string", "enum": values }),
        }
    }

    /// Coerce a raw argument value to this type, or explain why it cannot be
    fn coerce(&self, value: &Value) -> std::result::Result<Value, String> {
        match self {
            ParamType::String => match value.as_str() {
                Some(s) => Ok(Value::String(s.to_string())),
                None => Err("expected a string".to_string()),
            },
            ParamType::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                other => Err(format!("expected a boolean, got `{}`", other)),
            },
            ParamType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|n| json!(n))
                    .map_err(|_| format!("expected an integer, got `{}`", s)),
                other => Err(format!("expected an integer, got `{}`", other)),
            },
            ParamType::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|n| json!(n))
                    .map_err(|_| format!("expected a number, got `{}`", s)),
                other => Err(format!("expected a number, got `{}`", other)),
            },
            ParamType::Enum(values) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected one of {:?}, got `{}`", values, value))?;
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(s))
                    .map(|v| Value::String(v.clone()))
                    .ok_or_else(|| format!("`{}` is not one of {:?}", s, values))
            }
        }
    }
}

/// One declared tool parameter
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Semantic type
    pub kind: ParamType,

    /// Human-readable description shown to the model
    pub description: String,
}

/// Declaration of a callable tool
#[derive(Clone, Debug)]
pub struct ToolDecl {
    /// Tool name the model calls it by
    pub name: String,

    /// Human-readable description shown to the model
    pub description: String,

    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
}

impl ToolDecl {
    /// Start a declaration
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
        });
        self
    }

    /// Render the schema entry structured calling consumes
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut prop = param.kind.json_schema();
            if let Some(obj) = prop.as_object_mut() {
                obj.insert(
                    "description".to_string(),
                    Value::String(param.description.clone()),
                );
            }
            properties.insert(param.name.clone(), prop);
            required.push(Value::String(param.name.clone()));
        }

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }

    /// Validate and coerce raw model-supplied arguments against this
    /// declaration. Extra keys the declaration does not know are dropped.
    pub fn coerce_args(&self, arguments: &Value) -> Result<ToolArgs> {
        let raw = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null if self.params.is_empty() => Map::new(),
            other => {
                return Err(NatterError::InvalidArgument {
                    tool: self.name.clone(),
                    argument: "<arguments>".to_string(),
                    reason: format!("expected an object, got `{}`", other),
                })
            }
        };

        let mut values = Map::new();
        for param in &self.params {
            let value = raw
                .get(&param.name)
                .ok_or_else(|| NatterError::InvalidArgument {
                    tool: self.name.clone(),
                    argument: param.name.clone(),
                    reason: "missing".to_string(),
                })?;
            let coerced =
                param
                    .kind
                    .coerce(value)
                    .map_err(|reason| NatterError::InvalidArgument {
                        tool: self.name.clone(),
                        argument: param.name.clone(),
                        reason,
                    })?;
            values.insert(param.name.clone(), coerced);
        }

        Ok(ToolArgs {
            tool: self.name.clone(),
            values,
        })
    }
}

/// Validated, coerced arguments for one tool invocation
#[derive(Clone, Debug)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Name of the tool these arguments belong to
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Get a string argument
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Get a boolean argument
    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    /// Get an integer argument
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    /// Get a number argument
    pub fn number(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    /// Get a required string argument, erroring if absent
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str(name).ok_or_else(|| self.missing(name))
    }

    /// Get a required boolean argument, erroring if absent
    pub fn require_bool(&self, name: &str) -> Result<bool> {
        self.boolean(name).ok_or_else(|| self.missing(name))
    }

    fn missing(&self, name: &str) -> NatterError {
        NatterError::InvalidArgument {
            tool: self.tool.clone(),
            argument: name.to_string(),
            reason: "missing".to_string(),
        }
    }
}
