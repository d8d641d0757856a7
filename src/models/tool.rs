//! Tool schema models: parameters, definitions and validated arguments.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    /// Whether a JSON value conforms to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type name of a value, as reported in type mismatch violations
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single named parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name, unique within its tool
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether callers must supply it
    #[serde(default)]
    pub required: bool,

    /// Value used when the caller omits the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// Create a required parameter
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Create an optional parameter
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Set the default value
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Shape of the value a tool returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnShape {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl Default for ReturnShape {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            description: "Tool execution result".to_string(),
        }
    }
}

/// Static description of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Globally unique tool name (e.g., "jina.reader")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Declared parameters, in declaration order
    pub parameters: Vec<ToolParameter>,

    /// Names of the required parameters
    #[serde(default)]
    pub required: Vec<String>,

    /// Declared return shape
    #[serde(default)]
    pub returns: ReturnShape,
}

impl ToolDefinition {
    /// Create a definition with no parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            required: Vec::new(),
            returns: ReturnShape::default(),
        }
    }

    /// Declare a parameter; required parameters are added to the required set
    pub fn param(mut self, parameter: ToolParameter) -> Self {
        if parameter.required && !self.required.contains(&parameter.name) {
            self.required.push(parameter.name.clone());
        }
        self.parameters.push(parameter);
        self
    }

    /// Set the return shape
    pub fn returns(mut self, kind: impl Into<String>, description: impl Into<String>) -> Self {
        self.returns = ReturnShape {
            kind: kind.into(),
            description: description.into(),
        };
        self
    }

    /// Look up a declared parameter
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check the definition is self-consistent: unique parameter names and a
    /// required set drawn from the declared names.
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(format!("parameter '{}' declared twice", parameter.name));
            }
        }

        if let Some(unknown) = self.required.iter().find(|r| !seen.contains(r.as_str())) {
            return Err(format!(
                "required parameter '{}' is not declared",
                unknown
            ));
        }

        Ok(())
    }

    /// Validate a supplied parameter mapping against this definition.
    ///
    /// Every violation is collected. `null` values count as not supplied.
    /// On success the returned arguments hold the supplied declared
    /// parameters plus the defaults of omitted ones.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<ToolArguments, Vec<Violation>> {
        let mut violations = Vec::new();

        for name in &self.required {
            if params.get(name).map_or(true, Value::is_null) {
                violations.push(Violation::Missing {
                    parameter: name.clone(),
                });
            }
        }

        for (name, value) in params {
            match self.parameter(name) {
                None => violations.push(Violation::Unexpected {
                    parameter: name.clone(),
                }),
                Some(_) if value.is_null() => {}
                Some(parameter) if !parameter.param_type.accepts(value) => {
                    violations.push(Violation::TypeMismatch {
                        parameter: name.clone(),
                        expected: parameter.param_type,
                        actual: json_type_name(value).to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        let mut values = Map::new();
        for parameter in &self.parameters {
            match params.get(&parameter.name) {
                Some(value) if !value.is_null() => {
                    values.insert(parameter.name.clone(), value.clone());
                }
                _ => {
                    if let Some(ref default) = parameter.default {
                        values.insert(parameter.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(ToolArguments { values })
    }
}

/// One broken constraint found while validating parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Missing { parameter: String },
    Unexpected { parameter: String },
    TypeMismatch {
        parameter: String,
        expected: ParamType,
        actual: String,
    },
    /// The params value itself was not a mapping
    NotAnObject { actual: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing { parameter } => {
                write!(f, "missing required parameter '{}'", parameter)
            }
            Violation::Unexpected { parameter } => write!(f, "unexpected parameter '{}'", parameter),
            Violation::TypeMismatch {
                parameter,
                expected,
                actual,
            } => write!(
                f,
                "parameter '{}' must be {}, got {}",
                parameter, expected, actual
            ),
            Violation::NotAnObject { actual } => {
                write!(f, "params must be an object, got {}", actual)
            }
        }
    }
}

/// Arguments that passed validation, restricted to declared parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Names of the arguments present
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}
