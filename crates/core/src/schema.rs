//! Tool parameter declarations and JSON-Schema generation.
//!
//! Tools declare their parameters as a list of [`ParamSpec`]s; the registry
//! turns the list into a provider-compatible JSON Schema object and uses the
//! same declarations to validate incoming arguments before execution.

use serde_json::{Map, Value, json};

/// The JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A single declared tool parameter.
///
/// Built with the constructor for its type plus chained annotations:
///
/// ```
/// use ferrite_core::schema::ParamSpec;
///
/// let spec = ParamSpec::string("path")
///     .describe("The file path to read")
///     .required();
/// ```
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
    pub enum_values: Vec<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub default: Option<Value>,
}

impl ParamSpec {
    fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            kind,
            required: false,
            enum_values: Vec::new(),
            minimum: None,
            maximum: None,
            pattern: None,
            format: None,
            default: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict the parameter to a fixed set of string values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self
    }

    /// Lower bound: `minimum` for numerics, `minLength` for strings.
    pub fn min(mut self, value: f64) -> Self {
        self.minimum = Some(value);
        self
    }

    /// Upper bound: `maximum` for numerics, `maxLength` for strings.
    pub fn max(mut self, value: f64) -> Self {
        self.maximum = Some(value);
        self
    }

    pub fn pattern(mut self, re: &str) -> Self {
        self.pattern = Some(re.to_string());
        self
    }

    /// A string format hint (`email`, `url`, `uuid`, ...).
    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn property_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.kind.type_name()));
        if !self.description.is_empty() {
            prop.insert("description".into(), json!(self.description));
        }
        if !self.enum_values.is_empty() {
            prop.insert("enum".into(), Value::Array(self.enum_values.clone()));
        }
        let (lo_key, hi_key) = match self.kind {
            ParamKind::String => ("minLength", "maxLength"),
            _ => ("minimum", "maximum"),
        };
        if let Some(lo) = self.minimum {
            prop.insert(lo_key.into(), bound_value(self.kind, lo));
        }
        if let Some(hi) = self.maximum {
            prop.insert(hi_key.into(), bound_value(self.kind, hi));
        }
        if let Some(re) = &self.pattern {
            prop.insert("pattern".into(), json!(re));
        }
        if let Some(fmt) = &self.format {
            prop.insert("format".into(), json!(fmt));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        Value::Object(prop)
    }
}

fn bound_value(kind: ParamKind, bound: f64) -> Value {
    match kind {
        ParamKind::Number => json!(bound),
        _ => json!(bound as i64),
    }
}

/// Build the `{"type": "object", ...}` schema for a parameter list.
pub fn object_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        properties.insert(param.name.clone(), param.property_schema());
        if param.required {
            required.push(json!(param.name));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    Value::Object(schema)
}

/// Validate parsed arguments against the declarations.
///
/// Checks required-ness, basic type agreement, enum membership, numeric
/// bounds, and string length bounds. `pattern` is advertised in the schema
/// but not enforced here.
pub fn validate_args(params: &[ParamSpec], args: &Value) -> std::result::Result<(), String> {
    let object = args.as_object().cloned().unwrap_or_default();

    for param in params {
        let Some(value) = object.get(&param.name) else {
            if param.required {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            continue;
        };

        let type_ok = match param.kind {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        };
        if !type_ok {
            return Err(format!(
                "parameter '{}' must be of type {}",
                param.name,
                param.kind.type_name()
            ));
        }

        if !param.enum_values.is_empty() && !param.enum_values.contains(value) {
            return Err(format!(
                "parameter '{}' must be one of {:?}",
                param.name, param.enum_values
            ));
        }

        let measure = match param.kind {
            ParamKind::String => value.as_str().map(|s| s.chars().count() as f64),
            _ => value.as_f64(),
        };
        if let Some(measured) = measure {
            if let Some(lo) = param.minimum
                && measured < lo
            {
                return Err(format!("parameter '{}' is below the minimum of {lo}", param.name));
            }
            if let Some(hi) = param.maximum
                && measured > hi
            {
                return Err(format!("parameter '{}' exceeds the maximum of {hi}", param.name));
            }
        }
    }

    Ok(())
}
