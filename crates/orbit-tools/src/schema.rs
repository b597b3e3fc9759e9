use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema of a single parameter (or of a nested value inside one).
///
/// `kind` is one of `string`, `number`, `boolean`, `array`, `object`. It is
/// kept as a string so that a schema naming any other type still loads and
/// is reported by the validator as a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// JSON type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Allowed string values.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Regular expression strings must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Free-form format hint (`date-time`, `uri`, ...); not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Schema of every array element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    /// Schemas of object properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParameterSchema>,
    /// Property names that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ParameterSchema {
    fn of(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: String::new(),
            allowed: None,
            minimum: None,
            maximum: None,
            pattern: None,
            format: None,
            items: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// A `string` schema.
    pub fn string() -> Self {
        Self::of("string")
    }

    /// A `number` schema.
    pub fn number() -> Self {
        Self::of("number")
    }

    /// A `boolean` schema.
    pub fn boolean() -> Self {
        Self::of("boolean")
    }

    /// An `array` schema with element schema `items`.
    pub fn array(items: ParameterSchema) -> Self {
        let mut schema = Self::of("array");
        schema.items = Some(Box::new(items));
        schema
    }

    /// An `object` schema with no properties.
    pub fn object() -> Self {
        Self::of("object")
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Restrict a string to the given values.
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Require a string to match `pattern`.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the inclusive lower bound.
    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Set the inclusive upper bound.
    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Set both bounds.
    pub fn with_range(self, minimum: f64, maximum: f64) -> Self {
        self.with_minimum(minimum).with_maximum(maximum)
    }

    /// Declare an optional property.
    pub fn with_property(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Declare a property and mark it required.
    pub fn with_required(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }
}

/// Description of what a tool returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSchema {
    /// Return type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// What the value means.
    #[serde(default)]
    pub description: String,
}

/// The full declared interface of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// Top-level argument bundle; always an `object` schema.
    pub parameters: ParameterSchema,
    /// Declared return value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnSchema>,
}

impl ToolSchema {
    /// A schema taking an empty argument object.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::object(),
            returns: None,
        }
    }

    /// Set the argument schema.
    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    /// Declare the return value.
    pub fn with_returns(mut self, kind: impl Into<String>, description: impl Into<String>) -> Self {
        self.returns = Some(ReturnSchema {
            kind: kind.into(),
            description: description.into(),
        });
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_marks_required() {
        let schema = ParameterSchema::object()
            .with_required("x", ParameterSchema::string())
            .with_property("y", ParameterSchema::number());
        assert_eq!(schema.required, vec!["x".to_string()]);
        assert_eq!(schema.properties.len(), 2);
    }

    #[test]
    fn test_deserialize_json_schema_shape() {
        let json = serde_json::json!({
            "type": "object",
            "required": ["amount"],
            "properties": {
                "amount": { "type": "number", "minimum": 0, "description": "Wei" },
                "token": { "type": "string", "enum": ["ETH", "USDC"] },
                "hops": { "type": "array", "items": { "type": "string" } }
            }
        });
        let schema: ParameterSchema = serde_json::from_value(json).unwrap();
        assert_eq!(schema.kind, "object");
        assert_eq!(schema.properties["amount"].minimum, Some(0.0));
        assert_eq!(
            schema.properties["token"].allowed.as_deref(),
            Some(&["ETH".to_string(), "USDC".to_string()][..])
        );
        assert_eq!(schema.properties["hops"].items.as_ref().unwrap().kind, "string");
    }

    #[test]
    fn test_serialize_skips_empty_constraints() {
        let json = serde_json::to_value(ParameterSchema::boolean()).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "boolean" }));
    }
}
