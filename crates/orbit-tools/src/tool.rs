use crate::schema::ToolSchema;
use async_trait::async_trait;
use orbit_core::OrbitResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata describing a tool and its declared argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a registry.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// Tool version.
    pub version: String,
    /// Optional grouping label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Extra entries merged into [`Tool::metadata`].
    #[serde(default)]
    pub extra: Map<String, Value>,
    /// Declared interface.
    pub schema: ToolSchema,
}

impl ToolDescriptor {
    /// A descriptor named after `schema`.
    pub fn new(schema: ToolSchema, version: impl Into<String>) -> Self {
        Self {
            name: schema.name.clone(),
            description: schema.description.clone(),
            version: version.into(),
            category: None,
            extra: Map::new(),
            schema,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add a custom metadata entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Trait that all tools must implement.
///
/// Argument bundles are checked against [`ToolDescriptor::schema`] by the
/// registry before `execute` is called; implementations only add their own
/// domain checks through [`Tool::validate`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, version and schema.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run with arguments that already passed validation.
    async fn execute(&self, args: Value) -> OrbitResult<Value>;

    /// Extra domain validation run after the schema check.
    async fn validate(&self, _args: &Value) -> bool {
        true
    }

    /// Shorthand for the descriptor's name.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Shorthand for the descriptor's schema.
    fn schema(&self) -> &ToolSchema {
        &self.descriptor().schema
    }

    /// Name, description, version and category plus any extra entries.
    fn metadata(&self) -> Map<String, Value> {
        let d = self.descriptor();
        let mut map = Map::new();
        map.insert("name".into(), Value::String(d.name.clone()));
        map.insert("description".into(), Value::String(d.description.clone()));
        map.insert("version".into(), Value::String(d.version.clone()));
        map.insert(
            "category".into(),
            d.category.clone().map_or(Value::Null, Value::String),
        );
        for (k, v) in &d.extra {
            map.insert(k.clone(), v.clone());
        }
        map
    }
}
