use crate::tool::{Tool, ToolDescriptor};
use crate::validator::{check_schema, validate_args};
use orbit_core::{OrbitError, OrbitResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Named collection of tools. Registering under an existing name replaces it.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, returning the one it replaced.
    ///
    /// The schema is checked up front, which also compiles its patterns. A
    /// broken schema is logged; every call to the tool then fails with
    /// [`OrbitError::Config`].
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        if let Err(e) = check_schema(&tool.schema().parameters) {
            warn!(tool = %name, error = %e, "Registered tool has an unusable schema");
        }
        info!(tool = %name, version = %tool.descriptor().version, "Registered tool");
        self.tools.insert(name, tool)
    }

    /// Remove a tool by name.
    pub fn unregister(&mut self, name: &str) -> OrbitResult<Arc<dyn Tool>> {
        let removed = self
            .tools
            .remove(name)
            .ok_or_else(|| OrbitError::NotFound(format!("tool '{name}'")))?;
        info!(tool = %name, "Removed tool");
        Ok(removed)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Whether a tool with that name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors of all tools, sorted by name.
    pub fn list_descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Validate and execute a tool by name.
    pub async fn invoke(&self, name: &str, args: Value) -> OrbitResult<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| OrbitError::NotFound(format!("tool '{name}'")))?;
        invoke(tool.as_ref(), args).await
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a tool after checking `args` against its schema and its own
/// `validate` hook. The tool never sees arguments that failed either check.
pub async fn invoke(tool: &dyn Tool, args: Value) -> OrbitResult<Value> {
    let name = tool.name();
    if let Err(e) = validate_args(&args, tool.schema()) {
        warn!(tool = %name, error = %e, "Tool arguments rejected");
        return Err(e);
    }
    if !tool.validate(&args).await {
        warn!(tool = %name, "Tool validation hook rejected arguments");
        return Err(OrbitError::Validation(format!(
            "tool '{name}' rejected its arguments"
        )));
    }

    debug!(tool = %name, "Invoking tool");
    tool.execute(args).await
}
