use anyhow::Context;
use orbit_agent::{AgentCapabilities, EchoAgent};
use orbit_context::ContextConfig;
use orbit_orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Contents of `orbit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Enables task memory when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// A demo echo agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_agent_slots")]
    pub max_concurrent_tasks: usize,
    /// Wrap the agent in a retry decorator.
    #[serde(default)]
    pub retry: bool,
}

impl AgentConfig {
    pub fn build(&self) -> EchoAgent {
        EchoAgent::with_capabilities(
            self.name.clone(),
            AgentCapabilities::default().with_max_concurrent(self.max_concurrent_tasks),
        )
        .with_delay(Duration::from_millis(self.delay_ms))
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_agent_slots() -> usize {
    1
}

impl CliConfig {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or fall back to defaults when it does not exist and
    /// `required` is false.
    pub fn load(path: &Path, required: bool) -> anyhow::Result<Self> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&source).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.orchestrator.validate()?;
        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            anyhow::ensure!(!agent.name.is_empty(), "agent name must not be empty");
            anyhow::ensure!(
                agent.max_concurrent_tasks > 0,
                "agent '{}': max_concurrent_tasks must be greater than 0",
                agent.name
            );
            anyhow::ensure!(
                seen.insert(agent.name.as_str()),
                "agent '{}' is declared twice",
                agent.name
            );
        }
        Ok(())
    }
}
