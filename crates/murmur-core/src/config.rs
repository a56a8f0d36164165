use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use murmur_provider::{ProviderConfig, ProviderType};

use crate::context::TriggerPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
}

impl DiscordConfig {
    /// Token from config, falling back to the DISCORD_TOKEN env var.
    pub fn resolved_token(&self) -> Option<String> {
        if !self.token.is_empty() {
            return Some(self.token.clone());
        }
        std::env::var("DISCORD_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(flatten)]
    pub provider: ProviderConfig,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ProviderSettings {
    /// Provider config with the ANTHROPIC_API_KEY env var as key fallback.
    pub fn resolved(&self) -> ProviderConfig {
        let mut config = self.provider.clone();
        if config.api_key.is_none() {
            config.api_key = std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_trigger_window")]
    pub window: usize,
    #[serde(default = "default_true")]
    pub broadened: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            window: default_trigger_window(),
            broadened: true,
        }
    }
}

impl TriggerConfig {
    pub fn policy(&self) -> TriggerPolicy {
        TriggerPolicy {
            window: self.window,
            broadened: self.broadened,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Markdown file overriding the built-in persona prompt.
    #[serde(default)]
    pub persona_path: Option<PathBuf>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            persona_path: None,
            max_steps: default_max_steps(),
            history_limit: default_history_limit(),
            trigger: TriggerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Search-capable model the search_web tool delegates to; defaults to
    /// the agent's own model.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    pub app: AppConfig,
    #[serde(default = "default_discord")]
    pub discord: DiscordConfig,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

impl MainConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            bail!("app.name must not be empty");
        }
        if self.discord.enabled && self.discord.resolved_token().is_none() {
            bail!("discord.token is required (or set DISCORD_TOKEN)");
        }
        if self.provider.provider.provider_type == ProviderType::Anthropic
            && self.provider.resolved().api_key.is_none()
        {
            bail!("provider.api_key is required (or set ANTHROPIC_API_KEY)");
        }
        if self.provider.model.trim().is_empty() {
            bail!("provider.model must not be empty");
        }
        if self.agent.max_steps == 0 {
            bail!("agent.max_steps must be at least 1");
        }
        if self.agent.history_limit == 0 {
            bail!("agent.history_limit must be at least 1");
        }
        if self.agent.trigger.window > self.agent.history_limit {
            bail!("agent.trigger.window cannot exceed agent.history_limit");
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_trigger_window() -> usize {
    10
}

fn default_max_steps() -> usize {
    10
}

fn default_history_limit() -> usize {
    50
}

fn default_db_path() -> String {
    "murmur.db".to_string()
}

fn default_discord() -> DiscordConfig {
    DiscordConfig {
        enabled: true,
        token: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
app:
  name: murmur
discord:
  token: "dc-token"
provider:
  type: anthropic
  api_key: "sk-test"
  model: claude-sonnet-4-5
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: MainConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.agent.history_limit, 50);
        assert_eq!(config.agent.trigger.window, 10);
        assert!(config.agent.trigger.broadened);
        assert_eq!(config.memory.db_path, "murmur.db");
        assert!((config.provider.temperature - 0.7).abs() < 1e-6);
        assert!(config.web_search.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("murmur.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = MainConfig::load(&path).unwrap();
        assert_eq!(config.app.name, "murmur");
        assert_eq!(config.provider.model, "claude-sonnet-4-5");
    }

    #[test]
    fn validate_rejects_zero_step_budget() {
        let mut config: MainConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.agent.max_steps = 0;
        let err = config.validate().err().unwrap();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn validate_rejects_window_beyond_history() {
        let mut config: MainConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.agent.trigger.window = 100;
        let err = config.validate().err().unwrap();
        assert!(err.to_string().contains("trigger.window"));
    }

    #[test]
    fn stub_provider_needs_no_key() {
        let raw = r#"
app:
  name: murmur
discord:
  enabled: false
provider:
  type: stub
  model: test-model
"#;
        let config: MainConfig = serde_yaml::from_str(raw).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn trigger_can_be_narrowed() {
        let raw = format!("{MINIMAL}\nagent:\n  trigger:\n    broadened: false\n");
        let config: MainConfig = serde_yaml::from_str(&raw).unwrap();
        assert!(!config.agent.trigger.policy().broadened);
    }
}
