use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Built-in instruction prompt used when neither the active connection nor
/// the `[ai]` section overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that turns free-form \
notes and attached files into structured database entries. Read everything the user \
provided, fill in every requested field from the content, and write a concise summary \
with the key takeaways. Respond with a single JSON object conforming to the provided \
schema and nothing else.";

/// Model identifiers known to work with the `gemini` provider.
pub const GEMINI_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
];

/// Model identifiers known to work with the `openrouter` provider.
pub const OPENROUTER_MODELS: &[&str] = &[
    "openai/gpt-oss-20b:free",
    "z-ai/glm-4.5-air:free",
    "deepseek/deepseek-chat-v3-0324:free",
    "deepseek/deepseek-r1-0528:free",
    "deepseek/deepseek-r1:free",
    "moonshotai/kimi-vl-a3b-thinking:free",
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ai: AiConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub active_connection: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// AI provider: `gemini` or `openrouter`.
    pub provider: String,
    /// API key; falls back to `GEMINI_API_KEY` / `OPENROUTER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    /// Optional global instruction prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl AiConfig {
    /// The API key: config value first, then the provider's conventional
    /// environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        let var = match self.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => return None,
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }
}

/// File upload side-channel. When no endpoint is configured, files are
/// attached to the page as fallback notes instead of embeds.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_upload_timeout_secs(),
        }
    }
}

fn default_upload_timeout_secs() -> u64 {
    60
}

/// Credentials and identity for one target database.
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub name: String,
    pub api_key: String,
    pub database_id: String,
    /// Optional per-connection instruction prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Config {
    /// The connection named by `active_connection`, if any.
    pub fn active_connection(&self) -> Option<&ConnectionConfig> {
        let name = self.active_connection.as_deref()?;
        self.connections.iter().find(|c| c.name == name)
    }

    /// Instruction prompt for a processing call, in precedence order:
    /// connection override, global `[ai]` override, built-in default.
    pub fn prompt_for(&self, connection: &ConnectionConfig) -> String {
        connection
            .system_prompt
            .clone()
            .or_else(|| self.ai.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// True when the model identifier appears in the provider's known list.
    pub fn model_is_known(&self) -> bool {
        let catalog = match self.ai.provider.as_str() {
            "gemini" => GEMINI_MODELS,
            "openrouter" => OPENROUTER_MODELS,
            _ => return false,
        };
        catalog.contains(&self.ai.model.as_str())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    match config.ai.provider.as_str() {
        "gemini" | "openrouter" => {}
        other => anyhow::bail!("Unknown AI provider: '{}'. Must be gemini or openrouter.", other),
    }

    if config.ai.model.is_empty() {
        anyhow::bail!("ai.model must be specified");
    }

    if config.ai.timeout_secs == 0 {
        anyhow::bail!("ai.timeout_secs must be > 0");
    }

    let mut seen = std::collections::HashSet::new();
    for conn in &config.connections {
        if conn.name.is_empty() {
            anyhow::bail!("Every [[connections]] entry must have a non-empty name");
        }
        if !seen.insert(conn.name.as_str()) {
            anyhow::bail!("Duplicate connection name: '{}'", conn.name);
        }
        if conn.api_key.is_empty() || conn.database_id.is_empty() {
            anyhow::bail!(
                "Connection '{}' must have both api_key and database_id",
                conn.name
            );
        }
    }

    if let Some(active) = config.active_connection.as_deref() {
        if !config.connections.iter().any(|c| c.name == active) {
            anyhow::bail!("active_connection '{}' does not match any [[connections]] entry", active);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        // Re-run the load-time validation on an in-memory document.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nclip.toml");
        std::fs::write(&path, toml_str).unwrap();
        load_config(&path)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[ai]
provider = "gemini"
model = "gemini-2.5-flash"
"#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.ai.timeout_secs, 120);
        assert!(config.upload.endpoint.is_none());
        assert!(config.connections.is_empty());
        assert!(config.active_connection().is_none());
        assert!(config.model_is_known());
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse(
            r#"
[ai]
provider = "anthropic"
model = "claude"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown AI provider"));
    }

    #[test]
    fn active_connection_must_exist() {
        let err = parse(
            r#"
[ai]
provider = "gemini"
model = "gemini-2.5-flash"
active_connection = "missing"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn duplicate_connection_names_rejected() {
        let err = parse(
            r#"
[ai]
provider = "gemini"
model = "gemini-2.5-flash"

[[connections]]
name = "inbox"
api_key = "k"
database_id = "d"

[[connections]]
name = "inbox"
api_key = "k2"
database_id = "d2"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate connection name"));
    }

    #[test]
    fn prompt_precedence_connection_then_global_then_default() {
        let config = parse(
            r#"
[ai]
provider = "gemini"
model = "gemini-2.5-flash"
system_prompt = "global"

[[connections]]
name = "a"
api_key = "k"
database_id = "d"
system_prompt = "per-connection"

[[connections]]
name = "b"
api_key = "k"
database_id = "d"
"#,
        )
        .unwrap();
        assert_eq!(config.prompt_for(&config.connections[0]), "per-connection");
        assert_eq!(config.prompt_for(&config.connections[1]), "global");

        let bare = parse(MINIMAL).unwrap();
        let conn = ConnectionConfig {
            name: "x".into(),
            api_key: "k".into(),
            database_id: "d".into(),
            system_prompt: None,
        };
        assert_eq!(bare.prompt_for(&conn), DEFAULT_SYSTEM_PROMPT);
    }
}
