use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub ui: UiConfig,
}

/// Which reply mode to request from the backend.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Plain streamed replies.
    Chat,
    /// Tool-using agent replies with a reasoning trace.
    Agent,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the backend API.
    pub base_url: String,
    /// Default reply mode.
    pub mode: ChatMode,
    /// Stream replies incrementally. Off requests complete replies
    /// (chat mode only; agent replies are always streamed).
    pub stream: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            mode: ChatMode::Chat,
            stream: true,
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Command to run to get the API token (e.g. "pass show qachat").
    /// The command is run via `sh -c`.
    pub token_cmd: Option<String>,
}

impl AuthConfig {
    /// Resolve the token from token_cmd or the QACHAT_TOKEN env var.
    ///
    /// The backend accepts anonymous sessions, so no token is not an
    /// error.
    pub fn resolve_token(&self) -> io::Result<Option<String>> {
        if let Some(cmd) = &self.token_cmd {
            let output = Command::new("sh").arg("-c").arg(cmd).output()?;

            if output.status.success() {
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !token.is_empty() {
                    return Ok(Some(token));
                }
            }
        }

        Ok(std::env::var("QACHAT_TOKEN").ok().filter(|t| !t.is_empty()))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Render agent `thinking` events (dimmed) as they arrive.
    pub show_thinking: bool,
    /// Prefix history lines with their timestamps.
    pub timestamps: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_thinking: true,
            timestamps: false,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("warning: failed to parse {}: {e}", path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("qachat").join("config.toml")
}
