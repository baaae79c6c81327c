//! Runtime configuration - interpreter, addresses, ports, timeouts
//!
//! Loaded from `sandcastle.yml` in the current directory, falling back to
//! `~/.sandcastle/config.yml`, falling back to built-in defaults. Every
//! field is optional in the file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace directory holding the user's program
    pub workspace_root: PathBuf,
    /// File name of the designated entry file inside the workspace
    pub entry_file: String,
    /// Interpreter used to launch the user's program
    pub interpreter: String,
    /// Address of the preview server the pane points at
    pub server_address: String,
    /// Host advertised to the service framework
    pub app_host: String,
    /// Port the supervised service binds; distinct from the session's own port
    pub app_port: u16,
    /// Base URL prefix advertised to the service framework
    pub base_url: String,
    /// Interval for file-change polling and streamer error backoff
    pub poll_interval_ms: u64,
    /// Bound on each phase of graceful-then-forceful termination
    pub grace_period_ms: u64,
    /// Where workspace archives land; defaults to ~/.sandcastle/exports
    pub export_dir: Option<PathBuf>,
    /// Where session journals land; None disables journaling
    pub history_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().map(|h| h.join(".sandcastle"));
        Self {
            workspace_root: PathBuf::from("project"),
            entry_file: "app.py".to_string(),
            interpreter: "python3".to_string(),
            server_address: "http://127.0.0.1:10101".to_string(),
            app_host: "127.0.0.1".to_string(),
            app_port: 10102,
            base_url: "/".to_string(),
            poll_interval_ms: 500,
            grace_period_ms: 3000,
            export_dir: home.as_ref().map(|h| h.join("exports")),
            history_dir: home.map(|h| h.join("sessions")),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Auto-detect and load configuration
    /// Priority:
    /// 1. sandcastle.yml in the current directory
    /// 2. ~/.sandcastle/config.yml
    /// 3. Built-in defaults
    pub fn auto_load() -> Result<Self> {
        let local = Path::new("sandcastle.yml");
        if local.exists() {
            return Self::from_file(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".sandcastle/config.yml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        Ok(Self::default())
    }

    /// Polling interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Termination grace period as a duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Address advertised to the supervised service (`http://host:port`)
    pub fn app_address(&self) -> String {
        format!("http://{}:{}", self.app_host, self.app_port)
    }
}
