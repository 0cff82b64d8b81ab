use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "toolgate.toml";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level toolgate configuration, loaded from `toolgate.toml`.
///
/// Resolution order: `--config-dir` → `TOOLGATE_CONFIG_DIR` env → `~/.toolgate`.
/// A missing file is not an error; every section has defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to toolgate.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Client-facing HTTP gateway (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Sandbox executor connection settings (`[executor]`).
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Tool definition locations (`[catalog]`).
    #[serde(default)]
    pub catalog: CatalogConfig,
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Allow binding to a non-loopback address (default: false).
    /// The gateway dispatches commands to a privileged sandbox and has no client auth.
    #[serde(default)]
    pub allow_public_bind: bool,
    /// Answer CORS preflights for any origin (default: true, the desktop UI loads from file://)
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            allow_public_bind: false,
            cors_allow_any: true,
        }
    }
}

// ── Executor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Base URL of the sandbox executor (default: http://127.0.0.1:9000)
    #[serde(default = "default_executor_base_url")]
    pub base_url: String,
    /// TCP connect timeout in seconds. `0` disables it. The request itself is never timed out.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Abort a stream when the executor sends nothing for this many seconds. `0` disables it.
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

fn default_executor_base_url() -> String {
    "http://127.0.0.1:9000".into()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: default_executor_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: 0,
        }
    }
}

impl ExecutorConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

// ── Catalog ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Grouped legacy catalog document (default: `tools.json`).
    /// Relative paths resolve against the working directory.
    #[serde(default = "default_legacy_path")]
    pub legacy_path: PathBuf,
    /// Directory of per-tool definition files, `*.json` or `*.toml` (default: `tool_definitions`).
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
}

fn default_legacy_path() -> PathBuf {
    PathBuf::from("tools.json")
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("tool_definitions")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            legacy_path: default_legacy_path(),
            definitions_dir: default_definitions_dir(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

fn default_config_dir() -> PathBuf {
    UserDirs::new().map_or_else(
        || PathBuf::from("."),
        |u| u.home_dir().join(".toolgate"),
    )
}

/// Pick the config directory: explicit flag, then `TOOLGATE_CONFIG_DIR`, then `~/.toolgate`.
pub fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match std::env::var("TOOLGATE_CONFIG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_config_dir(),
    }
}

impl Config {
    /// Load `toolgate.toml` from the resolved config directory, then apply
    /// env overrides and validate.
    pub async fn load(config_dir: Option<&Path>) -> Result<Self> {
        let config_path = resolve_config_dir(config_dir).join(CONFIG_FILE_NAME);
        Self::load_from_path(&config_path).await
    }

    pub async fn load_from_path(config_path: &Path) -> Result<Self> {
        let exists = fs::try_exists(config_path).await.unwrap_or(false);
        let mut config = if exists {
            let contents = fs::read_to_string(config_path)
                .await
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.config_path = config_path.to_path_buf();

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            from_file = exists,
            executor = %config.executor.base_url,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid toolgate.toml")
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }

        let base_url = self.executor.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!("executor.base_url must not be empty");
        }
        let parsed = reqwest::Url::parse(base_url)
            .with_context(|| format!("executor.base_url is not a valid URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!(
                "executor.base_url must use http or https (got {})",
                parsed.scheme()
            );
        }

        if self.catalog.legacy_path.as_os_str().is_empty() {
            anyhow::bail!("catalog.legacy_path must not be empty");
        }
        if self.catalog.definitions_dir.as_os_str().is_empty() {
            anyhow::bail!("catalog.definitions_dir must not be empty");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(host) = get("TOOLGATE_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = get("TOOLGATE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("Ignoring invalid TOOLGATE_PORT={port}"),
            }
        }
        if let Some(url) = get("TOOLGATE_EXECUTOR_URL") {
            self.executor.base_url = url;
        }
        if let Some(secs) = get("TOOLGATE_IDLE_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => self.executor.idle_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid TOOLGATE_IDLE_TIMEOUT_SECS={secs}"),
            }
        }
        if let Some(path) = get("TOOLGATE_CATALOG") {
            self.catalog.legacy_path = PathBuf::from(path);
        }
        if let Some(dir) = get("TOOLGATE_DEFINITIONS_DIR") {
            self.catalog.definitions_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_local_executor() {
        let config = Config::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8000);
        assert!(!config.gateway.allow_public_bind);
        assert_eq!(config.executor.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.executor.idle_timeout(), None);
        assert_eq!(
            config.executor.connect_timeout(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(config.catalog.legacy_path, PathBuf::from("tools.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_section_defaults() {
        let config = Config::from_toml(
            r#"
[executor]
base_url = "http://sandbox:9100"
idle_timeout_secs = 120

[catalog]
definitions_dir = "/etc/toolgate/tools"
"#,
        )
        .unwrap();

        assert_eq!(config.executor.base_url, "http://sandbox:9100");
        assert_eq!(
            config.executor.idle_timeout(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(config.executor.connect_timeout_secs, 10);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(
            config.catalog.definitions_dir,
            PathBuf::from("/etc/toolgate/tools")
        );
        assert_eq!(config.catalog.legacy_path, PathBuf::from("tools.json"));
    }

    #[test]
    fn validate_rejects_non_http_executor() {
        let mut config = Config::default();
        config.executor.base_url = "unix:///run/sandbox.sock".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));

        config.executor.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_host() {
        let mut config = Config::default();
        config.gateway.host = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_replace_values_and_skip_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TOOLGATE_HOST", "0.0.0.0"),
            ("TOOLGATE_PORT", "not-a-port"),
            ("TOOLGATE_EXECUTOR_URL", "http://10.1.1.1:9000"),
            ("TOOLGATE_IDLE_TIMEOUT_SECS", "45"),
            ("TOOLGATE_CATALOG", "  "),
            ("TOOLGATE_DEFINITIONS_DIR", "defs"),
        ]);
        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.executor.base_url, "http://10.1.1.1:9000");
        assert_eq!(config.executor.idle_timeout_secs, 45);
        assert_eq!(config.catalog.legacy_path, PathBuf::from("tools.json"));
        assert_eq!(config.catalog.definitions_dir, PathBuf::from("defs"));
    }

    #[test]
    fn explicit_config_dir_wins() {
        let dir = Path::new("/tmp/toolgate-explicit");
        assert_eq!(resolve_config_dir(Some(dir)), dir.to_path_buf());
    }

    #[tokio::test]
    async fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.gateway.port, 8000);
    }

    #[tokio::test]
    async fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[gateway]\nport = 8123\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.gateway.port, 8123);
    }

    #[tokio::test]
    async fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[gateway\nport = ").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
