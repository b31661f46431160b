use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub adapter: AdapterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Client build output served for non-API paths, if the directory exists
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub binary: PathBuf,
    pub merge_format: String,
    pub describe_timeout_secs: u64,
    pub stall_timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            merge_format: "mp4".to_string(),
            describe_timeout_secs: 60,
            stall_timeout_secs: 120,
        }
    }
}

impl AdapterConfig {
    pub fn describe_timeout(&self) -> Duration {
        Duration::from_secs(self.describe_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.describe_timeout_secs == 0 {
            bail!("adapter.describe_timeout_secs must be at least 1");
        }
        if self.stall_timeout_secs == 0 {
            bail!("adapter.stall_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.adapter.validate()?;
        Ok(config)
    }

    pub fn get_logging_format(&self) -> LogFormat {
        self.logging.format
    }

    /// The `--port` flag beats `PORT`, which beats the file.
    pub fn apply_port_override(&mut self, flag: Option<u16>, env: Option<&str>) -> Result<()> {
        if let Some(port) = flag {
            self.server.port = port;
            return Ok(());
        }

        if let Some(value) = env.map(str::trim).filter(|v| !v.is_empty()) {
            self.server.port = value
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", value))?;
        }

        Ok(())
    }

    /// Static directory to serve, if configured and present on disk.
    pub fn static_root(&self) -> Option<&Path> {
        self.server
            .static_dir
            .as_deref()
            .filter(|dir| dir.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.adapter.binary, PathBuf::from("yt-dlp"));
        assert_eq!(config.adapter.merge_format, "mp4");
        assert_eq!(config.adapter.describe_timeout(), Duration::from_secs(60));
        assert_eq!(config.get_logging_format(), LogFormat::Json);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [adapter]
            binary = "/usr/local/bin/yt-dlp"
            stall_timeout_secs = 30

            [logging]
            format = "plain"
            "#,
        )
        .unwrap();

        assert_eq!(config.adapter.binary, PathBuf::from("/usr/local/bin/yt-dlp"));
        assert_eq!(config.adapter.stall_timeout(), Duration::from_secs(30));
        assert_eq!(config.adapter.merge_format, "mp4");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.get_logging_format(), LogFormat::Plain);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(Config::from_toml("[logging]\nformat = \"xml\"").is_err());
        assert!(Config::from_toml("[server]\nport = \"eighty\"").is_err());
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let err = Config::from_toml("[adapter]\nstall_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("stall_timeout_secs"));

        let err = Config::from_toml("[adapter]\ndescribe_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("describe_timeout_secs"));

        assert!(Config::from_toml("[adapter]\nstall_timeout_secs = 1").is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8080\nstatic_dir = \"dist\"").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("dist")));

        assert!(Config::from_file("/nonexistent/vidrelay.toml").is_err());
    }

    #[test]
    fn test_port_precedence() {
        let mut config = Config::default();
        config.server.port = 8080;

        config.apply_port_override(None, None).unwrap();
        assert_eq!(config.server.port, 8080);

        config.apply_port_override(None, Some("9000")).unwrap();
        assert_eq!(config.server.port, 9000);

        config.apply_port_override(Some(7000), Some("9000")).unwrap();
        assert_eq!(config.server.port, 7000);

        config.apply_port_override(None, Some("  ")).unwrap();
        assert_eq!(config.server.port, 7000);

        assert!(config.apply_port_override(None, Some("http")).is_err());
    }

    #[test]
    fn test_static_root_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();

        config.server.static_dir = Some(dir.path().to_path_buf());
        assert_eq!(config.static_root(), Some(dir.path()));

        config.server.static_dir = Some(dir.path().join("missing"));
        assert!(config.static_root().is_none());

        config.server.static_dir = None;
        assert!(config.static_root().is_none());
    }
}
