//! Configuration file parsing for Crowsnest
//!
//! Parses `crowsnest.toml` configuration files using serde. Every value is
//! read once at startup and fixed for the life of the process.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Label Docker Compose attaches to every container of a project
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Largest stop timeout the Docker API accepts
pub const MAX_RESTART_TIMEOUT: u64 = i32::MAX as u64;

/// Load configuration from a file
///
/// A missing file is only tolerated when `allow_missing` is set, in which case
/// the built-in defaults are used.
pub fn load(path: &Path, allow_missing: bool) -> Result<CrowsnestConfig> {
    if allow_missing && !path.exists() {
        let config = CrowsnestConfig::default();
        config.validate()?;
        return Ok(config);
    }

    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = parse(&content)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from TOML text, filling in the default roster
pub fn parse(content: &str) -> Result<CrowsnestConfig> {
    let mut config: CrowsnestConfig = toml::from_str(content)?;
    if config.services.is_empty() {
        config.services = default_services();
    }
    Ok(config)
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct CrowsnestConfig {
    /// Global settings
    #[serde(default)]
    pub config: WatchConfig,

    /// Monitored services
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl Default for CrowsnestConfig {
    fn default() -> Self {
        Self {
            config: WatchConfig::default(),
            services: default_services(),
        }
    }
}

impl CrowsnestConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.config.project.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "Project name must not be empty".to_string(),
            ));
        }
        if self.config.interval == 0 {
            return Err(Error::ConfigValidation(
                "Cycle interval must be at least one second".to_string(),
            ));
        }
        if self.config.probe_timeout == 0 {
            return Err(Error::ConfigValidation(
                "Probe timeout must be at least one second".to_string(),
            ));
        }
        if self.config.restart_timeout > MAX_RESTART_TIMEOUT {
            return Err(Error::ConfigValidation(format!(
                "Restart timeout must not exceed {} seconds",
                MAX_RESTART_TIMEOUT
            )));
        }
        if self.config.default_host.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "Default host must not be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(Error::ConfigValidation(
                    "Service name must not be empty".to_string(),
                ));
            }
            if !names.insert(&service.name) {
                return Err(Error::ConfigValidation(format!(
                    "Duplicate service name: {}",
                    service.name
                )));
            }
            if service.port == 0 {
                return Err(Error::ConfigValidation(format!(
                    "Service '{}' has port 0",
                    service.name
                )));
            }
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the file values
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(project) = &overrides.project {
            self.config.project = project.clone();
        }
        if let Some(interval) = overrides.interval {
            self.config.interval = interval;
        }
        if let Some(timeout) = overrides.probe_timeout {
            self.config.probe_timeout = timeout;
        }
        if let Some(timeout) = overrides.restart_timeout {
            self.config.restart_timeout = timeout;
        }

        for (name, port) in &overrides.ports {
            let service = self
                .services
                .iter_mut()
                .find(|s| &s.name == name)
                .ok_or_else(|| {
                    Error::ConfigValidation(format!("Port override for unknown service '{}'", name))
                })?;
            service.port = *port;
        }

        self.validate()
    }

    /// Get a service definition by name
    #[cfg(test)]
    pub fn get_service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Values supplied on the command line that take precedence over the file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub project: Option<String>,
    pub interval: Option<u64>,
    pub probe_timeout: Option<u64>,
    pub restart_timeout: Option<u64>,
    pub ports: Vec<(String, u16)>,
}

/// Parse a `NAME=PORT` pair
pub fn parse_port_override(raw: &str) -> std::result::Result<(String, u16), String> {
    let (name, port) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PORT, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing service name in '{}'", raw));
    }
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|e| format!("invalid port in '{}': {}", raw, e))?;
    Ok((name.to_string(), port))
}

/// Global settings
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Value of the compose project label containers must carry
    #[serde(default = "default_project")]
    pub project: String,

    /// Seconds to wait between cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Seconds allowed for each HTTP probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    /// Seconds the runtime waits for a container to stop before killing it
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout: u64,

    /// Host every service's hint starts at
    #[serde(default = "default_host")]
    pub default_host: String,
}

impl WatchConfig {
    /// Cycle interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Probe timeout as Duration
    pub fn probe_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }

    /// Restart stop timeout as Duration
    pub fn restart_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.restart_timeout)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            interval: default_interval(),
            probe_timeout: default_probe_timeout(),
            restart_timeout: default_restart_timeout(),
            default_host: default_host(),
        }
    }
}

fn default_project() -> String {
    "media-stack".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_restart_timeout() -> u64 {
    30
}

fn default_host() -> String {
    "localhost".to_string()
}

/// A monitored service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDef {
    /// Service name, also used as a hostname candidate
    pub name: String,
    /// TCP port the service answers HTTP on
    pub port: u16,
}

impl ServiceDef {
    pub fn new(name: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            port,
        }
    }
}

/// The stack watched when no services are configured
pub fn default_services() -> Vec<ServiceDef> {
    vec![
        ServiceDef::new("prowlarr", 9696),
        ServiceDef::new("bazarr", 6767),
        ServiceDef::new("sonarr", 8989),
        ServiceDef::new("radarr", 7878),
        ServiceDef::new("qbittorrent", 5080),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.config.project, "media-stack");
        assert_eq!(config.config.interval, 60);
        assert_eq!(config.config.probe_timeout, 3);
        assert_eq!(config.config.restart_timeout, 30);
        assert_eq!(config.config.default_host, "localhost");
        assert_eq!(config.services.len(), 5);
        assert_eq!(config.get_service("sonarr").unwrap().port, 8989);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[config]
project = "homelab"
interval = 120
probe_timeout = 5
restart_timeout = 10
default_host = "127.0.0.1"

[[services]]
name = "jellyfin"
port = 8096

[[services]]
name = "sonarr"
port = 8989
"#;

        let config = parse(toml).unwrap();
        assert_eq!(config.config.project, "homelab");
        assert_eq!(config.config.interval_duration(), Duration::from_secs(120));
        assert_eq!(config.config.probe_timeout_duration(), Duration::from_secs(5));
        assert_eq!(config.config.restart_timeout_duration(), Duration::from_secs(10));
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0], ServiceDef::new("jellyfin", 8096));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_service_error() {
        let toml = r#"
[[services]]
name = "sonarr"
port = 8989

[[services]]
name = "sonarr"
port = 8990
"#;

        let config = parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_error() {
        let toml = r#"
[[services]]
name = "sonarr"
port = 0
"#;

        let config = parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_error() {
        let toml = r#"
[config]
interval = 0
"#;

        let config = parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = CrowsnestConfig::default();
        let overrides = Overrides {
            project: Some("arr".to_string()),
            restart_timeout: Some(5),
            ports: vec![("radarr".to_string(), 17878)],
            ..Default::default()
        };

        config.apply_overrides(&overrides).unwrap();
        assert_eq!(config.config.project, "arr");
        assert_eq!(config.config.restart_timeout, 5);
        assert_eq!(config.config.interval, 60);
        assert_eq!(config.get_service("radarr").unwrap().port, 17878);
    }

    #[test]
    fn test_restart_timeout_upper_bound() {
        let mut config = CrowsnestConfig::default();
        let overrides = Overrides {
            restart_timeout: Some(u64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            config.apply_overrides(&overrides),
            Err(Error::ConfigValidation(_))
        ));

        let mut config = CrowsnestConfig::default();
        let overrides = Overrides {
            restart_timeout: Some(MAX_RESTART_TIMEOUT),
            ..Default::default()
        };
        assert!(config.apply_overrides(&overrides).is_ok());
    }

    #[test]
    fn test_override_unknown_service() {
        let mut config = CrowsnestConfig::default();
        let overrides = Overrides {
            ports: vec![("plex".to_string(), 32400)],
            ..Default::default()
        };
        assert!(config.apply_overrides(&overrides).is_err());
    }

    #[test]
    fn test_parse_port_override() {
        assert_eq!(
            parse_port_override("sonarr=8989").unwrap(),
            ("sonarr".to_string(), 8989)
        );
        assert!(parse_port_override("sonarr").is_err());
        assert!(parse_port_override("=8989").is_err());
        assert!(parse_port_override("sonarr=http").is_err());
        assert!(parse_port_override("sonarr=70000").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crowsnest.toml");

        assert!(matches!(load(&path, false), Err(Error::ConfigRead { .. })));
        assert_eq!(load(&path, true).unwrap().services.len(), 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[config]\nproject = \"arr\"\n\n[[services]]\nname = \"lidarr\"\nport = 8686"
        )
        .unwrap();

        let config = load(file.path(), false).unwrap();
        assert_eq!(config.config.project, "arr");
        assert_eq!(config.services, vec![ServiceDef::new("lidarr", 8686)]);
    }
}
