//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SLLP_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use sllp_core::{CoreError, MemoryCurve, Registry, VarData, VariableDef};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 4000;

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Variables and curves served.
    pub registry: RegistryConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SLLP_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
    }

    /// Checks the registry section before anything is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds (0 = never).
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 16,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("SLLP_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("SLLP_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("SLLP_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns idle timeout as Duration, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Variables and curves registered at startup, in id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub variables: Vec<VariableConfig>,
    pub curves: Vec<CurveConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            variables: vec![
                VariableConfig {
                    name: "DIGIN".to_string(),
                    size: 1,
                    writable: false,
                    initial: None,
                },
                VariableConfig {
                    name: "DIGOUT".to_string(),
                    size: 1,
                    writable: true,
                    initial: None,
                },
            ],
            curves: Vec::new(),
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for var in &self.variables {
            if var.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "variable name must not be empty".to_string(),
                ));
            }
            if let Some(initial) = &var.initial {
                if initial.len() != var.size as usize {
                    return Err(ConfigError::ValidationError(format!(
                        "variable '{}': initial value has {} bytes, size is {}",
                        var.name,
                        initial.len(),
                        var.size
                    )));
                }
            }
        }

        for curve in &self.curves {
            if curve.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "curve name must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Builds a registry from this section.
    ///
    /// Each variable and curve gets its name as user tag. Curves are backed
    /// by zeroed memory.
    pub fn build(&self) -> Result<Registry, CoreError> {
        let mut registry = Registry::new();

        for var in &self.variables {
            let data = match &var.initial {
                Some(initial) => VarData::new(initial.clone()),
                None => VarData::zeroed(var.size as usize),
            };
            let def = if var.writable {
                VariableDef::writable(data)
            } else {
                VariableDef::read_only(data)
            };
            registry.register_variable(def.with_user(var.name.clone()))?;
        }

        for curve in &self.curves {
            let memory = MemoryCurve::new(curve.nblocks);
            let def = if curve.writable {
                memory.writable_def()
            } else {
                memory.read_only_def()
            };
            registry.register_curve(def.with_user(curve.name.clone()))?;
        }

        Ok(registry)
    }
}

/// A variable served by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    /// Size in bytes, 1..=127.
    pub size: u8,
    #[serde(default)]
    pub writable: bool,
    /// Initial value; zeroed when absent.
    #[serde(default)]
    pub initial: Option<Vec<u8>>,
}

/// A memory-backed curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    pub name: String,
    /// Highest block index.
    pub nblocks: u8,
    #[serde(default)]
    pub writable: bool,
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializes `SocketAddr` as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sllp_core::{GROUP_READ_ID, GROUP_WRITE_ID};
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.network.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.registry.variables.len(), 2);
        assert!(config.registry.curves.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_idle_timeout_disabled() {
        let network = NetworkConfig {
            idle_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(network.idle_timeout(), None);
    }

    #[test]
    fn test_default_registry() {
        let registry = RegistryConfig::default().build().unwrap();

        let digin = registry.variable(0).unwrap();
        assert!(!digin.is_writable());
        assert_eq!(digin.size(), 1);
        assert_eq!(digin.user::<String>().map(String::as_str), Some("DIGIN"));

        let digout = registry.variable(1).unwrap();
        assert!(digout.is_writable());
        assert_eq!(digout.user::<String>().map(String::as_str), Some("DIGOUT"));

        assert_eq!(registry.group(GROUP_READ_ID).unwrap().members(), &[0]);
        assert_eq!(registry.group(GROUP_WRITE_ID).unwrap().members(), &[1]);
    }

    #[test]
    fn test_yaml_registry() {
        let yaml = r#"
network:
  bind_addr: "0.0.0.0:5000"
registry:
  variables:
    - name: SETPOINT
      size: 4
      writable: true
      initial: [1, 2, 3, 4]
    - name: STATUS
      size: 2
  curves:
    - name: RAMP
      nblocks: 3
      writable: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.network.bind_addr.port(), 5000);
        // Unset fields keep their defaults
        assert_eq!(config.network.idle_timeout_secs, 300);

        let registry = config.registry.build().unwrap();
        let setpoint = registry.variable(0).unwrap();
        assert_eq!(setpoint.data().to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(registry.variable(1).unwrap().data().to_vec(), vec![0, 0]);
        assert!(!registry.variable(1).unwrap().is_writable());

        let ramp = registry.curve(0).unwrap();
        assert!(ramp.is_writable());
        assert_eq!(ramp.nblocks(), 3);
        assert_eq!(ramp.user::<String>().map(String::as_str), Some("RAMP"));
    }

    #[test]
    fn test_validation_initial_size() {
        let mut config = Config::default();
        config.registry.variables[0].initial = Some(vec![1, 2]);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("DIGIN"));
    }

    #[test]
    fn test_build_rejects_bad_size() {
        let config = RegistryConfig {
            variables: vec![VariableConfig {
                name: "WIDE".to_string(),
                size: 200,
                writable: false,
                initial: None,
            }],
            curves: Vec::new(),
        };
        assert!(matches!(
            config.build(),
            Err(CoreError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sllp.yaml");

        let mut config = Config::default();
        config.registry.curves.push(CurveConfig {
            name: "WAVE".to_string(),
            nblocks: 1,
            writable: false,
        });
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "network: [not, a, map]").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }
}
