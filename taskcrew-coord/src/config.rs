//! Configuration system for the `taskcrew` coordinator.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskcrew/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::coordinator::CrewConfig;
use crate::rebalancer::MAX_REBALANCE_INTERVAL;

/// Errors that can occur when loading coordinator configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A resolved value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CoordConfigFile {
    capacity: CapacityFileConfig,
    fleet: FleetFileConfig,
    rebalance: RebalanceFileConfig,
    server: ServerFileConfig,
    state: StateFileConfig,
}

/// `[capacity]` section: per-role maximum concurrent tasks.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CapacityFileConfig {
    manager: Option<u32>,
    engineer: Option<u32>,
    tester: Option<u32>,
}

/// `[fleet]` section: how many engineers and testers to register.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct FleetFileConfig {
    engineers: Option<usize>,
    testers: Option<usize>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RebalanceFileConfig {
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StateFileConfig {
    snapshot_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the coordinator.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "taskcrew task coordinator")]
pub struct CoordCliArgs {
    /// Address to bind the command socket to.
    #[arg(short, long, env = "TASKCREW_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskcrew/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent tasks for the manager.
    #[arg(long, env = "MANAGER_MAX_CAPACITY")]
    pub manager_capacity: Option<u32>,

    /// Maximum concurrent tasks per engineer.
    #[arg(long, env = "ENGINEER_MAX_CAPACITY")]
    pub engineer_capacity: Option<u32>,

    /// Maximum concurrent tasks per tester.
    #[arg(long, env = "TESTER_MAX_CAPACITY")]
    pub tester_capacity: Option<u32>,

    /// Number of engineers.
    #[arg(long)]
    pub engineers: Option<usize>,

    /// Number of testers.
    #[arg(long)]
    pub testers: Option<usize>,

    /// Seconds between rebalance passes.
    #[arg(long)]
    pub rebalance_interval: Option<u64>,

    /// Snapshot file loaded at startup and written on shutdown.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Create the demo tasks on startup.
    #[arg(long)]
    pub seed_demo: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKCREW_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordConfig {
    pub crew: CrewConfig,
    /// Time between rebalance passes.
    pub rebalance_interval: Duration,
    /// Address to bind the command socket to (e.g., `127.0.0.1:7411`).
    pub bind_addr: String,
    pub snapshot_path: Option<PathBuf>,
    pub seed_demo: bool,
    /// Log level filter string.
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            crew: CrewConfig::default(),
            rebalance_interval: Duration::from_secs(60),
            bind_addr: "127.0.0.1:7411".to_string(),
            snapshot_path: None,
            seed_demo: false,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl CoordConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if the rebalance interval resolves to zero or to more
    /// than [`MAX_REBALANCE_INTERVAL`].
    pub fn load(cli: &CoordCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rebalance_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "rebalance interval must be at least one second".into(),
            ));
        }
        if self.rebalance_interval > MAX_REBALANCE_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "rebalance interval must be at most {} seconds",
                MAX_REBALANCE_INTERVAL.as_secs()
            )));
        }
        Ok(())
    }

    /// Resolve a `CoordConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CoordCliArgs, file: &CoordConfigFile) -> Self {
        let defaults = Self::default();
        let crew = CrewConfig {
            manager_capacity: cli
                .manager_capacity
                .or(file.capacity.manager)
                .unwrap_or(defaults.crew.manager_capacity),
            engineer_capacity: cli
                .engineer_capacity
                .or(file.capacity.engineer)
                .unwrap_or(defaults.crew.engineer_capacity),
            tester_capacity: cli
                .tester_capacity
                .or(file.capacity.tester)
                .unwrap_or(defaults.crew.tester_capacity),
            engineers: cli
                .engineers
                .or(file.fleet.engineers)
                .unwrap_or(defaults.crew.engineers),
            testers: cli
                .testers
                .or(file.fleet.testers)
                .unwrap_or(defaults.crew.testers),
        };

        Self {
            crew,
            rebalance_interval: cli
                .rebalance_interval
                .or(file.rebalance.interval_secs)
                .map_or(defaults.rebalance_interval, Duration::from_secs),
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            snapshot_path: cli
                .snapshot
                .clone()
                .or_else(|| file.state.snapshot_path.clone()),
            seed_demo: cli.seed_demo,
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the coordinator.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<CoordConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(CoordConfigFile::default());
        };
        config_dir.join("taskcrew").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CoordConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
