//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SlistError};
use crate::scanner::checksum::{DEFAULT_BUFFER_BYTES, MIN_BUFFER_BYTES};
use crate::scanner::walker::WalkerConfig;
use crate::snapshot::format::fnv1a_64;

/// Upper bound on walker threads accepted by validation.
pub const MAX_PARALLELISM: usize = 256;

/// Upper bound on the checksum read buffer (64 MiB).
pub const MAX_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Full slist configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub walker: WalkerSettings,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Tree-walker behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WalkerSettings {
    pub follow_symlinks: bool,
    pub cross_devices: bool,
    pub relative_paths: bool,
    pub excluded_paths: Vec<PathBuf>,
    pub parallelism: usize,
    pub checksum_buffer_bytes: usize,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    /// Used when the primary path cannot be written.
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Filesystem paths used by slist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            cross_devices: true,
            relative_paths: false,
            excluded_paths: Vec::new(),
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().clamp(1, 8)),
            checksum_buffer_bytes: DEFAULT_BUFFER_BYTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data = home_dir().join(".local").join("share").join("slist");
        Self {
            enabled: false,
            jsonl_path: data.join("activity.jsonl"),
            fallback_path: Some(env::temp_dir().join("slist-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir().join(".config").join("slist").join("config.toml"),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[SLIST-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

impl WalkerSettings {
    /// Walker configuration for these settings.
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            cross_devices: self.cross_devices,
            relative_paths: self.relative_paths,
            excluded_paths: self.excluded_paths.iter().cloned().collect::<HashSet<_>>(),
            parallelism: self.parallelism,
            checksum_buffer_bytes: self.checksum_buffer_bytes,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_var)
    }

    fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|e| SlistError::io(&path_buf, e))?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit_path {
            return Err(SlistError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        Ok(format!("{:016x}", fnv1a_64(canonical.as_bytes())))
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SlistError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // walker
        set_bool(&mut lookup, "SLIST_WALKER_FOLLOW_SYMLINKS", &mut self.walker.follow_symlinks)?;
        set_bool(&mut lookup, "SLIST_WALKER_CROSS_DEVICES", &mut self.walker.cross_devices)?;
        set_bool(&mut lookup, "SLIST_WALKER_RELATIVE_PATHS", &mut self.walker.relative_paths)?;
        set_parsed(&mut lookup, "SLIST_WALKER_PARALLELISM", &mut self.walker.parallelism)?;
        set_parsed(
            &mut lookup,
            "SLIST_WALKER_CHECKSUM_BUFFER_BYTES",
            &mut self.walker.checksum_buffer_bytes,
        )?;
        if let Some(raw) = lookup("SLIST_WALKER_EXCLUDED_PATHS") {
            self.walker.excluded_paths = env::split_paths(&raw).collect();
        }

        // logging
        set_bool(&mut lookup, "SLIST_LOGGING_ENABLED", &mut self.logging.enabled)?;
        if let Some(raw) = lookup("SLIST_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SLIST_LOGGING_FALLBACK_PATH") {
            self.logging.fallback_path = Some(PathBuf::from(raw));
        }
        set_parsed(
            &mut lookup,
            "SLIST_LOGGING_MAX_SIZE_BYTES",
            &mut self.logging.max_size_bytes,
        )?;
        set_parsed(
            &mut lookup,
            "SLIST_LOGGING_MAX_ROTATED_FILES",
            &mut self.logging.max_rotated_files,
        )?;

        Ok(())
    }

    /// Normalize paths for consistent comparison.
    fn normalize_paths(&mut self) {
        for path in &mut self.walker.excluded_paths {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let walker = &self.walker;
        if walker.parallelism == 0 || walker.parallelism > MAX_PARALLELISM {
            return Err(SlistError::InvalidConfig {
                details: format!(
                    "walker.parallelism must be in [1, {MAX_PARALLELISM}], got {}",
                    walker.parallelism
                ),
            });
        }
        if !(MIN_BUFFER_BYTES..=MAX_BUFFER_BYTES).contains(&walker.checksum_buffer_bytes) {
            return Err(SlistError::InvalidConfig {
                details: format!(
                    "walker.checksum_buffer_bytes must be in [{MIN_BUFFER_BYTES}, {MAX_BUFFER_BYTES}], got {}",
                    walker.checksum_buffer_bytes
                ),
            });
        }
        if let Some(relative) = walker.excluded_paths.iter().find(|p| !p.is_absolute()) {
            return Err(SlistError::InvalidConfig {
                details: format!(
                    "walker.excluded_paths entries must be absolute, got {}",
                    relative.display()
                ),
            });
        }

        let logging = &self.logging;
        if logging.enabled && logging.jsonl_path.as_os_str().is_empty() {
            return Err(SlistError::InvalidConfig {
                details: "logging.jsonl_path must be set when logging is enabled".to_string(),
            });
        }
        if logging.max_size_bytes == 0 {
            return Err(SlistError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn set_parsed<F, T>(lookup: &mut F, name: &str, slot: &mut T) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<T>().map_err(|error| SlistError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SlistError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}
