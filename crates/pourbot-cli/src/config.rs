//! Node configuration – reads/writes `~/.pourbot/config.toml`.

use pourbot_types::NUM_CHANNELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted node configuration shared by both roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the control node listens on for the sensing peer.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Address the sensing node dials to reach the control node.
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Order file written by the recipe-entry application.
    #[serde(default = "default_recipe_path")]
    pub recipe_path: String,

    /// Scan rejection ceiling in meters; any sample past it discards the
    /// whole scan.
    #[serde(default = "default_max_range_m")]
    pub max_range_m: f32,

    /// Calibrated valve flow rates (oz/s), indexed by ingredient channel.
    #[serde(default = "default_flow_rates")]
    pub flow_rates_oz_per_s: [f32; NUM_CHANNELS],
}

fn default_listen_addr() -> String {
    "0.0.0.0:7878".to_string()
}
fn default_control_addr() -> String {
    "127.0.0.1:7878".to_string()
}
fn default_recipe_path() -> String {
    "orders.txt".to_string()
}
fn default_max_range_m() -> f32 {
    0.5
}
fn default_flow_rates() -> [f32; NUM_CHANNELS] {
    [0.2; NUM_CHANNELS]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            control_addr: default_control_addr(),
            recipe_path: default_recipe_path(),
            max_range_m: default_max_range_m(),
            flow_rates_oz_per_s: default_flow_rates(),
        }
    }
}

/// Return the path to `~/.pourbot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pourbot").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `POURBOT_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `POURBOT_LISTEN_ADDR` | `listen_addr` |
/// | `POURBOT_CONTROL_ADDR` | `control_addr` |
/// | `POURBOT_RECIPE_PATH` | `recipe_path` |
/// | `POURBOT_MAX_RANGE_M` | `max_range_m` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("POURBOT_LISTEN_ADDR") {
        cfg.listen_addr = v;
    }
    if let Ok(v) = std::env::var("POURBOT_CONTROL_ADDR") {
        cfg.control_addr = v;
    }
    if let Ok(v) = std::env::var("POURBOT_RECIPE_PATH") {
        cfg.recipe_path = v;
    }
    if let Ok(v) = std::env::var("POURBOT_MAX_RANGE_M")
        && let Ok(range) = v.parse::<f32>()
    {
        cfg.max_range_m = range;
    }
}

/// Save the config to disk, creating `~/.pourbot/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
