//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use fund_core::WeightingStrategy;
use fund_db::Period;

/// History database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the Atuin history database.
    pub path: PathBuf,

    /// Path to the local unknowns database.
    pub unknowns_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            // Atuin uses ~/.local/share/atuin on every platform
            path: home.join(".local/share/atuin/history.db"),
            unknowns_path: data_dir.join("unknowns.db"),
        }
    }
}

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Default time period when none is given on the command line.
    pub default_period: Period,

    /// Hostnames to drop from analysis (useful for work machines).
    pub exclude_hostnames: Vec<String>,

    /// Executables to drop from analysis.
    pub exclude_executables: Vec<String>,

    /// Count shell builtins (cd, echo, ...) as usage.
    pub include_builtins: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_period: Period::Month,
            exclude_hostnames: Vec::new(),
            exclude_executables: Vec::new(),
            include_builtins: false,
        }
    }
}

/// Donation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DonationConfig {
    /// Default donation amount in USD.
    pub default_amount: f64,

    /// Minimum donation per project.
    pub min_per_project: f64,

    /// Maximum number of funded projects.
    pub max_projects: usize,

    /// Weighting strategy.
    pub weighting: WeightingStrategy,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            default_amount: 10.0,
            min_per_project: 1.0,
            max_projects: 10,
            weighting: WeightingStrategy::Count,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub analysis: AnalysisConfig,
    pub donation: DonationConfig,

    /// User executable → project id overrides.
    pub custom_mappings: BTreeMap<String, String>,
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally merging a specific file last.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(path) = default_config_file() {
            figment = figment.merge(Toml::file(path));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FUND_*, nested keys split on __)
        figment = figment.merge(Env::prefixed("FUND_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for fund.
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fund"))
}

/// Returns the default config file path.
pub fn default_config_file() -> Option<PathBuf> {
    dirs_config_path().map(|p| p.join("config.toml"))
}

/// Returns the platform-specific data directory for fund.
///
/// On Linux: `~/.local/share/fund`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("fund"))
}

/// Default configuration file content written by `fund config --init`.
pub fn default_config_content() -> &'static str {
    r#"# fund configuration

[database]
# Path to the Atuin history database
# path = "~/.local/share/atuin/history.db"

[analysis]
# Default time period for analysis: day, week, month, year, all
default_period = "month"

# Hostnames to exclude from analysis (useful for work machines)
exclude_hostnames = []

# Executables to exclude from analysis
exclude_executables = []

# Include shell builtins (cd, echo, ...) in analysis
include_builtins = false

[donation]
# Default donation amount in USD
default_amount = 10.00

# Minimum donation per project (smaller shares are redistributed)
min_per_project = 1.00

# Maximum number of projects to fund
max_projects = 10

# Weighting strategy: count, duration, success, combined
weighting = "count"

[custom_mappings]
# Map custom executables to known projects
# my-git-wrapper = "git"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_fund() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "fund");
    }

    #[test]
    fn test_default_database_is_atuin_history() {
        let config = Config::default();
        assert!(config.database.path.ends_with(".local/share/atuin/history.db"));
    }

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = Config::default();
        assert!((config.donation.default_amount - 10.0).abs() < f64::EPSILON);
        assert!((config.donation.min_per_project - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.donation.max_projects, 10);
        assert_eq!(config.donation.weighting, WeightingStrategy::Count);
        assert_eq!(config.analysis.default_period, Period::Month);
        assert!(!config.analysis.include_builtins);
    }

    #[test]
    fn test_default_content_parses_to_defaults() {
        let parsed: Config = toml::from_str(default_config_content()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.analysis.default_period, defaults.analysis.default_period);
        assert_eq!(parsed.donation.max_projects, defaults.donation.max_projects);
        assert!(parsed.custom_mappings.is_empty());
    }
}
