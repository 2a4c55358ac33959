//! Configuration management for the circulation desk
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (circulation.toml)
//! - Environment variables (CIRCULATION__*)
//!
//! ## Example config file (circulation.toml):
//! ```toml
//! [storage]
//! root = "./data"
//!
//! [state]
//! path = "./circulation-state.toml"
//!
//! [discovery]
//! members_prefix = "Members"
//! items_prefix = "Items"
//! transactions_prefix = "Transactions"
//!
//! [loans]
//! default_period_days = 14
//! default_extension_days = 14
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema::EntityKind;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the tabular resources live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Durable key/value state
    #[serde(default)]
    pub state: StateConfig,

    /// Resource name prefixes
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Loan periods
    #[serde(default)]
    pub loans: LoanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory searched for `<name>.csv` resources
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// TOML file holding resolved addresses
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_members_prefix")]
    pub members_prefix: String,

    #[serde(default = "default_items_prefix")]
    pub items_prefix: String,

    #[serde(default = "default_transactions_prefix")]
    pub transactions_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanConfig {
    /// Loan period used when a checkout names none
    #[serde(default = "default_period_days")]
    pub default_period_days: u32,

    /// Extension used when an extend request names none
    #[serde(default = "default_period_days")]
    pub default_extension_days: u32,
}

// Default value functions
fn default_storage_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./circulation-state.toml")
}

fn default_members_prefix() -> String {
    EntityKind::Member.default_prefix().to_string()
}

fn default_items_prefix() -> String {
    EntityKind::Item.default_prefix().to_string()
}

fn default_transactions_prefix() -> String {
    EntityKind::Transaction.default_prefix().to_string()
}

fn default_period_days() -> u32 {
    14
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            members_prefix: default_members_prefix(),
            items_prefix: default_items_prefix(),
            transactions_prefix: default_transactions_prefix(),
        }
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            default_period_days: default_period_days(),
            default_extension_days: default_period_days(),
        }
    }
}

impl DiscoveryConfig {
    pub fn prefix(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Member => &self.members_prefix,
            EntityKind::Item => &self.items_prefix,
            EntityKind::Transaction => &self.transactions_prefix,
        }
    }
}

impl AppConfig {
    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "circulation.toml",
            ".circulation.toml",
            "config/circulation.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("org", "circulation", "desk") {
            let xdg_config = config_dir.config_dir().join("circulation.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CIRCULATION")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
