//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/splittree/splittree.toml`
//! 3. Local config: `<dir>/.splittree.toml` (current directory unless given)
//! 4. Environment variables: `SPLITTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::basis_points::{
    DEFAULT_BRANCH_FEE_BASIS_POINTS, DEFAULT_SERVICE_FEE_BASIS_POINTS, MAX_BASIS_POINTS,
};

const DEFAULT_CREATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TREE_NAME: &str = "New Split Tree";

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub service_fee_basis_points: Option<u32>,
    pub branch_fee_basis_points: Option<u32>,
    pub creation_timeout_secs: Option<u64>,
    pub default_tree_name: Option<String>,
}

/// Unified configuration for splittree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Cut kept by the address-creation service, out of 10000
    pub service_fee_basis_points: u32,
    /// Fee recorded on every resolvable branch by `fees`
    pub branch_fee_basis_points: u32,
    /// Deadline for a single address-creation call
    pub creation_timeout_secs: u64,
    /// Name given to trees created without one
    pub default_tree_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_fee_basis_points: DEFAULT_SERVICE_FEE_BASIS_POINTS,
            branch_fee_basis_points: DEFAULT_BRANCH_FEE_BASIS_POINTS,
            creation_timeout_secs: DEFAULT_CREATION_TIMEOUT_SECS,
            default_tree_name: DEFAULT_TREE_NAME.to_string(),
        }
    }
}

/// Get the XDG config directory for splittree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "splittree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("splittree.toml"))
}

/// Get the path to the local config file in `dir`.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".splittree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            service_fee_basis_points: overlay
                .service_fee_basis_points
                .unwrap_or(self.service_fee_basis_points),
            branch_fee_basis_points: overlay
                .branch_fee_basis_points
                .unwrap_or(self.branch_fee_basis_points),
            creation_timeout_secs: overlay
                .creation_timeout_secs
                .unwrap_or(self.creation_timeout_secs),
            default_tree_name: overlay
                .default_tree_name
                .clone()
                .unwrap_or_else(|| self.default_tree_name.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Directory holding `.splittree.toml`; the current directory if `None`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("global config: {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        let local_path = match local_dir {
            Some(dir) => local_config_path(dir),
            None => local_config_path(Path::new(".")),
        };
        if local_path.exists() {
            debug!("local config: {}", local_path.display());
            current = current.merge_with(&load_raw_settings(&local_path)?);
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply SPLITTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SPLITTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_int("service_fee_basis_points") {
            settings.service_fee_basis_points = to_u32("service_fee_basis_points", val)?;
        }
        if let Ok(val) = config.get_int("branch_fee_basis_points") {
            settings.branch_fee_basis_points = to_u32("branch_fee_basis_points", val)?;
        }
        if let Ok(val) = config.get_int("creation_timeout_secs") {
            settings.creation_timeout_secs =
                u64::try_from(val).map_err(|_| ApplicationError::Config {
                    message: format!("creation_timeout_secs must not be negative: {}", val),
                })?;
        }
        if let Ok(val) = config.get_string("default_tree_name") {
            settings.default_tree_name = val;
        }

        Ok(settings)
    }

    /// Reject values that would make fee rescaling impossible.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.service_fee_basis_points >= MAX_BASIS_POINTS {
            return Err(ApplicationError::Config {
                message: format!(
                    "service_fee_basis_points must be below {}, got {}",
                    MAX_BASIS_POINTS, self.service_fee_basis_points
                ),
            });
        }
        if self.branch_fee_basis_points >= MAX_BASIS_POINTS {
            return Err(ApplicationError::Config {
                message: format!(
                    "branch_fee_basis_points must be below {}, got {}",
                    MAX_BASIS_POINTS, self.branch_fee_basis_points
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# splittree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/splittree/splittree.toml
#   Local:  ./.splittree.toml
#   Env:    SPLITTREE_* environment variables (e.g. SPLITTREE_SERVICE_FEE_BASIS_POINTS=150)

# Cut kept by the address-creation service (basis points, out of 10000)
# service_fee_basis_points = 150

# Fee recorded on each resolvable branch by `splittree fees`
# branch_fee_basis_points = 25

# Seconds to wait for one address-creation call
# creation_timeout_secs = 30

# Name for trees created without --name
# default_tree_name = "New Split Tree"
"#
        .to_string()
    }
}

fn to_u32(key: &str, val: i64) -> Result<u32, ApplicationError> {
    u32::try_from(val).map_err(|_| ApplicationError::Config {
        message: format!("{} out of range: {}", key, val),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_settings_when_created_then_standard_fees() {
        let settings = Settings::default();
        assert_eq!(settings.service_fee_basis_points, 150);
        assert_eq!(settings.branch_fee_basis_points, 25);
        assert_eq!(settings.creation_timeout_secs, 30);
        assert_eq!(settings.default_tree_name, "New Split Tree");
    }

    #[test]
    fn given_partial_overlay_when_merging_then_unspecified_fields_inherited() {
        let base = Settings::default();
        let overlay = RawSettings {
            service_fee_basis_points: Some(200),
            default_tree_name: Some("Payroll".to_string()),
            ..Default::default()
        };

        let result = base.merge_with(&overlay);

        assert_eq!(result.service_fee_basis_points, 200);
        assert_eq!(result.default_tree_name, "Payroll");
        assert_eq!(result.branch_fee_basis_points, 25);
        assert_eq!(result.creation_timeout_secs, 30);
    }

    #[test]
    fn given_fee_of_whole_budget_when_validating_then_rejected() {
        let settings = Settings {
            service_fee_basis_points: 10_000,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_settings_when_serialized_then_template_keys_match() {
        let toml = Settings::default().to_toml().unwrap();
        for key in [
            "service_fee_basis_points",
            "branch_fee_basis_points",
            "creation_timeout_secs",
            "default_tree_name",
        ] {
            assert!(toml.contains(key), "{} missing from {}", key, toml);
            assert!(Settings::template().contains(key));
        }
    }
}
