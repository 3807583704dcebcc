//! Integration tests for Settings config loading with layered precedence.
//!
//! These tests run without a global config (temp directories only), so they
//! exercise local config and environment overrides on top of the defaults.
//! Everything touching environment variables lives in one test to keep the
//! process environment stable for the others.

use std::fs;

use tempfile::TempDir;

use splittree::application::ApplicationError;
use splittree::config::{local_config_path, Settings};

#[test]
fn given_local_config_when_loading_then_overrides_only_given_fields() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        r#"
branch_fee_basis_points = 40
default_tree_name = "Royalties"
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings.branch_fee_basis_points, 40);
    assert_eq!(settings.default_tree_name, "Royalties");
    assert_eq!(settings.creation_timeout_secs, 30);
}

#[test]
fn given_fee_consuming_whole_budget_when_loading_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "branch_fee_basis_points = 10000\n",
    )
    .unwrap();

    let result = Settings::load(Some(dir.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_malformed_local_config_when_loading_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "creation_timeout_secs = \"soon\"\n").unwrap();

    let result = Settings::load(Some(dir.path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_env_var_and_local_config_when_loading_then_env_wins() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "service_fee_basis_points = 200\ncreation_timeout_secs = 10\n",
    )
    .unwrap();
    std::env::set_var("SPLITTREE_SERVICE_FEE_BASIS_POINTS", "175");

    let settings = Settings::load(Some(dir.path()));
    std::env::remove_var("SPLITTREE_SERVICE_FEE_BASIS_POINTS");
    let settings = settings.expect("load settings");

    assert_eq!(settings.service_fee_basis_points, 175);
    assert_eq!(settings.creation_timeout_secs, 10);
}
