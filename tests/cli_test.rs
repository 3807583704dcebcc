//! Tests for command dispatch against a temporary tree document

use std::path::Path;

use clap::Parser;
use tempfile::TempDir;

use splittree::cli::args::Cli;
use splittree::cli::commands::execute_command;
use splittree::cli::CliError;
use splittree::config::Settings;
use splittree::exitcode;
use splittree::infrastructure::di::ServiceContainer;
use splittree::infrastructure::traits::RealFileSystem;

fn run(file: &Path, args: &[&str]) -> Result<(), CliError> {
    let mut argv = vec!["splittree", "--file", file.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::parse_from(argv);
    let container =
        ServiceContainer::with_deps(Settings::default(), std::sync::Arc::new(RealFileSystem));
    execute_command(&cli, &container)
}

fn load(file: &Path) -> splittree::domain::SplitTree {
    let container = ServiceContainer::new(Settings::default());
    container.documents().load_file(file).unwrap()
}

#[test]
fn given_no_document_when_showing_then_noinput() {
    let temp = TempDir::new().unwrap();
    let err = run(&temp.path().join("tree.json"), &["show"]).unwrap_err();
    assert_eq!(err.exit_code(), exitcode::NOINPUT);
}

#[test]
fn given_new_tree_when_validating_then_dataerr_until_addresses_set() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tree.json");
    run(&file, &["new", "--name", "Payroll"]).unwrap();

    let err = run(&file, &["validate"]).unwrap_err();
    assert_eq!(err.exit_code(), exitcode::DATAERR);

    let tree = load(&file);
    assert_eq!(tree.metadata.name, "Payroll");
    for recipient in &tree.root().recipients {
        run(&file, &["remove-recipient", recipient.id.as_str()]).unwrap();
    }
    run(&file, &["add-wallet", "Alice", "xch1alice", "6000"]).unwrap();
    run(&file, &["add-branch", "Team", "4000"]).unwrap();
    run(&file, &["add-wallet", "--branch", "Team", "Dana", "xch1dana", "10000"]).unwrap();

    run(&file, &["validate"]).unwrap();
    run(&file, &["resolve"]).unwrap();
    run(&file, &["resolve", "--percent"]).unwrap();
    run(&file, &["export"]).unwrap();
    run(&file, &["payload", "--branch", "Team"]).unwrap();

    let mapping_file = temp.path().join("out/mappings/mapping.json");
    run(&file, &["export", "--output", mapping_file.to_str().unwrap()]).unwrap();
    let mapping: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&mapping_file).unwrap()).unwrap();
    assert_eq!(mapping["recipients"].as_array().unwrap().len(), 2);

    // parent path is a regular file
    let unwritable = file.join("mapping.json");
    let err = run(&file, &["export", "--output", unwritable.to_str().unwrap()]).unwrap_err();
    assert_eq!(err.exit_code(), exitcode::IOERR);
}

#[test]
fn given_existing_document_when_creating_without_force_then_usage_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tree.json");
    run(&file, &["new"]).unwrap();

    let err = run(&file, &["new"]).unwrap_err();
    assert_eq!(err.exit_code(), exitcode::USAGE);
    assert_eq!(load(&file).metadata.name, "New Split Tree");
    run(&file, &["new", "--force", "--name", "Other"]).unwrap();
    assert_eq!(load(&file).metadata.name, "Other");
}

#[test]
fn given_referenced_branch_when_removed_via_cli_then_reference_gone() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tree.json");
    run(&file, &["new"]).unwrap();
    run(&file, &["add-branch", "Team", "0"]).unwrap();
    run(&file, &["add-ref", "to team", "Team", "0"]).unwrap();
    assert_eq!(load(&file).root().recipients.len(), 3);

    run(&file, &["remove-branch", "Team"]).unwrap();

    let tree = load(&file);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root().recipients.len(), 2);
}

#[test]
fn given_unresolved_child_when_requesting_payload_then_usage_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tree.json");
    run(&file, &["new"]).unwrap();
    run(&file, &["add-branch", "Team", "0"]).unwrap();

    let root = load(&file).root_id().to_string();
    let err = run(&file, &["payload", "--branch", &root]).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::USAGE);
    assert!(err.to_string().contains("has no real address"));
}

#[test]
fn given_fees_command_when_run_then_resolvable_branches_annotated() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tree.json");
    run(&file, &["new"]).unwrap();

    run(&file, &["fees"]).unwrap();

    let tree = load(&file);
    assert_eq!(tree.root().fee_basis_points, Some(25));
    assert_eq!(tree.root().net_basis_points, Some(9975));
}
