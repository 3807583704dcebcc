//! Command dispatch
//!
//! Every editing command loads the tree document without validating it (so a
//! broken tree can be repaired), applies one mutation and writes it back.

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{
    allocations_for, export_mapping, known_addresses, resolve_basis_points, validate,
    ApplicationError,
};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::{output, render};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{BranchId, RecipientId, SplitTree};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::submission::SplitSubmission;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli, container: &ServiceContainer) -> CliResult<()> {
    let file = cli.file.as_path();
    match &cli.command {
        Some(Commands::New { name, force }) => cmd_new(container, file, name.as_deref(), *force),
        Some(Commands::Show) => cmd_show(container, file),
        Some(Commands::Validate) => cmd_validate(container, file),
        Some(Commands::Resolve { percent }) => cmd_resolve(container, file, *percent),
        Some(Commands::Export { output }) => cmd_export(container, file, output.as_deref()),
        Some(Commands::Status) => cmd_status(container, file),
        Some(Commands::AddWallet {
            branch,
            name,
            address,
            basis_points,
        }) => cmd_add_wallet(container, file, branch.as_deref(), name, address, *basis_points),
        Some(Commands::AddBranch {
            parent,
            name,
            basis_points,
        }) => cmd_add_branch(container, file, parent.as_deref(), name, *basis_points),
        Some(Commands::AddRef {
            branch,
            name,
            target,
            basis_points,
        }) => cmd_add_ref(container, file, branch.as_deref(), name, target, *basis_points),
        Some(Commands::RemoveRecipient { branch, recipient }) => {
            cmd_remove_recipient(container, file, branch.as_deref(), recipient)
        }
        Some(Commands::RemoveBranch { parent, branch }) => {
            cmd_remove_branch(container, file, parent.as_deref(), branch)
        }
        Some(Commands::Fees { basis_points }) => cmd_fees(container, file, *basis_points),
        Some(Commands::Payload { branch }) => cmd_payload(container, file, branch),
        Some(Commands::Config { command }) => cmd_config(container, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see `splittree --help`".to_string(),
        )),
    }
}

fn load(container: &ServiceContainer, file: &Path) -> CliResult<SplitTree> {
    if !container.fs.exists(file) {
        return Err(CliError::MissingFile(file.to_path_buf()));
    }
    Ok(container.documents().load_file(file)?)
}

fn save(container: &ServiceContainer, file: &Path, tree: &SplitTree) -> CliResult<()> {
    Ok(container.documents().save_file(tree, file)?)
}

/// Branch by exact id, else by unique name; `None` is the root.
fn find_branch(tree: &SplitTree, key: Option<&str>) -> CliResult<BranchId> {
    let Some(key) = key else {
        return Ok(tree.root_id().clone());
    };
    let id = BranchId::from(key);
    if tree.contains(&id) {
        return Ok(id);
    }
    let matches: Vec<&BranchId> = tree
        .iter()
        .filter(|b| b.name == key)
        .map(|b| &b.id)
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => Err(CliError::InvalidArgs(format!("no branch named {}", key))),
        _ => Err(CliError::InvalidArgs(format!(
            "{} branches named {}, use the id",
            matches.len(),
            key
        ))),
    }
}

#[instrument(skip(container))]
fn cmd_new(
    container: &ServiceContainer,
    file: &Path,
    name: Option<&str>,
    force: bool,
) -> CliResult<()> {
    if container.fs.exists(file) && !force {
        return Err(CliError::Usage(format!(
            "{} already exists, use --force to overwrite",
            file.display()
        )));
    }
    let name = name.unwrap_or(container.settings.default_tree_name.as_str());
    let tree = SplitTree::new(name);
    save(container, file, &tree)?;
    output::action("Created", &format!("{} ({})", name, file.display()));
    Ok(())
}

fn cmd_show(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let tree = load(container, file)?;
    output::header(&tree.metadata.name);
    output::info(&render::to_tree_string(&tree));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_validate(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let tree = load(container, file)?;
    let report = validate(&tree);
    for warning in &report.warnings {
        output::warning(warning);
    }
    if !report.valid {
        for error in &report.errors {
            output::failure(error);
        }
        return Err(CliError::Invalid(report.errors.len()));
    }
    output::success(&format!("{} is valid", tree.metadata.name));
    Ok(())
}

fn cmd_resolve(container: &ServiceContainer, file: &Path, percent: bool) -> CliResult<()> {
    let tree = load(container, file)?;
    for (address, bp) in resolve_basis_points(&tree) {
        output::share(&address, bp, percent);
    }
    Ok(())
}

fn cmd_export(container: &ServiceContainer, file: &Path, target: Option<&Path>) -> CliResult<()> {
    let tree = load(container, file)?;
    let mapping = export_mapping(&tree)?;
    let json = serde_json::to_string_pretty(&mapping).map_err(|e| ApplicationError::Document {
        message: format!("cannot serialize mapping: {}", e),
    })?;
    match target {
        Some(path) => {
            container
                .fs
                .ensure_parent(path)
                .and_then(|()| container.fs.write(path, &json))
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action(
                "Exported",
                &format!("{} recipients to {}", mapping.recipients.len(), path.display()),
            );
        }
        None => output::info(&json),
    }
    Ok(())
}

fn cmd_status(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let tree = load(container, file)?;
    let resolvable: Vec<_> = tree.iter().filter(|b| b.is_resolvable).collect();
    let real = resolvable.iter().filter(|b| b.address.is_real()).count();

    output::header(&tree.metadata.name);
    output::detail(&format!("branches: {}", tree.len()));
    output::detail(&format!("resolvable: {} ({} with real address)", resolvable.len(), real));
    output::detail(&format!("depth: {}", tree.depth()));
    output::detail(&format!("updated: {}", tree.metadata.updated_at.to_rfc3339()));
    if tree.metadata.is_finalized {
        output::success("finalized");
    } else if tree.has_placeholders() {
        output::failure("placeholders remaining");
    } else {
        output::success("no placeholders");
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_add_wallet(
    container: &ServiceContainer,
    file: &Path,
    branch: Option<&str>,
    name: &str,
    address: &str,
    basis_points: u32,
) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let branch_id = find_branch(&tree, branch)?;
    let id = tree.add_fixed_wallet_recipient(&branch_id, name, address, basis_points)?;
    save(container, file, &tree)?;
    output::action("Added", &format!("{} <{}>", name, id));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_add_branch(
    container: &ServiceContainer,
    file: &Path,
    parent: Option<&str>,
    name: &str,
    basis_points: u32,
) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let parent_id = find_branch(&tree, parent)?;
    let id = tree.add_nested_branch(&parent_id, name, basis_points)?;
    save(container, file, &tree)?;
    output::action("Added", &format!("{} <{}>", name, id));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_add_ref(
    container: &ServiceContainer,
    file: &Path,
    branch: Option<&str>,
    name: &str,
    target: &str,
    basis_points: u32,
) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let branch_id = find_branch(&tree, branch)?;
    let target_id = find_branch(&tree, Some(target))?;
    let id = tree.add_branch_recipient(&branch_id, name, &target_id, basis_points)?;
    save(container, file, &tree)?;
    output::action("Added", &format!("{} -> {} <{}>", name, target, id));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_remove_recipient(
    container: &ServiceContainer,
    file: &Path,
    branch: Option<&str>,
    recipient: &str,
) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let branch_id = find_branch(&tree, branch)?;
    let removed = tree.remove_recipient(&branch_id, &RecipientId::from(recipient))?;
    save(container, file, &tree)?;
    output::action("Removed", &removed.name);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_remove_branch(
    container: &ServiceContainer,
    file: &Path,
    parent: Option<&str>,
    branch: &str,
) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let parent_id = find_branch(&tree, parent)?;
    let child_id = find_branch(&tree, Some(branch))?;
    let dropped = tree.remove_branch(&parent_id, &child_id)?;
    save(container, file, &tree)?;
    output::action("Removed", branch);
    for id in dropped {
        output::detail(&format!("dropped referencing recipient <{}>", id));
    }
    Ok(())
}

fn cmd_fees(container: &ServiceContainer, file: &Path, basis_points: Option<u32>) -> CliResult<()> {
    let mut tree = load(container, file)?;
    let fee = basis_points.unwrap_or(container.settings.branch_fee_basis_points);
    tree.annotate_fees(fee);
    save(container, file, &tree)?;
    output::action(
        "Fees",
        &format!("{} bp on every resolvable branch", fee),
    );
    Ok(())
}

fn cmd_payload(container: &ServiceContainer, file: &Path, branch: &str) -> CliResult<()> {
    let tree = load(container, file)?;
    let branch_id = find_branch(&tree, Some(branch))?;
    let branch = tree.branch(&branch_id)?;
    let allocations = allocations_for(&tree, branch, &known_addresses(&tree))
        .map_err(|cause| CliError::Usage(format!("split \"{}\" {}", branch.name, cause)))?;

    // same order as allocations_for: recipients, then resolvable children
    let names: Vec<Option<String>> = branch
        .recipients
        .iter()
        .map(|r| Some(r.name.clone()))
        .chain(
            tree.children(&branch_id)?
                .into_iter()
                .filter(|c| c.is_resolvable)
                .map(|c| Some(c.name.clone())),
        )
        .collect();
    debug!("{} allocations for {}", allocations.len(), branch.name);

    let submission = SplitSubmission::new(
        &allocations,
        &names,
        container.settings.service_fee_basis_points,
    )?;
    let json = serde_json::to_string_pretty(&submission).map_err(|e| ApplicationError::Document {
        message: format!("cannot serialize payload: {}", e),
    })?;
    output::info(&json);
    Ok(())
}

fn cmd_config(container: &ServiceContainer, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&container.settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::detail(&format!("global: {}", path.display())),
                None => output::detail("global: <no config directory>"),
            }
            output::detail(&format!(
                "local:  {}",
                local_config_path(Path::new(".")).display()
            ));
        }
    }
    Ok(())
}
