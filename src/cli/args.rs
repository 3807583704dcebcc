//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Hierarchical revenue split trees: edit, validate, resolve and export
#[derive(Parser, Debug)]
#[command(name = "splittree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Tree document to operate on
    #[arg(
        short,
        long,
        global = true,
        env = "SPLITTREE_FILE",
        default_value = "split-tree.json",
        value_hint = ValueHint::FilePath
    )]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new tree document with two empty 50/50 recipients
    New {
        /// Tree name (default from config)
        #[arg(short, long)]
        name: Option<String>,
        /// Overwrite an existing document
        #[arg(long)]
        force: bool,
    },

    /// Show the tree
    Show,

    /// Check basis points, addresses and references
    Validate,

    /// Effective share of every address in the whole tree
    Resolve {
        /// Print percentages instead of basis points
        #[arg(long)]
        percent: bool,
    },

    /// Print the normalized recipient mapping as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show finalization status
    Status,

    /// Add a wallet recipient to a branch
    AddWallet {
        /// Branch id or name (default: root)
        #[arg(short, long)]
        branch: Option<String>,
        /// Recipient name
        name: String,
        /// Wallet address
        address: String,
        /// Share in basis points (10000 = 100%)
        basis_points: u32,
    },

    /// Add a nested branch
    AddBranch {
        /// Parent branch id or name (default: root)
        #[arg(short, long)]
        parent: Option<String>,
        /// Branch name
        name: String,
        /// Share of the parent in basis points
        basis_points: u32,
    },

    /// Add a recipient that pays into another branch
    AddRef {
        /// Branch holding the recipient (default: root)
        #[arg(short, long)]
        branch: Option<String>,
        /// Recipient name
        name: String,
        /// Target branch id or name
        target: String,
        /// Share in basis points
        basis_points: u32,
    },

    /// Remove a recipient by id
    RemoveRecipient {
        /// Branch id or name (default: root)
        #[arg(short, long)]
        branch: Option<String>,
        /// Recipient id
        recipient: String,
    },

    /// Remove a branch with its subtree
    RemoveBranch {
        /// Parent branch id or name (default: root)
        #[arg(short, long)]
        parent: Option<String>,
        /// Branch id or name
        branch: String,
    },

    /// Record fee bookkeeping on every resolvable branch
    Fees {
        /// Fee per branch (default from config)
        #[arg(long)]
        basis_points: Option<u32>,
    },

    /// Print the creation request that would be sent for a branch
    Payload {
        /// Branch id or name
        #[arg(short, long)]
        branch: String,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print config template
    Template,

    /// Show config paths
    Path,
}
