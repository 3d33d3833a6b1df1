//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Versioned tree documents: run edit scripts with containment rules and undo/redo
#[derive(Parser, Debug)]
#[command(name = "folddoc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file to use instead of ./folddoc.toml
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an edit script and print the resulting tree
    Run {
        /// Edit script
        #[arg(value_hint = ValueHint::FilePath)]
        script: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON tree to a file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },

    /// Run an edit script with invariant verification on every step
    Check {
        /// Edit script
        #[arg(value_hint = ValueHint::FilePath)]
        script: PathBuf,
    },

    /// Show the effective containment rules and field schemas
    Catalogue,

    /// Ask whether a parent type accepts a child type
    Accepts {
        /// Parent type tag
        parent: String,
        /// Child type tag
        child: String,
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

    /// Print a commented config template
    Template,

    /// Show config paths
    Path,
}
