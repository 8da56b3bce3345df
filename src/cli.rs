//! Command-line surface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "workbench",
    about = "Run operational mutations on SAP HANA clusters",
    version
)]
pub struct Cli {
    /// Raise log verbosity to debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute an operator by name or name@version
    Execute {
        /// Operator spec: `name` picks the latest version, `name@version`
        /// an explicit one
        operator: String,

        /// Operator arguments as a single JSON object
        #[arg(short, long)]
        arguments: String,
    },

    /// List the available operators and their versions
    Operators,
}
