#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_wraps
)]

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod gateway;
pub mod security;
pub(crate) mod util;

pub use config::Config;

/// Tool catalog subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolCommands {
    /// List legacy catalog entries and tool definitions
    List,
    /// Load the catalog and report skipped definitions or duplicate ids
    Check,
    /// Show the executor endpoint and payload a request would produce, without running it
    #[command(long_about = "\
Resolve a tool request without contacting the executor.

Prints the executor endpoint and the exact JSON body that /stream would send.

Examples:
  toolgate tools resolve ping --target 10.0.0.1
  toolgate tools resolve nmap --target 10.0.0.1 --scan quick")]
    Resolve {
        /// Tool id
        tool: String,
        /// Target host or value passed to the tool
        #[arg(long)]
        target: String,
        /// Named scan (required for tools with a definition file)
        #[arg(long)]
        scan: Option<String>,
    },
}
