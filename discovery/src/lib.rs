//! Command tree discovery from CLI help output.
//!
//! This crate builds a [`CommandTreeDocument`] for an installed command-line
//! tool by running `<tool> --version` once and `<path> -h` for every command
//! in its hierarchy, parsing the free-form help text of each.
//!
//! # Main entry points
//!
//! - [`discover`] — run a tool and build its document with default process
//!   settings.
//! - [`tree::TreeBuilder`] — the same walk over any [`runner::CommandRunner`],
//!   with a [`tree::BuildReport`] of everything that degraded.
//! - [`parser::parse_command_details`] — parse one pre-captured help screen
//!   without running anything.
//!
//! # Example
//!
//! ```
//! use command_tree_discovery::parser::parse_command_details;
//!
//! let help = "\
//! Manage local networks.
//!
//! Available Commands:
//!   start       Start a local network
//!   stop        Stop the running network
//!
//! Flags:
//!   -h, --help          help for network
//!       --port int      port to bind
//! ";
//!
//! let detail = parse_command_details(help);
//! assert_eq!(detail.description, "Manage local networks.");
//! assert_eq!(detail.subcommands.len(), 2);
//! assert_eq!(detail.flags["-h"].alias_target(), Some("help"));
//! assert_eq!(detail.flags["port"].type_hint(), Some("int"));
//! ```
//!
//! # Crate type
//!
//! This is a library-only crate. The `command-tree` binary lives in the
//! `command-tree-cli` crate.
//!
//! [`CommandTreeDocument`]: command_tree_core::CommandTreeDocument

pub mod output;
pub mod parser;
pub mod runner;
pub mod tree;
pub mod version;

use command_tree_core::CommandPath;

use runner::ProcessRunner;
use tree::{DiscoveryError, DocumentBuild, TreeBuilder, TreeConfig};

/// Discovers the full command tree of `tool` using real processes.
///
/// `tool` may carry leading arguments (`"docker compose"`); they become part
/// of the root path. Nothing is written to disk.
///
/// # Errors
///
/// Fails only when the root help cannot be fetched, when the walk is
/// cancelled, or in strict mode when a traversal guard trips.
///
/// # Examples
///
/// ```no_run
/// use command_tree_discovery::discover;
/// use command_tree_discovery::tree::TreeConfig;
///
/// let build = discover("avalanche", &TreeConfig::default()).unwrap();
/// println!("{} ({} nodes)", build.document.version, build.report.nodes);
/// ```
pub fn discover(tool: &str, config: &TreeConfig) -> Result<DocumentBuild, DiscoveryError> {
    let root = CommandPath::parse(tool)?;
    let runner = ProcessRunner::new(config.timeout);
    TreeBuilder::new(runner, config.clone()).build_document(&root)
}
