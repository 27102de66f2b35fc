//! Core types for discovered CLI command trees.
//!
//! This crate defines the document produced by walking a tool's help
//! output:
//!
//! - [`CommandPath`] — the token sequence identifying one node (`tool`,
//!   `tool network`, `tool network create`, ...).
//! - [`FlagEntry`] — either a canonical long flag (`{type, description}`) or
//!   a short alias (`{aliasOf}`).
//! - [`CommandNode`] — description, flags and nested subcommands of one
//!   command.
//! - [`CommandTreeDocument`] — the version string plus the root node; the
//!   single artifact of a discovery run.
//!
//! Validation ([`validate_document`]) reports structural problems such as
//! aliases pointing at flags that were never parsed.
//!
//! # Example
//!
//! ```
//! use command_tree_core::*;
//!
//! let tree = CommandNode::new("Example tool.")
//!     .with_flag("verbose", FlagEntry::canonical("", "enable verbose output"))
//!     .with_flag("-v", FlagEntry::alias("verbose"))
//!     .with_subcommand("run", CommandNode::new("Run a thing"));
//!
//! let document = CommandTreeDocument::new("v1.2.3", tree);
//! assert_eq!(document.tree.depth(), 1);
//! assert!(validate_document(&document).is_empty());
//!
//! let json = serde_json::to_value(&document).unwrap();
//! assert_eq!(json["tree"]["flags"]["-v"]["aliasOf"], "verbose");
//! assert_eq!(json["tree"]["flags"]["verbose"]["type"], "");
//! ```

mod path;
mod types;
mod validate;

pub use path::{CommandPath, PathError};
pub use types::*;
pub use validate::{ValidationError, validate_document, validate_node};
