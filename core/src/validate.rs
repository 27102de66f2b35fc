//! Document validation.
//!
//! Parsing help text is a best-effort heuristic, so the parser never refuses
//! to produce a node. Validation is where structural problems surface: a
//! short alias whose long flag failed to parse, empty names, or subcommand
//! tokens that cannot be invoked.
//!
//! # Examples
//!
//! ```
//! use command_tree_core::*;
//!
//! let good = CommandNode::new("tool")
//!     .with_flag("verbose", FlagEntry::canonical("", "be loud"))
//!     .with_flag("-v", FlagEntry::alias("verbose"));
//! assert!(validate_document(&CommandTreeDocument::new("v1.0.0", good)).is_empty());
//!
//! let bad = CommandNode::new("tool").with_flag("-v", FlagEntry::alias("verbose"));
//! let errors = validate_document(&CommandTreeDocument::new("v1.0.0", bad));
//! assert!(matches!(errors[0], ValidationError::DanglingAlias { .. }));
//! ```

use thiserror::Error;

use crate::{CommandNode, CommandTreeDocument, FlagEntry};

/// Structural problems found in a command tree.
///
/// `scope` is the space-joined subcommand path relative to the root, or
/// `root` for the top-level node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Document version string is empty.
    #[error("document version cannot be empty")]
    EmptyVersion,
    /// A flag key is empty or whitespace-only.
    #[error("empty flag name in {scope}")]
    EmptyFlagName { scope: String },
    /// A short alias key does not start with a single dash.
    #[error("invalid alias name in {scope}: {alias}")]
    InvalidAliasName { scope: String, alias: String },
    /// An alias points at a flag that is not in the same mapping.
    #[error("alias {alias} in {scope} points at missing flag {target}")]
    DanglingAlias {
        scope: String,
        alias: String,
        target: String,
    },
    /// An alias points at another alias instead of a canonical flag.
    #[error("alias {alias} in {scope} points at alias {target}")]
    AliasChain {
        scope: String,
        alias: String,
        target: String,
    },
    /// A subcommand token is empty or contains whitespace.
    #[error("invalid subcommand token in {scope}: {token:?}")]
    InvalidSubcommandToken { scope: String, token: String },
}

/// Validates a whole document.
///
/// Returns every finding, not just the first; an empty vector means the
/// document is well formed.
pub fn validate_document(document: &CommandTreeDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if document.version.trim().is_empty() {
        errors.push(ValidationError::EmptyVersion);
    }
    let mut path = Vec::new();
    walk(&document.tree, &mut path, &mut errors);
    errors
}

/// Validates a single node and its descendants.
pub fn validate_node(node: &CommandNode) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    walk(node, &mut path, &mut errors);
    errors
}

fn walk(node: &CommandNode, path: &mut Vec<String>, errors: &mut Vec<ValidationError>) {
    let scope = scope_label(path);
    validate_flags(node, &scope, errors);

    for (token, child) in &node.subcommands {
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            errors.push(ValidationError::InvalidSubcommandToken {
                scope: scope.clone(),
                token: token.clone(),
            });
        }
        path.push(token.clone());
        walk(child, path, errors);
        path.pop();
    }
}

fn validate_flags(node: &CommandNode, scope: &str, errors: &mut Vec<ValidationError>) {
    for (name, entry) in &node.flags {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyFlagName {
                scope: scope.to_string(),
            });
            continue;
        }

        let FlagEntry::Alias { alias_of } = entry else {
            continue;
        };
        if !name.starts_with('-') || name.starts_with("--") || name.len() < 2 {
            errors.push(ValidationError::InvalidAliasName {
                scope: scope.to_string(),
                alias: name.clone(),
            });
        }
        match node.flags.get(alias_of) {
            None => errors.push(ValidationError::DanglingAlias {
                scope: scope.to_string(),
                alias: name.clone(),
                target: alias_of.clone(),
            }),
            Some(target) if target.is_alias() => errors.push(ValidationError::AliasChain {
                scope: scope.to_string(),
                alias: name.clone(),
                target: alias_of.clone(),
            }),
            Some(_) => {}
        }
    }
}

fn scope_label(path: &[String]) -> String {
    if path.is_empty() {
        "root".to_string()
    } else {
        path.join(" ")
    }
}
