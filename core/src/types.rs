//! Command tree type definitions.
//!
//! The document shape is a contract with downstream renderers: every node
//! serializes as `{description, flags, subcommands}` and every flag entry as
//! either `{type, description}` or `{aliasOf}`. Maps keep insertion order so
//! that subcommands and flags appear in the order the tool listed them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::CommandPath;

/// Version string used when a tool's version cannot be determined.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Flag name → entry, in help-text order.
pub type FlagMap = IndexMap<String, FlagEntry>;

/// Subcommand token → node, in listing order.
pub type SubcommandMap = IndexMap<String, CommandNode>;

/// One flag as it appeared in a `Flags:` section.
///
/// Long flags are keyed without their `--` prefix and carry the type hint and
/// description. Short flags keep their single-dash prefix and only point at
/// the long flag they abbreviate.
///
/// # Examples
///
/// ```
/// use command_tree_core::FlagEntry;
///
/// let timeout = FlagEntry::canonical("int", "request timeout in seconds");
/// assert_eq!(timeout.type_hint(), Some("int"));
/// assert!(!timeout.is_alias());
///
/// let short = FlagEntry::alias("timeout");
/// assert_eq!(short.alias_target(), Some("timeout"));
/// assert_eq!(short.description(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagEntry {
    /// Short-form name resolving to a canonical long flag.
    Alias {
        #[serde(rename = "aliasOf")]
        alias_of: String,
    },
    /// Authoritative record for a long flag.
    Canonical {
        /// Value type token (`int`, `string`, `<path>`), empty when absent.
        #[serde(rename = "type", default)]
        type_hint: String,
        #[serde(default)]
        description: String,
    },
}

impl FlagEntry {
    pub fn canonical(type_hint: &str, description: &str) -> Self {
        Self::Canonical {
            type_hint: type_hint.to_string(),
            description: description.to_string(),
        }
    }

    pub fn alias(target: &str) -> Self {
        Self::Alias {
            alias_of: target.to_string(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Alias { .. })
    }

    /// Long flag name this entry points at, for aliases.
    pub fn alias_target(&self) -> Option<&str> {
        match self {
            Self::Alias { alias_of } => Some(alias_of),
            Self::Canonical { .. } => None,
        }
    }

    /// Type hint of a canonical entry, `None` when empty or an alias.
    pub fn type_hint(&self) -> Option<&str> {
        match self {
            Self::Canonical { type_hint, .. } if !type_hint.is_empty() => Some(type_hint),
            _ => None,
        }
    }

    /// Description of a canonical entry; aliases never carry one.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Canonical { description, .. } => Some(description),
            Self::Alias { .. } => None,
        }
    }
}

/// One command: its free-form description, flags and child commands.
///
/// A node with no subcommands is a leaf. A node with an empty description,
/// no flags and no subcommands is *degraded*: it usually means the tool's
/// help could not be fetched or parsed.
///
/// # Examples
///
/// ```
/// use command_tree_core::{CommandNode, FlagEntry};
///
/// let node = CommandNode::new("Manage networks")
///     .with_flag("name", FlagEntry::canonical("string", "network name"))
///     .with_flag("-n", FlagEntry::alias("name"))
///     .with_subcommand("create", CommandNode::new("Create a network"));
///
/// assert!(!node.is_leaf());
/// assert_eq!(node.node_count(), 2);
/// assert_eq!(node.find(&["create"]).unwrap().description, "Create a network");
///
/// let (name, entry) = node.resolve_flag("-n").unwrap();
/// assert_eq!(name, "name");
/// assert_eq!(entry.type_hint(), Some("string"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandNode {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flags: FlagMap,
    #[serde(default)]
    pub subcommands: SubcommandMap,
}

impl CommandNode {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Self::default()
        }
    }

    /// Adds a flag entry.
    pub fn with_flag(mut self, name: &str, entry: FlagEntry) -> Self {
        self.flags.insert(name.to_string(), entry);
        self
    }

    /// Adds a child command.
    pub fn with_subcommand(mut self, token: &str, node: CommandNode) -> Self {
        self.subcommands.insert(token.to_string(), node);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.subcommands.is_empty()
    }

    /// Returns `true` when nothing at all was extracted for this node.
    pub fn is_degraded(&self) -> bool {
        self.description.is_empty() && self.flags.is_empty() && self.subcommands.is_empty()
    }

    /// Length of the longest chain of subcommands below this node.
    pub fn depth(&self) -> usize {
        self.subcommands
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .subcommands
            .values()
            .map(CommandNode::node_count)
            .sum::<usize>()
    }

    /// Finds a descendant by subcommand tokens relative to this node.
    pub fn find(&self, tokens: &[&str]) -> Option<&CommandNode> {
        tokens
            .iter()
            .try_fold(self, |node, token| node.subcommands.get(*token))
    }

    /// Looks up a flag, following a short alias to its canonical entry.
    ///
    /// Returns the canonical name together with the entry. A dangling alias
    /// resolves to `None`.
    pub fn resolve_flag<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a FlagEntry)> {
        let entry = self.flags.get(name)?;
        match entry.alias_target() {
            Some(target) => {
                let (canonical, resolved) = self.flags.get_key_value(target)?;
                (!resolved.is_alias()).then_some((canonical.as_str(), resolved))
            }
            None => Some((name, entry)),
        }
    }

    /// Paths of degraded nodes in this subtree, depth-first in listing order.
    pub fn degraded_paths(&self, path: &CommandPath) -> Vec<CommandPath> {
        let mut out = Vec::new();
        self.collect_degraded(path, &mut out);
        out
    }

    fn collect_degraded(&self, path: &CommandPath, out: &mut Vec<CommandPath>) {
        if self.is_degraded() {
            out.push(path.clone());
        }
        for (token, child) in &self.subcommands {
            if let Ok(child_path) = path.child(token) {
                child.collect_degraded(&child_path, out);
            }
        }
    }
}

/// The artifact of one discovery run: tool version plus its command tree.
///
/// Carries no timestamps or other run-specific data, so two runs against an
/// unchanged tool serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTreeDocument {
    pub version: String,
    pub tree: CommandNode,
}

impl CommandTreeDocument {
    pub fn new(version: &str, tree: CommandNode) -> Self {
        Self {
            version: version.to_string(),
            tree,
        }
    }

    /// Returns `true` if the version query produced no usable version.
    pub fn has_unknown_version(&self) -> bool {
        self.version == UNKNOWN_VERSION
    }
}
