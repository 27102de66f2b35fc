//! Command paths: the token sequence that identifies a node in a tree.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a [`CommandPath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The input contained no tokens.
    #[error("command path cannot be empty")]
    Empty,
    /// A subcommand token was empty or contained whitespace.
    #[error("invalid subcommand token: {0:?}")]
    InvalidToken(String),
}

/// Ordered token sequence identifying one command in a tool's hierarchy.
///
/// The first `root_len` tokens name the root invocation (usually just the
/// tool, but a root may itself be a subcommand chain such as
/// `docker compose`). Every token after that is a subcommand. Paths are
/// immutable; [`child`](Self::child) returns a new path one token deeper.
///
/// Serializes as its display string. A deserialized path treats every
/// token as part of the root.
///
/// # Examples
///
/// ```
/// use command_tree_core::CommandPath;
///
/// let root = CommandPath::parse("avalanche").unwrap();
/// let child = root.child("network").unwrap().child("start").unwrap();
///
/// assert_eq!(child.to_string(), "avalanche network start");
/// assert_eq!(child.depth(), 2);
/// assert_eq!(child.parent(), Some(root.child("network").unwrap()));
/// assert_eq!(child.to_argv(&["-h"]), vec!["avalanche", "network", "start", "-h"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandPath {
    tokens: Vec<String>,
    root_len: usize,
}

impl CommandPath {
    /// Parses a root invocation, splitting on whitespace.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let tokens: Vec<String> = input.split_whitespace().map(String::from).collect();
        if tokens.is_empty() {
            return Err(PathError::Empty);
        }
        let root_len = tokens.len();
        Ok(Self { tokens, root_len })
    }

    /// Returns a new path extended by one subcommand token.
    pub fn child(&self, token: &str) -> Result<Self, PathError> {
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return Err(PathError::InvalidToken(token.to_string()));
        }
        let mut tokens = self.tokens.clone();
        tokens.push(token.to_string());
        Ok(Self {
            tokens,
            root_len: self.root_len,
        })
    }

    /// Returns the enclosing path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            tokens: self.tokens[..self.tokens.len() - 1].to_vec(),
            root_len: self.root_len,
        })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens naming the root invocation.
    pub fn root_tokens(&self) -> &[String] {
        &self.tokens[..self.root_len]
    }

    /// Subcommand tokens below the root (empty at the root).
    pub fn subcommand_tokens(&self) -> &[String] {
        &self.tokens[self.root_len..]
    }

    /// Executable name or path (first token).
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Last token of the path.
    pub fn last(&self) -> &str {
        &self.tokens[self.tokens.len() - 1]
    }

    /// Number of subcommand tokens below the root.
    pub fn depth(&self) -> usize {
        self.tokens.len() - self.root_len
    }

    pub fn is_root(&self) -> bool {
        self.tokens.len() == self.root_len
    }

    /// Returns `true` if `token` already names a command on this path.
    ///
    /// The program is compared by file name as well, so `./bin/tool`
    /// matches a listed `tool`.
    pub fn contains_token(&self, token: &str) -> bool {
        if self.tokens.iter().any(|existing| existing == token) {
            return true;
        }
        Path::new(self.program())
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == token)
    }

    /// Builds an argv for invoking this path with extra trailing arguments.
    pub fn to_argv(&self, extra: &[&str]) -> Vec<String> {
        self.tokens
            .iter()
            .cloned()
            .chain(extra.iter().map(|arg| (*arg).to_string()))
            .collect()
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

impl TryFrom<String> for CommandPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommandPath> for String {
    fn from(path: CommandPath) -> Self {
        path.to_string()
    }
}
