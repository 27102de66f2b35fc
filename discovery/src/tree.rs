//! Recursive command tree discovery.
//!
//! Starting from a root command, the builder asks for `<path> -h`, parses
//! the help screen, and recurses into every listed subcommand in listing
//! order. The walk is bounded: a subcommand that names itself or an ancestor,
//! a help screen that echoes an ancestor's, a depth ceiling and a global
//! probe budget all stop descent at that child.
//!
//! Failures below the root degrade a single node; only a root that cannot be
//! invoked at all fails the build. Every degradation is recorded in the
//! [`BuildReport`].
//!
//! # Example
//!
//! ```no_run
//! use command_tree_core::CommandPath;
//! use command_tree_discovery::runner::ProcessRunner;
//! use command_tree_discovery::tree::{TreeBuilder, TreeConfig};
//!
//! let config = TreeConfig::default().with_max_depth(8);
//! let builder = TreeBuilder::new(ProcessRunner::new(config.timeout), config);
//! let root = CommandPath::parse("kubectl").unwrap();
//! let build = builder.build_document(&root).unwrap();
//! println!("{} nodes, version {}", build.report.nodes, build.document.version);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use command_tree_core::{CommandNode, CommandPath, CommandTreeDocument, PathError};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parser::{CommandDetail, fetch_help_text, parse_command_details};
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT_MS, ProcessError};
use crate::version::detect_version;

/// Deepest subcommand level that is probed.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Maximum number of help queries in one build.
pub const DEFAULT_PROBE_BUDGET: usize = 4096;

pub const DEFAULT_HELP_FLAG: &str = "-h";
pub const DEFAULT_VERSION_FLAG: &str = "--version";

/// Settings for one discovery run.
///
/// # Examples
///
/// ```
/// use command_tree_discovery::tree::TreeConfig;
///
/// let config = TreeConfig::default()
///     .with_max_depth(4)
///     .with_jobs(8)
///     .skip("completion");
/// assert_eq!(config.help_flag, "-h");
/// assert_eq!(config.max_depth, 4);
/// assert!(!config.strict);
/// ```
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Argument appended to every command path to request help.
    pub help_flag: String,
    /// Argument appended to the root to request its version.
    pub version_flag: String,
    /// Time budget for each query.
    pub timeout: Duration,
    /// Deepest subcommand level (root is 0) that is still probed.
    pub max_depth: usize,
    /// Maximum number of help queries, root included.
    pub probe_budget: usize,
    /// Sibling subtrees fetched concurrently; `1` walks sequentially.
    ///
    /// The document is identical for any value as long as `probe_budget` is
    /// not reached. Once it is, which branches get cut depends on thread
    /// scheduling when `jobs > 1`; use `1` for reproducible truncated trees.
    pub jobs: usize,
    /// Subcommand tokens kept as leaves without being probed.
    pub skip_subcommands: Vec<String>,
    /// Fail the build on cycles, depth or budget breaches instead of
    /// recording them.
    pub strict: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            help_flag: DEFAULT_HELP_FLAG.to_string(),
            version_flag: DEFAULT_VERSION_FLAG.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_depth: DEFAULT_MAX_DEPTH,
            probe_budget: DEFAULT_PROBE_BUDGET,
            jobs: 1,
            skip_subcommands: Vec::new(),
            strict: false,
        }
    }
}

impl TreeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_probe_budget(mut self, budget: usize) -> Self {
        self.probe_budget = budget;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Adds a subcommand token that is listed but never probed.
    pub fn skip(mut self, token: &str) -> Self {
        self.skip_subcommands.push(token.to_string());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Why descent stopped at a child that looked like a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleReason {
    /// The child token names the tool or an ancestor and its help output is
    /// identical to an ancestor's.
    AncestorToken,
    /// The child's help output is identical to an ancestor's.
    EchoedHelp,
    /// The path was already visited in this run.
    RevisitedPath,
}

impl fmt::Display for CycleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AncestorToken => write!(f, "subcommand repeats an ancestor"),
            Self::EchoedHelp => write!(f, "help output repeats an ancestor's"),
            Self::RevisitedPath => write!(f, "path already visited"),
        }
    }
}

/// Fatal discovery errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The command path could not be built.
    #[error("invalid command path: {0}")]
    InvalidPath(#[from] PathError),

    /// The root command's help could not be obtained.
    #[error("'{path}' is not invocable: {source}")]
    RootUnavailable {
        path: CommandPath,
        #[source]
        source: ProcessError,
    },

    /// A cycle was found in strict mode.
    #[error("cycle detected at '{path}': {reason}")]
    CycleDetected {
        path: CommandPath,
        reason: CycleReason,
    },

    /// The depth ceiling was exceeded in strict mode.
    #[error("maximum depth {max_depth} exceeded at '{path}'")]
    DepthExceeded { path: CommandPath, max_depth: usize },

    /// The probe budget ran out in strict mode.
    #[error("probe budget of {budget} help queries exhausted at '{path}'")]
    BudgetExhausted { path: CommandPath, budget: usize },

    /// The cancel flag was raised; no partial tree is returned.
    #[error("discovery cancelled")]
    Cancelled,
}

/// Non-fatal event recorded while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildIssue {
    /// Help query failed; the node was kept with only its listing description.
    HelpUnavailable { path: CommandPath, error: String },
    /// Descent stopped because the child looked like a cycle.
    CycleDetected {
        path: CommandPath,
        reason: CycleReason,
    },
    /// Descent stopped at the depth ceiling.
    DepthExceeded { path: CommandPath, max_depth: usize },
    /// Descent stopped because the probe budget ran out.
    BudgetExhausted { path: CommandPath, budget: usize },
    /// The subcommand is on the skip list.
    Skipped { path: CommandPath },
    /// Lines of this command's help were skipped by the parser.
    ParseWarnings {
        path: CommandPath,
        warnings: Vec<String>,
    },
}

impl BuildIssue {
    pub fn path(&self) -> &CommandPath {
        match self {
            Self::HelpUnavailable { path, .. }
            | Self::CycleDetected { path, .. }
            | Self::DepthExceeded { path, .. }
            | Self::BudgetExhausted { path, .. }
            | Self::Skipped { path }
            | Self::ParseWarnings { path, .. } => path,
        }
    }

    /// Converts a traversal guard into the error strict mode raises.
    fn into_strict_error(self) -> Result<DiscoveryError, BuildIssue> {
        match self {
            Self::CycleDetected { path, reason } => Ok(DiscoveryError::CycleDetected { path, reason }),
            Self::DepthExceeded { path, max_depth } => {
                Ok(DiscoveryError::DepthExceeded { path, max_depth })
            }
            Self::BudgetExhausted { path, budget } => {
                Ok(DiscoveryError::BudgetExhausted { path, budget })
            }
            other => Err(other),
        }
    }
}

/// Diagnostics for one build; never part of the document itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub root: CommandPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Nodes in the tree, root included.
    pub nodes: usize,
    /// Longest subcommand chain below the root.
    pub depth: usize,
    /// Help queries issued (the version query is not counted).
    pub help_queries: usize,
    pub issues: Vec<BuildIssue>,
    /// Nodes with no description, flags or subcommands.
    pub degraded: Vec<CommandPath>,
}

impl BuildReport {
    /// Number of nodes whose help query failed.
    pub fn failed_nodes(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, BuildIssue::HelpUnavailable { .. }))
            .count()
    }

    /// Returns `true` if descent was cut short anywhere.
    pub fn was_truncated(&self) -> bool {
        self.issues.iter().any(|issue| {
            matches!(
                issue,
                BuildIssue::CycleDetected { .. }
                    | BuildIssue::DepthExceeded { .. }
                    | BuildIssue::BudgetExhausted { .. }
            )
        })
    }
}

/// Tree plus report from [`TreeBuilder::build_tree`].
#[derive(Debug, Clone)]
pub struct TreeBuild {
    pub tree: CommandNode,
    pub report: BuildReport,
}

/// Document plus report from [`TreeBuilder::build_document`].
#[derive(Debug, Clone)]
pub struct DocumentBuild {
    pub document: CommandTreeDocument,
    pub report: BuildReport,
}

/// One command on the current branch, with the help text it printed.
struct Frame<'a> {
    path: &'a CommandPath,
    help: &'a str,
    parent: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    fn lineage(&'a self) -> impl Iterator<Item = &'a Frame<'a>> {
        std::iter::successors(Some(self), |frame| frame.parent)
    }
}

/// State shared by every branch of one build.
struct WalkState {
    queries: AtomicUsize,
    visited: Mutex<HashSet<CommandPath>>,
    parallel: bool,
}

impl WalkState {
    fn new(parallel: bool) -> Self {
        Self {
            queries: AtomicUsize::new(0),
            visited: Mutex::new(HashSet::new()),
            parallel,
        }
    }

    /// Returns `false` if `path` was already visited.
    fn mark_visited(&self, path: &CommandPath) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone())
    }

    /// Takes one query from the budget, returning `false` when none is left.
    fn reserve_query(&self, budget: usize) -> bool {
        self.queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < budget).then_some(used + 1)
            })
            .is_ok()
    }
}

struct Visit {
    node: CommandNode,
    issues: Vec<BuildIssue>,
}

impl Visit {
    /// A child that was not (or could not be) expanded.
    fn leaf(inline_description: &str, issues: Vec<BuildIssue>) -> Self {
        Self {
            node: CommandNode::new(inline_description),
            issues,
        }
    }
}

/// Walks a tool's command hierarchy through a [`CommandRunner`].
pub struct TreeBuilder<R> {
    runner: R,
    config: TreeConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<R: CommandRunner> TreeBuilder<R> {
    pub fn new(runner: R, config: TreeConfig) -> Self {
        Self {
            runner,
            config,
            cancel: None,
        }
    }

    /// Aborts the build with [`DiscoveryError::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Detects the version and builds the full document for `root`.
    pub fn build_document(&self, root: &CommandPath) -> Result<DocumentBuild, DiscoveryError> {
        let version = detect_version(&self.runner, root, &self.config.version_flag);
        let TreeBuild { tree, mut report } = self.build_tree(root)?;
        report.version = Some(version.clone());
        info!(
            command = %root,
            version = %version,
            nodes = report.nodes,
            issues = report.issues.len(),
            "Command tree built"
        );
        Ok(DocumentBuild {
            document: CommandTreeDocument::new(&version, tree),
            report,
        })
    }

    /// Builds the command tree below `root`.
    pub fn build_tree(&self, root: &CommandPath) -> Result<TreeBuild, DiscoveryError> {
        let pool = if self.config.jobs > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|err| warn!(error = %err, "Thread pool unavailable, walking sequentially"))
                .ok()
        } else {
            None
        };
        let state = WalkState::new(pool.is_some());

        let walk = || self.walk_root(&state, root);
        let Visit { node, issues } = match &pool {
            Some(pool) => pool.install(walk)?,
            None => walk()?,
        };

        let report = BuildReport {
            root: root.clone(),
            version: None,
            nodes: node.node_count(),
            depth: node.depth(),
            help_queries: state.queries.load(Ordering::SeqCst),
            issues,
            degraded: node.degraded_paths(root),
        };
        Ok(TreeBuild { tree: node, report })
    }

    fn walk_root(&self, state: &WalkState, root: &CommandPath) -> Result<Visit, DiscoveryError> {
        self.check_cancelled()?;
        info!(command = %root, "Processing command");
        state.mark_visited(root);
        state.queries.fetch_add(1, Ordering::SeqCst);

        let help = fetch_help_text(&self.runner, root, &self.config.help_flag).map_err(
            |source| DiscoveryError::RootUnavailable {
                path: root.clone(),
                source,
            },
        )?;
        let detail = parse_command_details(&help);

        let mut issues = Vec::new();
        note_parse_warnings(root, &detail, &mut issues);
        let frame = Frame {
            path: root,
            help: &help,
            parent: None,
        };
        let node = self.expand(state, &frame, detail, &mut issues)?;
        Ok(Visit { node, issues })
    }

    /// Builds a node from `detail`, visiting every listed subcommand.
    fn expand(
        &self,
        state: &WalkState,
        frame: &Frame<'_>,
        detail: CommandDetail,
        issues: &mut Vec<BuildIssue>,
    ) -> Result<CommandNode, DiscoveryError> {
        let CommandDetail {
            description,
            flags,
            subcommands,
            ..
        } = detail;
        let listing: Vec<(String, String)> = subcommands.into_iter().collect();

        let visits: Vec<Visit> = if state.parallel && listing.len() > 1 {
            listing
                .par_iter()
                .map(|(token, inline)| self.visit_child(state, frame, token, inline))
                .collect::<Result<_, _>>()?
        } else {
            listing
                .iter()
                .map(|(token, inline)| self.visit_child(state, frame, token, inline))
                .collect::<Result<_, _>>()?
        };

        let mut subcommands = IndexMap::with_capacity(listing.len());
        for ((token, _), visit) in listing.into_iter().zip(visits) {
            issues.extend(visit.issues);
            subcommands.insert(token, visit.node);
        }

        Ok(CommandNode {
            description,
            flags,
            subcommands,
        })
    }

    fn visit_child(
        &self,
        state: &WalkState,
        parent: &Frame<'_>,
        token: &str,
        inline: &str,
    ) -> Result<Visit, DiscoveryError> {
        self.check_cancelled()?;
        let path = parent.path.child(token)?;
        let mut issues = Vec::new();

        if self.config.skip_subcommands.iter().any(|skip| skip == token) {
            debug!(command = %path, "Skipping configured subcommand");
            issues.push(BuildIssue::Skipped { path });
            return Ok(Visit::leaf(inline, issues));
        }

        let guard = if !state.mark_visited(&path) {
            BuildIssue::CycleDetected {
                path,
                reason: CycleReason::RevisitedPath,
            }
        } else if path.depth() > self.config.max_depth {
            BuildIssue::DepthExceeded {
                path,
                max_depth: self.config.max_depth,
            }
        } else if !state.reserve_query(self.config.probe_budget) {
            BuildIssue::BudgetExhausted {
                path,
                budget: self.config.probe_budget,
            }
        } else {
            return self.probe_child(state, parent, path, inline, issues);
        };

        self.stop_descent(guard, &mut issues)?;
        Ok(Visit::leaf(inline, issues))
    }

    fn probe_child(
        &self,
        state: &WalkState,
        parent: &Frame<'_>,
        path: CommandPath,
        inline: &str,
        mut issues: Vec<BuildIssue>,
    ) -> Result<Visit, DiscoveryError> {
        info!(command = %path, "Processing command");
        let help = match fetch_help_text(&self.runner, &path, &self.config.help_flag) {
            Ok(help) => help,
            Err(err) => {
                warn!(command = %path, error = %err, "Error fetching details");
                issues.push(BuildIssue::HelpUnavailable {
                    path,
                    error: err.to_string(),
                });
                return Ok(Visit::leaf(inline, issues));
            }
        };

        // Some tools print the parent's help for any unknown argument. A
        // repeated token alone is not a cycle (`tool config set config`).
        if !help.trim().is_empty() && parent.lineage().any(|frame| frame.help == help) {
            let reason = if parent.path.contains_token(path.last()) {
                CycleReason::AncestorToken
            } else {
                CycleReason::EchoedHelp
            };
            let issue = BuildIssue::CycleDetected { path, reason };
            self.stop_descent(issue, &mut issues)?;
            return Ok(Visit::leaf(inline, issues));
        }

        let detail = parse_command_details(&help);
        note_parse_warnings(&path, &detail, &mut issues);
        let frame = Frame {
            path: &path,
            help: &help,
            parent: Some(parent),
        };
        let mut node = self.expand(state, &frame, detail, &mut issues)?;
        if node.description.is_empty() {
            node.description = inline.to_string();
        }
        Ok(Visit { node, issues })
    }

    /// Records a traversal guard, or raises it in strict mode.
    fn stop_descent(
        &self,
        issue: BuildIssue,
        issues: &mut Vec<BuildIssue>,
    ) -> Result<(), DiscoveryError> {
        warn!(command = %issue.path(), issue = ?issue, "Not descending further");
        if !self.config.strict {
            issues.push(issue);
            return Ok(());
        }
        match issue.into_strict_error() {
            Ok(err) => Err(err),
            Err(issue) => {
                issues.push(issue);
                Ok(())
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), DiscoveryError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(DiscoveryError::Cancelled);
        }
        Ok(())
    }
}

fn note_parse_warnings(path: &CommandPath, detail: &CommandDetail, issues: &mut Vec<BuildIssue>) {
    if detail.diagnostics.is_empty() {
        return;
    }
    for skipped in &detail.diagnostics.skipped {
        debug!(command = %path, line = %skipped.line, reason = ?skipped.reason, "Skipped help line");
    }
    issues.push(BuildIssue::ParseWarnings {
        path: path.clone(),
        warnings: detail.diagnostics.warnings(),
    });
}
