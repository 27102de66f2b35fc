//! Command detail parsing.
//!
//! Splits one command's help output into three regions using the literal
//! section headers `Available Commands:` and `Flags:`:
//!
//! - everything before the first header is free-text description,
//! - rows under `Available Commands:` are `name  description` pairs,
//! - lines under `Flags:` go to the flag block parser.
//!
//! Headers match exactly after trimming. Once the flags region starts it
//! never ends, so a stray `Available Commands:` after `Flags:` is treated as
//! flag text.

use command_tree_core::{CommandNode, CommandPath, FlagMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::diagnostics::{ParseDiagnostics, SkipReason};
use super::flags::parse_flags_with_diagnostics;
use crate::runner::{CommandRunner, ProcessError};

/// Header line that opens the subcommand listing.
pub const COMMANDS_HEADER: &str = "Available Commands:";

/// Header line that opens the flags listing.
pub const FLAGS_HEADER: &str = "Flags:";

/// Mutually exclusive regions of a help screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Description,
    Commands,
    Flags,
}

impl Region {
    /// Region entered when `line` (already trimmed) is a section header.
    fn transition(self, line: &str) -> Option<Region> {
        match (self, line) {
            (_, FLAGS_HEADER) => Some(Region::Flags),
            (Region::Flags, COMMANDS_HEADER) => None,
            (_, COMMANDS_HEADER) => Some(Region::Commands),
            _ => None,
        }
    }
}

/// What one help screen says about its command.
///
/// `subcommands` maps each listed name to its one-line description, in
/// listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDetail {
    pub description: String,
    pub flags: FlagMap,
    pub subcommands: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "ParseDiagnostics::is_empty")]
    pub diagnostics: ParseDiagnostics,
}

impl CommandDetail {
    /// The record used when a command's help could not be fetched.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.flags.is_empty() && self.subcommands.is_empty()
    }

    /// Node carrying this detail's description and flags, without children.
    pub fn to_node(&self) -> CommandNode {
        CommandNode {
            description: self.description.clone(),
            flags: self.flags.clone(),
            subcommands: IndexMap::new(),
        }
    }
}

/// Line-at-a-time region state machine.
#[derive(Debug)]
struct DetailParser {
    region: Region,
    description: Vec<String>,
    subcommands: IndexMap<String, String>,
    flag_lines: Vec<String>,
    diagnostics: ParseDiagnostics,
}

impl DetailParser {
    fn new() -> Self {
        Self {
            region: Region::Description,
            description: Vec::new(),
            subcommands: IndexMap::new(),
            flag_lines: Vec::new(),
            diagnostics: ParseDiagnostics::default(),
        }
    }

    fn push_line(&mut self, raw: &str) {
        let line = raw.trim();
        if let Some(next) = self.region.transition(line) {
            self.region = next;
            return;
        }

        match self.region {
            Region::Description => {
                if !line.is_empty() {
                    self.description.push(line.to_string());
                }
            }
            Region::Commands => self.push_command_row(line),
            Region::Flags => self.flag_lines.push(raw.to_string()),
        }
    }

    fn push_command_row(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let Some((name, description)) = split_command_row(line) else {
            debug!(line, "Skipping command row without description");
            self.diagnostics
                .record(Region::Commands, line, SkipReason::MissingSubcommandDescription);
            return;
        };
        if self.subcommands.contains_key(name) {
            debug!(subcommand = name, "Duplicate subcommand row; keeping first listing");
            self.diagnostics
                .record(Region::Commands, line, SkipReason::DuplicateSubcommand);
            return;
        }
        self.subcommands
            .insert(name.to_string(), description.to_string());
    }

    fn finish(self) -> CommandDetail {
        let (flags, flag_diagnostics) = parse_flags_with_diagnostics(&self.flag_lines);
        let mut diagnostics = self.diagnostics;
        diagnostics.extend(flag_diagnostics);
        CommandDetail {
            description: self.description.join(" ").trim().to_string(),
            flags,
            subcommands: self.subcommands,
            diagnostics,
        }
    }
}

/// Splits a listing row on its first run of whitespace.
fn split_command_row(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(char::is_whitespace)?;
    let description = rest.trim();
    if name.is_empty() || description.is_empty() {
        return None;
    }
    Some((name, description))
}

/// Parses one command's raw help output.
///
/// # Examples
///
/// ```
/// use command_tree_discovery::parser::parse_command_details;
///
/// let detail = parse_command_details(
///     "My tool.\n\nAvailable Commands:\n  add   Add a thing\n  rm    Remove a thing\n\nFlags:\n  -h, --help   help for tool\n",
/// );
///
/// assert_eq!(detail.description, "My tool.");
/// assert_eq!(detail.subcommands["add"], "Add a thing");
/// assert_eq!(detail.subcommands["rm"], "Remove a thing");
/// assert!(detail.flags.contains_key("help"));
/// ```
pub fn parse_command_details(text: &str) -> CommandDetail {
    let mut parser = DetailParser::new();
    for line in text.lines() {
        parser.push_line(line);
    }
    parser.finish()
}

/// Runs `<path> <help_flag>` and returns the raw help text.
pub fn fetch_help_text<R: CommandRunner + ?Sized>(
    runner: &R,
    path: &CommandPath,
    help_flag: &str,
) -> Result<String, ProcessError> {
    runner.run(&path.to_argv(&[help_flag]))
}

/// Fetches and parses a command's help, propagating process failures.
pub fn try_fetch_command_details<R: CommandRunner + ?Sized>(
    runner: &R,
    path: &CommandPath,
    help_flag: &str,
) -> Result<CommandDetail, ProcessError> {
    fetch_help_text(runner, path, help_flag).map(|text| parse_command_details(&text))
}

/// Fetches and parses a command's help.
///
/// A failed invocation yields [`CommandDetail::empty`] so that one broken
/// command cannot abort a whole tree walk.
pub fn fetch_command_details<R: CommandRunner + ?Sized>(
    runner: &R,
    path: &CommandPath,
    help_flag: &str,
) -> CommandDetail {
    try_fetch_command_details(runner, path, help_flag).unwrap_or_else(|err| {
        warn!(command = %path, error = %err, "Error fetching details");
        CommandDetail::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_tree_core::FlagEntry;

    const COBRA_HELP: &str = "\
Manage local networks.

Usage:
  tool network [command]

Available Commands:
  start       Start a local network
  stop        Stop the running network

Flags:
  -h, --help            help for network
      --port int        port to bind
                        (default 9650)

Use \"tool network [command] --help\" for more information about a command.
";

    #[test]
    fn test_worked_example() {
        let detail = parse_command_details(
            "My tool.\n\nAvailable Commands:\n  add   Add a thing\n  rm    Remove a thing\n\nFlags:\n  -h, --help   help for tool\n",
        );
        assert_eq!(detail.description, "My tool.");

        let subcommands: Vec<(&str, &str)> = detail
            .subcommands
            .iter()
            .map(|(name, desc)| (name.as_str(), desc.as_str()))
            .collect();
        assert_eq!(
            subcommands,
            vec![("add", "Add a thing"), ("rm", "Remove a thing")]
        );
        assert_eq!(detail.flags["help"], FlagEntry::canonical("", "help for tool"));
        assert_eq!(detail.flags["-h"], FlagEntry::alias("help"));
        assert!(detail.diagnostics.is_empty());
    }

    #[test]
    fn test_cobra_layout() {
        let detail = parse_command_details(COBRA_HELP);
        assert_eq!(
            detail.description,
            "Manage local networks. Usage: tool network [command]"
        );
        assert_eq!(detail.subcommands.len(), 2);
        assert_eq!(detail.subcommands["stop"], "Stop the running network");
        // The trailing footer is flags-region text and continues the last flag.
        assert_eq!(
            detail.flags["port"],
            FlagEntry::canonical(
                "int",
                "port to bind (default 9650) Use \"tool network [command] --help\" for more information about a command."
            )
        );
    }

    #[test]
    fn test_without_commands_section_has_no_subcommands() {
        let detail = parse_command_details("Leaf command.\n\nFlags:\n      --force   do it\n");
        assert!(detail.subcommands.is_empty());
        assert_eq!(detail.flags.len(), 1);
    }

    #[test]
    fn test_without_flags_section_has_no_flags() {
        let detail =
            parse_command_details("Group.\n\nAvailable Commands:\n  one   First\n  two   Second\n");
        assert!(detail.flags.is_empty());
        assert_eq!(detail.subcommands.len(), 2);
    }

    #[test]
    fn test_without_sections_everything_is_description() {
        let detail = parse_command_details("  First line.\n\n  Second line.  \n--not-a-flag here\n");
        assert_eq!(
            detail.description,
            "First line. Second line. --not-a-flag here"
        );
        assert!(detail.flags.is_empty());
        assert!(detail.subcommands.is_empty());
    }

    #[test]
    fn test_headers_must_match_exactly() {
        let detail = parse_command_details("Tool.\nflags:\nAvailable commands:\n  x  y\n");
        assert_eq!(detail.description, "Tool. flags: Available commands: x  y");
        assert!(detail.subcommands.is_empty());
    }

    #[test]
    fn test_commands_header_after_flags_stays_in_flags() {
        let detail = parse_command_details(
            "Tool.\nFlags:\n      --alpha   first\nAvailable Commands:\n  late   Late command\n",
        );
        assert!(detail.subcommands.is_empty());
        assert_eq!(
            detail.flags["alpha"],
            FlagEntry::canonical("", "first Available Commands: late   Late command")
        );
    }

    #[test]
    fn test_single_token_rows_are_skipped_and_recorded() {
        let detail =
            parse_command_details("Available Commands:\n  lonely\n  real   Has a description\n");
        assert_eq!(detail.subcommands.len(), 1);
        assert_eq!(detail.diagnostics.skipped.len(), 1);
        assert_eq!(detail.diagnostics.skipped[0].region, Region::Commands);
        assert_eq!(detail.diagnostics.skipped[0].line, "lonely");
    }

    #[test]
    fn test_duplicate_rows_keep_first_listing() {
        let detail =
            parse_command_details("Available Commands:\n  run   First run\n  run   Second run\n");
        assert_eq!(detail.subcommands["run"], "First run");
        assert_eq!(
            detail.diagnostics.skipped[0].reason,
            SkipReason::DuplicateSubcommand
        );
    }

    #[test]
    fn test_to_node_drops_listing() {
        let detail =
            parse_command_details("Tool.\nAvailable Commands:\n  a   A\nFlags:\n      --x   x\n");
        let node = detail.to_node();
        assert_eq!(node.description, "Tool.");
        assert_eq!(node.flags.len(), 1);
        assert!(node.is_leaf());
    }

    #[test]
    fn test_empty_detail() {
        assert!(CommandDetail::empty().is_empty());
        assert!(parse_command_details("").is_empty());
    }

    struct Canned(Option<&'static str>);

    impl CommandRunner for Canned {
        fn run(&self, argv: &[String]) -> Result<String, ProcessError> {
            assert_eq!(argv, ["tool", "network", "-h"]);
            self.0.map(str::to_string).ok_or(ProcessError::NonZeroExit {
                command: argv.join(" "),
                code: Some(2),
            })
        }
    }

    fn network_path() -> CommandPath {
        CommandPath::parse("tool").unwrap().child("network").unwrap()
    }

    #[test]
    fn test_fetch_command_details_parses_output() {
        let detail = fetch_command_details(&Canned(Some(COBRA_HELP)), &network_path(), "-h");
        assert_eq!(detail.subcommands.len(), 2);
        assert!(detail.flags.contains_key("port"));
    }

    #[test]
    fn test_fetch_command_details_failure_yields_empty_record() {
        let detail = fetch_command_details(&Canned(None), &network_path(), "-h");
        assert!(detail.is_empty());
    }

    #[test]
    fn test_try_fetch_command_details_propagates_failure() {
        let err = try_fetch_command_details(&Canned(None), &network_path(), "-h").unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { code: Some(2), .. }));
    }
}
