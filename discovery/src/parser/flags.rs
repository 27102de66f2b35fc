//! Flag block parsing.
//!
//! Turns the raw lines of a `Flags:` section into a [`FlagMap`]. The parser
//! is a single-pass state machine; its only carried state is the flag whose
//! description is still being accumulated.
//!
//! A flag header looks like one of:
//!
//! ```text
//!   -v, --verbose          enable verbose output
//!       --timeout int      request timeout
//!       --config <path>
//! ```
//!
//! The type token must follow the long flag after exactly one space; column
//! padding (two or more spaces) starts the description instead. Any other
//! non-blank line continues the description of the current flag. This is a
//! heuristic for Cobra-style help, not a grammar.

use std::sync::LazyLock;

use command_tree_core::{FlagEntry, FlagMap};
use regex::Regex;
use tracing::debug;

use super::detail::Region;
use super::diagnostics::{ParseDiagnostics, SkipReason};

static FLAG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?:(?P<short>-[\w-]+),?\s*)?    # optional short flag: -v,
        --(?P<long>[\w-]+)              # required long flag: --verbose
        (?:\x20(?P<kind>[\w<>]+))?      # optional type token: int, <path>
        (?:\s+(?P<desc>.*?))?           # optional inline description
        \s*$
        ",
    )
    .expect("flag header regex")
});

/// Parsed pieces of one flag header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagHeader<'a> {
    pub short: Option<&'a str>,
    pub long: &'a str,
    pub type_hint: &'a str,
    pub description: &'a str,
}

/// Matches a flag header line, returning `None` for anything else.
///
/// # Examples
///
/// ```
/// use command_tree_discovery::parser::match_flag_header;
///
/// let header = match_flag_header("  -o, --output string   where to write").unwrap();
/// assert_eq!(header.short, Some("-o"));
/// assert_eq!(header.long, "output");
/// assert_eq!(header.type_hint, "string");
/// assert_eq!(header.description, "where to write");
///
/// assert!(match_flag_header("continuation text").is_none());
/// ```
pub fn match_flag_header(line: &str) -> Option<FlagHeader<'_>> {
    let caps = FLAG_HEADER.captures(line)?;
    let long = caps.name("long")?.as_str();
    Some(FlagHeader {
        short: caps.name("short").map(|m| m.as_str()),
        long,
        type_hint: caps.name("kind").map_or("", |m| m.as_str()),
        description: caps.name("desc").map_or("", |m| m.as_str().trim()),
    })
}

/// A long flag whose description lines are still being collected.
#[derive(Debug)]
struct PendingFlag {
    name: String,
    type_hint: String,
    fragments: Vec<String>,
}

impl PendingFlag {
    fn commit(self, flags: &mut FlagMap) {
        let description = self.fragments.join(" ").trim().to_string();
        flags.insert(
            self.name,
            FlagEntry::Canonical {
                type_hint: self.type_hint,
                description,
            },
        );
    }
}

/// Line-at-a-time flag block parser.
///
/// Feed lines with [`push_line`](Self::push_line) and call
/// [`finish`](Self::finish) to flush the last flag.
#[derive(Debug, Default)]
pub struct FlagBlockParser {
    flags: FlagMap,
    pending: Option<PendingFlag>,
    diagnostics: ParseDiagnostics,
}

impl FlagBlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if let Some(header) = match_flag_header(line) {
            self.start_flag(line, header);
            return;
        }

        let fragment = line.trim();
        if fragment.is_empty() {
            // Blank lines never end a description.
            return;
        }
        match self.pending.as_mut() {
            Some(pending) => pending.fragments.push(fragment.to_string()),
            None => {
                debug!(line = fragment, "Skipping flags line before first flag header");
                self.diagnostics
                    .record(Region::Flags, line, SkipReason::BeforeFirstFlag);
            }
        }
    }

    fn start_flag(&mut self, line: &str, header: FlagHeader<'_>) {
        if let Some(previous) = self.pending.take() {
            previous.commit(&mut self.flags);
        }

        let name = header.long.to_string();
        if self.flags.get(&name).is_some_and(|entry| !entry.is_alias()) {
            debug!(flag = %name, "Flag listed twice; later entry wins");
        }
        // Reserve the canonical slot now so the long flag precedes its alias
        // in the output; the description is filled in on commit.
        self.flags
            .insert(name.clone(), FlagEntry::canonical(header.type_hint, ""));
        if let Some(short) = header.short {
            self.record_alias(line, short, &name);
        }

        let fragments = if header.description.is_empty() {
            Vec::new()
        } else {
            vec![header.description.to_string()]
        };
        self.pending = Some(PendingFlag {
            name,
            type_hint: header.type_hint.to_string(),
            fragments,
        });
    }

    fn record_alias(&mut self, line: &str, short: &str, long: &str) {
        match self.flags.get(short).and_then(FlagEntry::alias_target) {
            Some(existing) if existing != long => {
                debug!(alias = short, kept = existing, rejected = long, "Conflicting short flag");
                let reason = SkipReason::ConflictingAlias {
                    kept: existing.to_string(),
                    rejected: long.to_string(),
                };
                self.diagnostics.record(Region::Flags, line, reason);
            }
            Some(_) => {}
            None => {
                self.flags.insert(short.to_string(), FlagEntry::alias(long));
            }
        }
    }

    /// Flushes the flag still being accumulated and returns the results.
    pub fn finish(mut self) -> (FlagMap, ParseDiagnostics) {
        if let Some(pending) = self.pending.take() {
            pending.commit(&mut self.flags);
        }
        (self.flags, self.diagnostics)
    }
}

/// Parses the lines of a flags section.
///
/// Long flags are keyed without `--`; short flags keep their dash and map to
/// `{aliasOf: <long>}`.
///
/// # Examples
///
/// ```
/// use command_tree_core::FlagEntry;
/// use command_tree_discovery::parser::parse_flags;
///
/// let flags = parse_flags(&[
///     "  -v, --verbose       enable verbose output",
///     "      --timeout int   request timeout",
///     "                      in seconds",
/// ]);
///
/// assert_eq!(flags["verbose"], FlagEntry::canonical("", "enable verbose output"));
/// assert_eq!(flags["-v"], FlagEntry::alias("verbose"));
/// assert_eq!(flags["timeout"], FlagEntry::canonical("int", "request timeout in seconds"));
/// ```
pub fn parse_flags<S: AsRef<str>>(lines: &[S]) -> FlagMap {
    parse_flags_with_diagnostics(lines).0
}

/// Like [`parse_flags`], also returning the lines that were skipped.
pub fn parse_flags_with_diagnostics<S: AsRef<str>>(lines: &[S]) -> (FlagMap, ParseDiagnostics) {
    let mut parser = FlagBlockParser::new();
    for line in lines {
        parser.push_line(line.as_ref());
    }
    parser.finish()
}
