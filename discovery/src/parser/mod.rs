//! Help output parsing.
//!
//! Two line-oriented state machines turn free-form help text into structure:
//!
//! - [`parse_command_details`] splits one help screen into description,
//!   subcommand listing and flags regions.
//! - [`parse_flags`] reconstructs flag entries (type hint, multi-line
//!   description, short alias) from the flags region.
//!
//! Both are best-effort heuristics tuned for Cobra-style help screens
//! (`Available Commands:` / `Flags:`). They never fail; lines that do not fit
//! are skipped and recorded in [`ParseDiagnostics`].

mod detail;
mod diagnostics;
mod flags;

pub use detail::{
    COMMANDS_HEADER, CommandDetail, FLAGS_HEADER, Region, fetch_command_details, fetch_help_text,
    parse_command_details, try_fetch_command_details,
};
pub use diagnostics::{ParseDiagnostics, SkipReason, SkippedLine};
pub use flags::{
    FlagBlockParser, FlagHeader, match_flag_header, parse_flags, parse_flags_with_diagnostics,
};
