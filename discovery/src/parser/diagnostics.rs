//! Diagnostics for lines the parsers could not place.
//!
//! Help text parsing is heuristic. Lines that do not fit the expected shape
//! are skipped rather than treated as errors; they are recorded here so a
//! malformed help screen can be debugged without re-running the tool.

use serde::{Deserialize, Serialize};

use super::detail::Region;

/// Why a line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Non-blank text in a flags block before any flag header.
    BeforeFirstFlag,
    /// A command listing row with a name but no description.
    MissingSubcommandDescription,
    /// A command listing row repeating an earlier name.
    DuplicateSubcommand,
    /// A short flag already mapped to a different long flag.
    ConflictingAlias { kept: String, rejected: String },
}

/// One skipped line together with the region it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub region: Region,
    pub line: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostics {
    pub skipped: Vec<SkippedLine>,
}

impl ParseDiagnostics {
    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn record(&mut self, region: Region, line: &str, reason: SkipReason) {
        self.skipped.push(SkippedLine {
            region,
            line: line.trim().to_string(),
            reason,
        });
    }

    pub fn extend(&mut self, other: ParseDiagnostics) {
        self.skipped.extend(other.skipped);
    }

    /// Human-readable summary, one entry per skip category.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let before_flag = self.count(|reason| matches!(reason, SkipReason::BeforeFirstFlag));
        if before_flag > 0 {
            warnings.push(format!(
                "Skipped {before_flag} line(s) in flags section before the first flag"
            ));
        }

        let missing = self.count(|reason| {
            matches!(reason, SkipReason::MissingSubcommandDescription)
        });
        if missing > 0 {
            warnings.push(format!(
                "Skipped {missing} command listing row(s) without a description"
            ));
        }

        let duplicates = self.count(|reason| matches!(reason, SkipReason::DuplicateSubcommand));
        if duplicates > 0 {
            warnings.push(format!("Ignored {duplicates} duplicate subcommand row(s)"));
        }

        for skipped in &self.skipped {
            if let SkipReason::ConflictingAlias { kept, rejected } = &skipped.reason {
                warnings.push(format!(
                    "Short flag in '{}' already aliases {kept}; ignored alias to {rejected}",
                    skipped.line
                ));
            }
        }

        warnings
    }

    fn count(&self, predicate: impl Fn(&SkipReason) -> bool) -> usize {
        self.skipped
            .iter()
            .filter(|skipped| predicate(&skipped.reason))
            .count()
    }
}
