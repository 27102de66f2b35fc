//! Output formatting and persistence for command tree documents.

use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use command_tree_core::{CommandPath, CommandTreeDocument};
use serde::Serialize;
use thiserror::Error;

use crate::tree::BuildReport;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// Picks the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(OsStr::to_str) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OutputError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Serializes any value in the requested format.
///
/// JSON is pretty-printed with two-space indentation and ends without a
/// trailing newline.
pub fn format_value<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

/// Formats a document in the requested output format.
///
/// # Examples
///
/// ```
/// use command_tree_core::{CommandNode, CommandTreeDocument};
/// use command_tree_discovery::output::{OutputFormat, format_document};
///
/// let doc = CommandTreeDocument::new("v1.0.0", CommandNode::new("My tool."));
/// let json = format_document(&doc, OutputFormat::Json).unwrap();
/// assert!(json.starts_with("{\n  \"version\": \"v1.0.0\""));
/// ```
pub fn format_document(
    document: &CommandTreeDocument,
    format: OutputFormat,
) -> Result<String, OutputError> {
    format_value(document, format)
}

/// Formats a build report in the requested output format.
pub fn format_report(report: &BuildReport, format: OutputFormat) -> Result<String, OutputError> {
    format_value(report, format)
}

/// Writes `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written document.
pub fn write_document_atomic(path: &Path, contents: &str) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| OutputError::io(dir, err))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".command-tree-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| OutputError::io(dir, err))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| OutputError::io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| OutputError::io(path, err.error))?;
    Ok(())
}

/// Reads a document back from disk; `.yaml`/`.yml` files are parsed as YAML,
/// anything else as JSON.
pub fn load_document(path: &Path) -> Result<CommandTreeDocument, OutputError> {
    let raw = fs::read_to_string(path).map_err(|err| OutputError::io(path, err))?;
    match OutputFormat::from_path(path) {
        OutputFormat::Json => Ok(serde_json::from_str(&raw)?),
        OutputFormat::Yaml => Ok(serde_yaml::from_str(&raw)?),
    }
}

/// File name used when a document is written into a directory:
/// `<program>_command_tree.<ext>`.
pub fn default_output_file(root: &CommandPath, format: OutputFormat) -> String {
    let program = Path::new(root.program())
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("tool");
    format!("{program}_command_tree.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_tree_core::{CommandNode, FlagEntry};
    use tempfile::TempDir;

    fn sample_document() -> CommandTreeDocument {
        let tree = CommandNode::new("My tool.")
            .with_flag("verbose", FlagEntry::canonical("", "enable verbose output"))
            .with_flag("-v", FlagEntry::alias("verbose"))
            .with_subcommand("add", CommandNode::new("Add a thing"));
        CommandTreeDocument::new("v1.2.3", tree)
    }

    #[test]
    fn test_format_document_json_shape() {
        let json = format_document(&sample_document(), OutputFormat::Json).unwrap();
        let expected = r#"{
  "version": "v1.2.3",
  "tree": {
    "description": "My tool.",
    "flags": {
      "verbose": {
        "type": "",
        "description": "enable verbose output"
      },
      "-v": {
        "aliasOf": "verbose"
      }
    },
    "subcommands": {
      "add": {
        "description": "Add a thing",
        "flags": {},
        "subcommands": {}
      }
    }
  }
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_format_document_yaml() {
        let yaml = format_document(&sample_document(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("version: v1.2.3"));
        assert!(yaml.contains("aliasOf: verbose"));
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tool.json");
        let doc = sample_document();
        let raw = format_document(&doc, OutputFormat::Json).unwrap();

        write_document_atomic(&path, &raw).unwrap();
        assert_eq!(load_document(&path).unwrap(), doc);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("tool.json")]);
    }

    #[test]
    fn test_atomic_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool.json");
        fs::write(&path, "stale").unwrap();
        write_document_atomic(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_load_yaml_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool.yml");
        let doc = sample_document();
        fs::write(&path, format_document(&doc, OutputFormat::Yaml).unwrap()).unwrap();
        assert_eq!(load_document(&path).unwrap(), doc);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = load_document(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_default_output_file_uses_program_basename() {
        let root = CommandPath::parse("/usr/local/bin/avalanche").unwrap();
        assert_eq!(
            default_output_file(&root, OutputFormat::Json),
            "avalanche_command_tree.json"
        );
        assert_eq!(
            default_output_file(&root, OutputFormat::Yaml),
            "avalanche_command_tree.yaml"
        );
    }
}
