//! End-to-end discovery against a real executable.
//!
//! A small shell script stands in for a Cobra-style CLI: three levels of
//! commands, one subcommand that fails and one that never answers.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use command_tree_core::{CommandPath, FlagEntry, UNKNOWN_VERSION, validate_document};
use command_tree_discovery::discover;
use command_tree_discovery::output::{OutputFormat, format_document};
use command_tree_discovery::runner::ProcessRunner;
use command_tree_discovery::tree::{BuildIssue, DiscoveryError, TreeBuilder, TreeConfig};
use tempfile::TempDir;

const FAKE_TOOL: &str = r#"#!/bin/sh
case "$*" in
"--version")
    echo "faketool version 0.9.1 (build 1234)"
    ;;
"-h")
    cat <<'EOF'
Faketool drives fake networks.

Usage:
  faketool [command]

Available Commands:
  net         Manage networks
  broken      Always fails
  hang        Never answers

Flags:
  -h, --help            help for faketool
  -v, --verbose         enable verbose output
EOF
    ;;
"net -h")
    cat <<'EOF'
Manage networks.

Available Commands:
  start       Start a network
  stop        Stop a network

Flags:
      --name string   network name
EOF
    ;;
"net start -h")
    cat <<'EOF'
Start a local network.

Flags:
      --port int      port to bind
                      (default 9650)
EOF
    ;;
"net stop -h")
    cat <<'EOF'
Flags:
      --force         stop without waiting
EOF
    ;;
"broken -h")
    echo "broken: internal error" >&2
    exit 3
    ;;
"hang -h")
    exec sleep 30
    ;;
*)
    echo "unknown command: $*" >&2
    exit 1
    ;;
esac
"#;

/// Temporary directory holding the fake tool script.
struct FakeTool {
    _dir: TempDir,
    path: PathBuf,
}

impl FakeTool {
    fn install() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("faketool");
        fs::write(&path, FAKE_TOOL).expect("failed to write fake tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod fake tool");
        Self { _dir: dir, path }
    }

    fn command(&self) -> &str {
        self.path.to_str().expect("temp path is not UTF-8")
    }

    fn root(&self) -> CommandPath {
        CommandPath::parse(self.command()).expect("invalid root path")
    }
}

fn fast_config() -> TreeConfig {
    TreeConfig::default().with_timeout(Duration::from_millis(750))
}

fn builder(config: TreeConfig) -> TreeBuilder<ProcessRunner> {
    TreeBuilder::new(ProcessRunner::new(config.timeout), config)
}

#[test]
fn test_discovers_three_level_hierarchy() {
    let tool = FakeTool::install();
    let build = builder(fast_config()).build_document(&tool.root()).unwrap();
    let doc = &build.document;

    assert_eq!(doc.version, "v0.9.1");
    assert_eq!(
        doc.tree.description,
        "Faketool drives fake networks. Usage: faketool [command]"
    );
    let keys: Vec<&str> = doc.tree.subcommands.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["net", "broken", "hang"]);
    assert_eq!(doc.tree.flags["-v"], FlagEntry::alias("verbose"));

    let start = doc.tree.find(&["net", "start"]).unwrap();
    assert_eq!(
        start.flags["port"],
        FlagEntry::canonical("int", "port to bind (default 9650)")
    );
    // No description of its own: the parent's listing text is used.
    let stop = doc.tree.find(&["net", "stop"]).unwrap();
    assert_eq!(stop.description, "Stop a network");

    assert_eq!(doc.tree.depth(), 2);
    assert!(validate_document(doc).is_empty());
}

#[test]
fn test_failing_and_hanging_subcommands_degrade() {
    let tool = FakeTool::install();
    let started = Instant::now();
    let build = builder(fast_config()).build_document(&tool.root()).unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));

    let broken = &build.document.tree.subcommands["broken"];
    assert_eq!(broken.description, "Always fails");
    assert!(broken.is_leaf() && broken.flags.is_empty());

    let hang = &build.document.tree.subcommands["hang"];
    assert_eq!(hang.description, "Never answers");

    let failures: Vec<(&str, &str)> = build
        .report
        .issues
        .iter()
        .filter_map(|issue| match issue {
            BuildIssue::HelpUnavailable { path, error } => {
                Some((path.last(), error.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, "broken");
    assert!(failures[0].1.contains("status 3"), "{}", failures[0].1);
    assert_eq!(failures[1].0, "hang");
    assert!(failures[1].1.contains("timed out"), "{}", failures[1].1);

    // The walk went on past both failures.
    assert!(build.document.tree.find(&["net", "stop"]).is_some());
}

#[test]
fn test_repeated_discovery_is_byte_identical() {
    let tool = FakeTool::install();
    let config = fast_config().skip("hang");
    let first = discover(tool.command(), &config).unwrap();
    let second = discover(tool.command(), &config).unwrap();

    let first = format_document(&first.document, OutputFormat::Json).unwrap();
    let second = format_document(&second.document, OutputFormat::Json).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parallel_discovery_matches_sequential() {
    let tool = FakeTool::install();
    let config = fast_config().skip("hang");
    let sequential = discover(tool.command(), &config).unwrap();
    let parallel = discover(tool.command(), &config.clone().with_jobs(4)).unwrap();
    assert_eq!(sequential.document, parallel.document);
}

#[test]
fn test_missing_tool_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-tool");
    let err = discover(missing.to_str().unwrap(), &fast_config()).unwrap_err();
    assert!(matches!(err, DiscoveryError::RootUnavailable { .. }), "{err}");
}

#[test]
fn test_non_semver_version_output_is_unknown() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "#!/bin/sh\necho 'build 7'\n");
    let build = discover(path.to_str().unwrap(), &fast_config()).unwrap();
    assert_eq!(build.document.version, UNKNOWN_VERSION);
    assert_eq!(build.document.tree.description, "build 7");
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("tool");
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
