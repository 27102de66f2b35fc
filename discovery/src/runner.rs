//! Process execution for help and version queries.
//!
//! Every query is a direct `exec` of the tool (no shell), with stdin closed,
//! a scratch working directory, a probe environment that disables pagers and
//! colors, and a hard time budget. Only stdout is returned; stderr is drained
//! and discarded so a chatty tool cannot block on a full pipe.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

/// Timeout for a single help or version query (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

const PIPE_GRACE: Duration = Duration::from_millis(100);

/// Failure to obtain output from one external invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The argv was empty.
    #[error("empty command line")]
    EmptyCommand,

    /// The program does not exist on `PATH` or at the given location.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The program exists but could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the child failed.
    #[error("failed waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The child did not exit within the time budget and was killed.
    #[error("'{command}' timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The child exited unsuccessfully (`code` is `None` when killed by a signal).
    #[error("'{command}' exited with status {}", exit_label(.code))]
    NonZeroExit { command: String, code: Option<i32> },
}

/// Executes one command line and returns its standard output.
///
/// This is the seam between the tree walk and the outside world; tests
/// substitute an in-memory tool.
pub trait CommandRunner: Send + Sync {
    /// Runs `argv` (program followed by arguments) and returns stdout with
    /// trailing whitespace trimmed.
    fn run(&self, argv: &[String]) -> Result<String, ProcessError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String]) -> Result<String, ProcessError> {
        (**self).run(argv)
    }
}

/// Runs real processes with a timeout.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use command_tree_discovery::runner::{CommandRunner, ProcessRunner};
///
/// let runner = ProcessRunner::new(Duration::from_secs(2));
/// let help = runner.run(&["git".to_string(), "-h".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    env: Vec<(String, String)>,
    isolate_cwd: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            env: default_probe_env()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            isolate_cwd: true,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Adds or overrides one environment variable for every query.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.retain(|(existing, _)| existing != key);
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Runs queries in the caller's working directory instead of a scratch
    /// directory.
    pub fn inherit_cwd(mut self) -> Self {
        self.isolate_cwd = false;
        self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String]) -> Result<String, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        let command_line = argv.join(" ");
        let timeout_ms = self.timeout.as_millis() as u64;

        // Help queries of misbehaving tools sometimes drop files in the
        // current directory; keep them in a throwaway one.
        let scratch = if self.isolate_cwd {
            tempfile::Builder::new()
                .prefix("command-tree-probe-")
                .tempdir()
                .ok()
        } else {
            None
        };

        let mut command = Command::new(resolve_program(program));
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = scratch.as_ref() {
            command.current_dir(dir.path());
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        debug!(command = %command_line, "Running query");
        let deadline = Instant::now() + self.timeout;
        let mut child = command.spawn().map_err(|source| match source.kind() {
            ErrorKind::NotFound => ProcessError::NotFound {
                program: program.clone(),
            },
            _ => ProcessError::Spawn {
                program: program.clone(),
                source,
            },
        })?;

        // Drain both pipes in background threads to prevent deadlock when
        // the child's pipe buffer fills before it exits.
        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                debug!(command = %command_line, timeout_ms, "Query timed out, killing process");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Timeout {
                    command: command_line,
                    timeout_ms,
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Wait {
                    command: command_line,
                    source,
                });
            }
        };

        // A background process left behind by the tool can inherit the pipes
        // and keep them open after the tool itself exits.
        let Some(stdout) = collect(stdout_rx, deadline) else {
            debug!(command = %command_line, timeout_ms, "Output pipe still open after exit");
            return Err(ProcessError::Timeout {
                command: command_line,
                timeout_ms,
            });
        };
        let stderr = collect(stderr_rx, deadline).unwrap_or_default();
        if !stderr.is_empty() {
            debug!(command = %command_line, stderr_len = stderr.len(), "Discarding stderr output");
        }

        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                command: command_line,
                code: status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
    }
}

/// Anchors relative program paths (`./bin/tool`) to our working directory,
/// since the child runs elsewhere.
fn resolve_program(program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path);
        }
    }
    path.to_path_buf()
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!(error = %e, "Failed to read child pipe");
            }
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Waits for a drained pipe until `deadline`, or for a short grace when the
/// deadline is already close. `None` means the pipe never reached end of
/// file in time.
fn collect(rx: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    let Some(rx) = rx else {
        return Some(Vec::new());
    };
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(PIPE_GRACE);
    match rx.recv_timeout(wait) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn default_probe_env() -> Vec<(&'static str, &'static str)> {
    vec![
        // Prevent graphical helpers from opening windows during probes.
        ("DISPLAY", ""),
        ("WAYLAND_DISPLAY", ""),
        ("BROWSER", "true"),
        ("DEBIAN_FRONTEND", "noninteractive"),
        ("TERM", "dumb"),
        ("NO_COLOR", "1"),
        // Help routed through a pager would otherwise wait for a keypress.
        ("PAGER", "cat"),
        ("MANPAGER", "cat"),
        ("SYSTEMD_PAGER", "cat"),
        ("GIT_PAGER", "cat"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| (*part).to_string()).collect()
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        let runner = ProcessRunner::default();
        assert!(matches!(runner.run(&[]), Err(ProcessError::EmptyCommand)));
    }

    #[test]
    fn test_missing_program_reports_not_found() {
        let runner = ProcessRunner::default();
        let err = runner
            .run(&argv(&["command-tree-definitely-not-installed-xyz", "-h"]))
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn test_resolve_program_anchors_relative_paths_only() {
        assert_eq!(resolve_program("git"), PathBuf::from("git"));
        assert_eq!(resolve_program("/usr/bin/git"), PathBuf::from("/usr/bin/git"));
        let anchored = resolve_program("./bin/tool");
        assert!(anchored.is_absolute());
        assert!(anchored.ends_with("bin/tool"));
    }

    #[test]
    fn test_with_env_replaces_existing_key() {
        let runner = ProcessRunner::default().with_env("PAGER", "less");
        let pagers: Vec<&str> = runner
            .env
            .iter()
            .filter(|(key, _)| key == "PAGER")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(pagers, vec!["less"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_trimmed_and_stderr_discarded() {
        let runner = ProcessRunner::default();
        let out = runner
            .run(&argv(&["sh", "-c", "echo 'hello  '; echo noise >&2; echo"]))
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_queries_run_in_scratch_directory_unless_inherited() {
        let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
        let pwd = argv(&["sh", "-c", "pwd -P"]);

        let scratch = ProcessRunner::default().run(&pwd).unwrap();
        assert_ne!(PathBuf::from(scratch), cwd);

        let inherited = ProcessRunner::default().inherit_cwd().run(&pwd).unwrap();
        assert_eq!(PathBuf::from(inherited), cwd);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_error() {
        let runner = ProcessRunner::default();
        let err = runner.run(&argv(&["sh", "-c", "echo out; exit 3"])).unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { code: Some(3), .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_hanging_process() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = runner.run(&argv(&["sh", "-c", "exec sleep 5"])).unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { timeout_ms: 200, .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_background_child_holding_stdout_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = runner
            .run(&argv(&["sh", "-c", "sleep 5 & echo started"]))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { timeout_ms: 300, .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
