use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use command_tree_core::{CommandPath, validate_document};
use command_tree_discovery::output::{
    OutputFormat, default_output_file, format_document, format_report, format_value,
    load_document, write_document_atomic,
};
use command_tree_discovery::parser::parse_command_details;
use command_tree_discovery::runner::{DEFAULT_TIMEOUT_MS, ProcessRunner};
use command_tree_discovery::tree::{
    DEFAULT_HELP_FLAG, DEFAULT_MAX_DEPTH, DEFAULT_PROBE_BUDGET, DEFAULT_VERSION_FLAG, TreeBuilder,
    TreeConfig,
};
use command_tree_discovery::version::detect_version;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "command-tree")]
#[command(about = "Discover a CLI tool's command tree from its help output")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk a tool's help output and write its command tree document.
    Build(BuildArgs),
    /// Print the version detected for a tool.
    Version(VersionArgs),
    /// Parse help text from a file without executing commands.
    ParseFile(ParseFileArgs),
    /// Parse help text from stdin without executing commands.
    ParseStdin(ParseStdinArgs),
    /// Check a command tree document for structural problems.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Tool to discover, optionally with leading arguments ("docker compose").
    tool: String,
    /// Output file, or a directory to write <tool>_command_tree.<ext> into.
    /// Prints to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
    /// Also write the build report (issues, degraded nodes) to this file.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Deepest subcommand level that is still queried.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Maximum number of help queries for the whole tree.
    #[arg(long, default_value_t = DEFAULT_PROBE_BUDGET)]
    budget: usize,
    /// Time budget for each query in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
    /// Number of sibling subtrees queried in parallel.
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// Comma-separated subcommands to list without querying.
    #[arg(long, value_delimiter = ',')]
    skip: Vec<String>,
    /// Fail on cycles, depth or budget limits instead of recording them.
    #[arg(long)]
    strict: bool,
    /// Argument that makes the tool print help.
    #[arg(long, default_value = DEFAULT_HELP_FLAG, allow_hyphen_values = true)]
    help_flag: String,
    /// Argument that makes the tool print its version.
    #[arg(long, default_value = DEFAULT_VERSION_FLAG, allow_hyphen_values = true)]
    version_flag: String,
}

impl BuildArgs {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            help_flag: self.help_flag.clone(),
            version_flag: self.version_flag.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            max_depth: self.max_depth,
            probe_budget: self.budget,
            jobs: self.jobs.max(1),
            skip_subcommands: self.skip.clone(),
            strict: self.strict,
        }
    }
}

#[derive(Debug, Args)]
struct VersionArgs {
    /// Tool to query.
    tool: String,
    /// Argument that makes the tool print its version.
    #[arg(long, default_value = DEFAULT_VERSION_FLAG, allow_hyphen_values = true)]
    version_flag: String,
    /// Time budget for the query in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
}

#[derive(Debug, Args)]
struct ParseFileArgs {
    /// Path to file containing help text.
    #[arg(long)]
    input: PathBuf,
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ParseStdinArgs {
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Document to check (.json, or .yaml/.yml).
    document: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Command::Build(args) => run_build(args),
        Command::Version(args) => run_version(args),
        Command::ParseFile(args) => run_parse_file(args),
        Command::ParseStdin(args) => run_parse_stdin(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the document.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_build(args: BuildArgs) -> Result<(), String> {
    let root = CommandPath::parse(&args.tool).map_err(|err| err.to_string())?;
    let config = args.tree_config();
    let builder = TreeBuilder::new(ProcessRunner::new(config.timeout), config);
    let build = builder.build_document(&root).map_err(|err| err.to_string())?;

    let raw = format_document(&build.document, args.format).map_err(|err| err.to_string())?;
    match &args.output {
        Some(output) => {
            let path = resolve_output_path(output, &root, args.format);
            write_document_atomic(&path, &raw).map_err(|err| err.to_string())?;
            println!(
                "Wrote command tree for '{root}' ({} command(s)) to '{}'.",
                build.report.nodes,
                path.display()
            );
        }
        None => println!("{raw}"),
    }

    if let Some(report_path) = &args.report {
        let report_raw = format_report(&build.report, OutputFormat::from_path(report_path))
            .map_err(|err| err.to_string())?;
        write_document_atomic(report_path, &report_raw).map_err(|err| err.to_string())?;
    }

    info!(
        tool = %root,
        version = %build.document.version,
        nodes = build.report.nodes,
        issues = build.report.issues.len(),
        "CLI command tree generated"
    );

    let failed = build.report.failed_nodes();
    if failed > 0 {
        eprintln!("{failed} command(s) could not be queried and were kept without details.");
    }
    if build.report.was_truncated() {
        eprintln!("Discovery stopped early on some branches; see the build report for details.");
    }

    Ok(())
}

/// An existing directory gets the default file name appended.
fn resolve_output_path(output: &Path, root: &CommandPath, format: OutputFormat) -> PathBuf {
    if output.is_dir() {
        output.join(default_output_file(root, format))
    } else {
        output.to_path_buf()
    }
}

fn run_version(args: VersionArgs) -> Result<(), String> {
    let root = CommandPath::parse(&args.tool).map_err(|err| err.to_string())?;
    let runner = ProcessRunner::new(Duration::from_millis(args.timeout_ms));
    println!("{}", detect_version(&runner, &root, &args.version_flag));
    Ok(())
}

fn run_parse_file(args: ParseFileArgs) -> Result<(), String> {
    let help_text = fs::read_to_string(&args.input)
        .map_err(|err| format!("Failed to read '{}': {err}", args.input.display()))?;
    run_parse_help_text(&help_text, args.format)
}

fn run_parse_stdin(args: ParseStdinArgs) -> Result<(), String> {
    let mut help_text = String::new();
    std::io::stdin()
        .read_to_string(&mut help_text)
        .map_err(|err| format!("Failed to read stdin: {err}"))?;
    run_parse_help_text(&help_text, args.format)
}

fn run_parse_help_text(help_text: &str, format: OutputFormat) -> Result<(), String> {
    let detail = parse_command_details(help_text);
    for warning in detail.diagnostics.warnings() {
        eprintln!("warning: {warning}");
    }
    let output = format_value(&detail, format).map_err(|err| err.to_string())?;
    println!("{output}");
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let document = load_document(&args.document).map_err(|err| err.to_string())?;
    let errors = validate_document(&document);
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("  {err}");
        }
        return Err(format!(
            "'{}' has {} validation error(s)",
            args.document.display(),
            errors.len()
        ));
    }

    println!(
        "Validated '{}': version {}, {} command(s).",
        args.document.display(),
        document.version,
        document.tree.node_count()
    );
    Ok(())
}
