//! Basic help text parsing example.
//!
//! Demonstrates how to use `parse_command_details()` to split one captured
//! Cobra-style help screen into description, subcommands and flags without
//! executing any commands.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p command-tree-discovery --example parse_help
//! ```

use command_tree_discovery::parser::parse_command_details;

fn main() {
    // Example help text (Cobra-style)
    let help_text = r#"The Avalanche-CLI is a command-line tool for building blockchains.

Usage:
  avalanche [command]

Available Commands:
  blockchain  Create and deploy blockchains
  config      Modify configuration for Avalanche-CLI
  key         Create and manage testnet signing keys
  network     Manage locally deployed subnets

Flags:
      --config string       config file (default is $HOME/.avalanche-cli/config.json)
  -h, --help                help for avalanche
      --log-level string    log level for the application
                            (default "ERROR")
      --skip-update-check   skip check for new versions
  -v, --version             version for avalanche
"#;

    let detail = parse_command_details(help_text);

    println!("Description: {}", detail.description);

    println!("\nSubcommands ({}):", detail.subcommands.len());
    for (name, description) in &detail.subcommands {
        println!("  {name:<12}{description}");
    }

    println!("\nFlags ({}):", detail.flags.len());
    for (name, entry) in &detail.flags {
        match entry.alias_target() {
            Some(target) => println!("  {name} -> {target}"),
            None => {
                let kind = entry.type_hint().unwrap_or_default();
                let desc = entry.description().unwrap_or("(no description)");
                println!("  {name} [{kind}]  {desc}");
            }
        }
    }

    if !detail.diagnostics.is_empty() {
        println!("\nWarnings:");
        for warning in detail.diagnostics.warnings() {
            println!("  - {warning}");
        }
    }

    println!("\nAs JSON:");
    match serde_json::to_string_pretty(&detail) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}
