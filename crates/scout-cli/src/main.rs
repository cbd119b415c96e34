use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use scout_engine::{Config, DynamicEvent, Ruleset};
use scout_rule::decode_rule_str;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Compile detection rules and evaluate events against them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile all rules under one or more directories and report results
    Check {
        /// Rule directories to scan recursively
        #[arg(required = true)]
        directories: Vec<PathBuf>,

        /// Show each compile failure (not just the summary)
        #[arg(short, long)]
        verbose: bool,

        /// Treat YAML decode failures as fatal
        #[arg(long)]
        fail_on_yaml: bool,

        /// Treat rule compile failures as fatal
        #[arg(long)]
        fail_on_rule: bool,
    },

    /// Parse a condition expression and print the AST as JSON
    Condition {
        /// The condition expression to parse
        expr: String,
    },

    /// Evaluate JSON events against compiled rules
    ///
    /// Load rules from a file or directory, then evaluate events. Events
    /// come from a single JSON string (--event) or as NDJSON
    /// (newline-delimited JSON) on stdin.
    Eval {
        /// Path to a rule file or directory of rules
        #[arg(short, long)]
        rules: PathBuf,

        /// A single event as a JSON string (if omitted, reads NDJSON from stdin)
        #[arg(short, long)]
        event: Option<String>,

        /// A file containing a JSON array of events
        #[arg(long, conflicts_with = "event")]
        events: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Disable whitespace-collapsing normalization during matching
        #[arg(long)]
        no_collapse_ws: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            directories,
            verbose,
            fail_on_yaml,
            fail_on_rule,
        } => cmd_check(directories, verbose, fail_on_yaml, fail_on_rule),
        Commands::Condition { expr } => cmd_condition(expr),
        Commands::Eval {
            rules,
            event,
            events,
            pretty,
            no_collapse_ws,
        } => cmd_eval(rules, event, events, pretty, no_collapse_ws),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_check(
    directories: Vec<PathBuf>,
    verbose: bool,
    fail_on_yaml: bool,
    fail_on_rule: bool,
) {
    let config = Config {
        directories,
        fail_on_yaml_parse: fail_on_yaml,
        fail_on_rule_parse: fail_on_rule,
        no_collapse_ws: false,
    };

    let set = match Ruleset::load(&config) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let stats = set.stats();
    println!("Compiled {} rule document(s)", stats.total);
    println!("  Ok:          {}", stats.ok);
    println!("  Failed:      {}", stats.failed);
    println!("  Unsupported: {}", stats.unsupported);

    if verbose {
        let errors = set.errors();
        if !errors.is_empty() {
            println!("\nProblems:");
            for err in &errors {
                println!("  - {err}");
            }
        }
    }

    if stats.failed > 0 {
        process::exit(1);
    }
}

fn cmd_condition(expr: String) {
    match scout_rule::parse_condition(&expr) {
        Ok(ast) => print_json(&ast, true),
        Err(e) => {
            eprintln!("Condition parse error: {e}");
            process::exit(1);
        }
    }
}

fn cmd_eval(
    rules_path: PathBuf,
    event_json: Option<String>,
    events_path: Option<PathBuf>,
    pretty: bool,
    no_collapse_ws: bool,
) {
    let set = load_ruleset(&rules_path, no_collapse_ws);
    let stats = set.stats();
    eprintln!(
        "Loaded {} rules from {} ({} failed, {} unsupported)",
        stats.ok,
        rules_path.display(),
        stats.failed,
        stats.unsupported
    );

    if let Some(path) = events_path {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            }
        };
        let values: Vec<serde_json::Value> = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Invalid JSON event array in {}: {e}", path.display());
                process::exit(1);
            }
        };

        let mut match_count = 0u64;
        for value in &values {
            if let Some(results) = set.eval_all(&DynamicEvent::from_value(value)) {
                for result in &results {
                    match_count += 1;
                    print_json(result, pretty);
                }
            }
        }
        eprintln!("Processed {} events, {match_count} matches.", values.len());
    } else if let Some(json_str) = event_json {
        let value: serde_json::Value = match serde_json::from_str(&json_str) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Invalid JSON event: {e}");
                process::exit(1);
            }
        };

        match set.eval_all(&DynamicEvent::from_value(&value)) {
            Some(results) => {
                for result in &results {
                    print_json(result, pretty);
                }
            }
            None => eprintln!("No matches."),
        }
    } else {
        let stdin = io::stdin();
        let mut line_num = 0u64;
        let mut match_count = 0u64;

        for line in stdin.lock().lines() {
            line_num += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Error reading line {line_num}: {e}");
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("Invalid JSON on line {line_num}: {e}");
                    continue;
                }
            };

            if let Some(results) = set.eval_all(&DynamicEvent::from_value(&value)) {
                for result in &results {
                    match_count += 1;
                    print_json(result, pretty);
                }
            }
        }

        eprintln!("Processed {line_num} events, {match_count} matches.");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_ruleset(path: &Path, no_collapse_ws: bool) -> Ruleset {
    if path.is_dir() {
        let config = Config {
            directories: vec![path.to_path_buf()],
            no_collapse_ws,
            ..Config::default()
        };
        match Ruleset::load(&config) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("Error loading rules from {}: {e}", path.display());
                process::exit(1);
            }
        }
    } else {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            }
        };
        match decode_rule_str(&text, path.to_path_buf(), no_collapse_ws) {
            Ok(handle) => Ruleset::from_handles(vec![handle]),
            Err(e) => {
                eprintln!("Error decoding {}: {e}", path.display());
                process::exit(1);
            }
        }
    }
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
