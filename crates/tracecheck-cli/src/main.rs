//! Tracecheck CLI
//!
//! The `tracecheck` command inspects recorded agent traces and test results.
//!
//! ## Commands
//!
//! - `summary`: Print the pass/fail summary of a dataset's results file
//! - `pairs`: Show how tool calls were paired with their outputs
//! - `select`: Query messages or tool calls with field filters
//! - `render`: Render a trace with addresses highlighted

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use tracecheck_core::{
    read_results, render_summary, render_trace, summarize, Address, Config, Provenance, Selector,
    Trace,
};

#[derive(Parser)]
#[command(name = "tracecheck")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provenance-tracked assertions over agent traces", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the results recorded for a dataset
    Summary {
        /// Dataset name (default: TRACECHECK_DATASET)
        #[arg(short, long, env = "TRACECHECK_DATASET")]
        dataset: String,

        /// Directory holding results files (default: TRACECHECK_RESULTS_DIR or <tmp>/tracecheck_runner)
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Pair tool calls with their outputs
    Pairs {
        /// Trace file (JSON array of messages, or {"trace": [...], "metadata": {...}})
        trace: PathBuf,

        /// Print pairs as JSON
        #[arg(long)]
        as_json: bool,
    },

    /// Select messages (or tool calls) matching every FIELD=VALUE filter
    Select {
        trace: PathBuf,

        /// Filter, e.g. `role=assistant` or `tool_call_id=1`. Dotted keys
        /// descend into nested fields.
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// Query tool calls instead of messages
        #[arg(long)]
        tool_calls: bool,
    },

    /// Render a trace with the given addresses highlighted
    Render {
        trace: PathBuf,

        /// Address to highlight, e.g. `1.content:6-11` (repeatable)
        #[arg(short, long = "address")]
        addresses: Vec<String>,

        /// Terminal width (default: TRACECHECK_TERMINAL_WIDTH or 80)
        #[arg(short, long)]
        width: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracecheck_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Summary {
            dataset,
            results_dir,
        } => cmd_summary(&dataset, results_dir),
        Commands::Pairs { trace, as_json } => cmd_pairs(&trace, as_json),
        Commands::Select {
            trace,
            fields,
            tool_calls,
        } => cmd_select(&trace, &fields, tool_calls),
        Commands::Render {
            trace,
            addresses,
            width,
        } => cmd_render(&trace, &addresses, width),
    }
}

fn load_trace(path: &Path) -> Result<Trace> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file {}", path.display()))?;
    let trace = Trace::from_json(&raw)
        .with_context(|| format!("Invalid trace in {}", path.display()))?;
    info!(path = %path.display(), messages = trace.len(), "loaded trace");
    Ok(trace)
}

/// Summarize a dataset's results; fails when any test failed.
fn cmd_summary(dataset: &str, results_dir: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_env()
        .context("Failed to load tracecheck configuration")?
        .with_dataset(dataset);
    if let Some(dir) = results_dir {
        config = config.with_results_dir(dir);
    }
    let path = config
        .results_file()
        .context("Result persistence is disabled")?;

    let records = read_results(&path)
        .with_context(|| format!("Failed to read results from {}", path.display()))?;
    print!("{}", render_summary(&records, &path));

    let summary = summarize(&records);
    if summary.failed > 0 {
        bail!("{} of {} tests failed", summary.failed, summary.total);
    }
    Ok(())
}

#[derive(Serialize)]
struct PairView {
    call: Address,
    name: Value,
    output: Address,
}

fn cmd_pairs(path: &Path, as_json: bool) -> Result<()> {
    let trace = load_trace(path)?;
    let pairs: Vec<PairView> = trace
        .tool_pairs()
        .into_iter()
        .map(|pair| PairView {
            call: first_address(&pair.call),
            name: pair
                .call
                .path("function.name")
                .or_else(|| pair.call.path("name"))
                .map(|v| v.to_json())
                .unwrap_or(Value::Null),
            output: first_address(&pair.output),
        })
        .collect();
    let unpaired: Vec<Address> = trace
        .unpaired_tool_calls()
        .iter()
        .map(first_address)
        .collect();

    if as_json {
        let out = serde_json::json!({ "pairs": pairs, "unpaired": unpaired });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if pairs.is_empty() && unpaired.is_empty() {
        println!("No tool calls in {}", path.display());
        return Ok(());
    }
    for pair in &pairs {
        println!("{} {} -> {}", pair.call, pair.name, pair.output);
    }
    for call in &unpaired {
        println!("{call} (no output)");
    }
    Ok(())
}

fn first_address(value: &impl Provenance) -> Address {
    value
        .addresses()
        .first()
        .cloned()
        .unwrap_or_else(|| Address::new(""))
}

/// Split `key=value`.
fn parse_filter(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Filter must look like FIELD=VALUE, got {raw:?}");
    };
    if key.is_empty() {
        bail!("Filter has an empty field name: {raw:?}");
    }
    Ok((key.to_string(), value.to_string()))
}

/// Command-line values are untyped: `1` matches both `"1"` and `1`.
fn loose_eq(expected: &str, actual: &Value) -> bool {
    match actual {
        Value::String(s) => s == expected,
        Value::Number(n) => expected.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => expected == b.to_string(),
        _ => false,
    }
}

fn cmd_select(path: &Path, fields: &[String], tool_calls: bool) -> Result<()> {
    let trace = load_trace(path)?;
    let mut selector = Selector::all();
    for raw in fields {
        let (key, expected) = parse_filter(raw)?;
        selector = selector.field_with(key, move |actual: &Value| loose_eq(&expected, actual));
    }

    let selected = if tool_calls {
        trace.tool_calls(&selector)?
    } else {
        trace.messages(&selector)?
    };
    if selected.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for value in selected {
        println!("{}\t{}", first_address(&value), value.to_json());
    }
    Ok(())
}

fn cmd_render(path: &Path, raw_addresses: &[String], width: Option<usize>) -> Result<()> {
    let trace = load_trace(path)?;
    let addresses = raw_addresses
        .iter()
        .map(|raw| Address::parse(raw).with_context(|| format!("Invalid address {raw:?}")))
        .collect::<Result<Vec<_>>>()?;
    let width = match width {
        Some(w) => w,
        None => Config::from_env()?.terminal_width,
    };
    print!("{}", render_trace(&trace, &addresses, width));
    Ok(())
}
