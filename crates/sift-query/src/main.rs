//! Sift - query a JSON array from the command line
//!
//! # Usage
//!
//! ```bash
//! # Names starting with test_
//! sift 'test_*' --data items.json
//!
//! # id 2 or the item named test_item, one result per line
//! cat items.json | sift "[2, 'test_item']" -o lines
//!
//! # Expression queries are off unless asked for
//! sift -x '?x["id"] > 1' --data items.json
//! ```

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use sift_query::{default_registry, Query, QueryConfig};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(author, version, about = "Run a query against a JSON array of objects")]
struct Args {
    /// Query text (id, pattern, list, tuple or ?expression)
    query: String,

    /// JSON file holding an array of candidates (default: stdin)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// YAML or JSON engine configuration
    #[arg(short, long, env = "SIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable ?expression queries
    #[arg(short = 'x', long)]
    allow_expressions: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Exit with status 2 when nothing matched
    #[arg(long)]
    fail_empty: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON array
    Json,
    /// One compact JSON value per line
    Lines,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = run(&args, stdin.lock(), &mut stdout.lock());
    if let Err(err) = &result {
        eprintln!("error: {err:#}");
    }
    ExitCode::from(exit_status(&result, args.fail_empty))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 0 on success, 1 on error, 2 when nothing matched under `--fail-empty`.
fn exit_status(result: &anyhow::Result<usize>, fail_empty: bool) -> u8 {
    match result {
        Ok(0) if fail_empty => 2,
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Run the query and write the matches to `out`. Candidates come from
/// `--data` when given, otherwise from `stdin`.
///
/// Returns the number of matches written.
fn run<R: Read, W: Write>(args: &Args, stdin: R, out: &mut W) -> anyhow::Result<usize> {
    let mut config = match &args.config {
        Some(path) => QueryConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => QueryConfig::default(),
    };
    if args.allow_expressions {
        config.allow_expressions = true;
    }

    let candidates = match &args.data {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            load_candidates(file, &path.display().to_string())?
        }
        None => load_candidates(stdin, "stdin")?,
    };
    let registry = default_registry(&config).context("failed to build registry")?;
    debug!(matchers = registry.len(), candidates = candidates.len(), "registry ready");

    let query = Query::from(args.query.as_str());
    let matched = registry
        .match_all(&query, &candidates)
        .with_context(|| format!("query {:?} failed", args.query))?;

    write_matches(out, &matched, args.output)?;
    Ok(matched.len())
}

fn write_matches<W: Write>(
    out: &mut W,
    matched: &[&Value],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, matched)?;
            writeln!(out)?;
        }
        OutputFormat::Lines => {
            for item in matched {
                serde_json::to_writer(&mut *out, item)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn load_candidates<R: Read>(mut reader: R, source: &str) -> anyhow::Result<Vec<Value>> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .with_context(|| format!("failed to read {source}"))?;

    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {source}"))?;
    match value {
        Value::Array(items) => Ok(items),
        other => bail!(
            "expected a JSON array of candidates in {source}, found {}",
            kind_name(&other)
        ),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
