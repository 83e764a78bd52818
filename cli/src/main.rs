use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use cligram_core::{App, ChartParser, CommandSchema, Fields, InvokeOptions, lexer, validate_schema};
use cligram_sources::{EnvFileSource, EnvSource, Layered, TomlSource};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `cligram=debug`).
const LOG_ENV: &str = "CLIGRAM_LOG";

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "cligram")]
#[command(about = "Compile command models into grammars and parse command lines against them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a command model file.
    Check(CheckArgs),
    /// Print the grammar compiled from a command model.
    Grammar(GrammarArgs),
    /// Parse one command line and print the resolved fields.
    Parse(ParseArgs),
    /// Parse every line of a file in parallel.
    Batch(BatchArgs),
    /// Resolve configuration from the command line, environment and files.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Command model (YAML or JSON).
    model: PathBuf,
}

#[derive(Debug, Args)]
struct GrammarArgs {
    /// Command model (YAML or JSON).
    model: PathBuf,
    /// Print only the SHA-256 fingerprint of the grammar.
    #[arg(long)]
    fingerprint: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Command model (YAML or JSON).
    model: PathBuf,
    /// Skip required/arity validation.
    #[arg(long)]
    no_validate: bool,
    /// Print the raw parse tree instead of the resolved fields.
    #[arg(long)]
    tree: bool,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// The command line, starting with the root command name.
    #[arg(last = true, required = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// Command model (YAML or JSON).
    model: PathBuf,
    /// File with one command line per line.
    #[arg(long)]
    input: PathBuf,
    /// Number of parallel parse jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    /// Skip required/arity validation.
    #[arg(long)]
    no_validate: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Command model (YAML or JSON).
    model: PathBuf,
    /// Prefix for environment variables (default: the root command name).
    #[arg(long)]
    env_prefix: Option<String>,
    /// Optional `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Include the layer that supplied each value.
    #[arg(long)]
    origins: bool,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// The command line, starting with the root command name.
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Grammar(args) => run_grammar(args),
        Command::Parse(args) => run_parse(args),
        Command::Batch(args) => run_batch(args),
        Command::Resolve(args) => run_resolve(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_schema(path: &Path) -> Result<CommandSchema, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let schema = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|err| format!("Failed to parse '{}': {err}", path.display()))?
    } else {
        serde_json::from_str(&raw).map_err(|err| format!("Failed to parse '{}': {err}", path.display()))?
    };
    debug!(path = %path.display(), yaml = is_yaml, "Loaded command model");
    Ok(schema)
}

fn load_app(path: &Path, validate: bool) -> Result<App<Fields>, String> {
    let schema = load_schema(path)?;
    let app = App::passthrough(&schema).map_err(|err| format!("Invalid model '{}': {err}", path.display()))?;
    Ok(app.with_options(InvokeOptions::new().with_validate(validate)))
}

fn print_output<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<(), String> {
    let rendered = match format {
        CliOutputFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|err| format!("Failed to serialize output: {err}"))?
        }
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|err| format!("Failed to serialize output: {err}"))?
        }
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let schema = load_schema(&args.model)?;
    let errors = validate_schema(&schema);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}: {error}", args.model.display());
        }
        return Err(format!("{} problem(s) in '{}'", errors.len(), args.model.display()));
    }

    let grammar = cligram_core::compile(&schema).map_err(|err| err.to_string())?;
    println!(
        "Model '{}' is valid: {} rule(s), fingerprint {}.",
        schema.name,
        grammar.len(),
        grammar.fingerprint()
    );
    Ok(())
}

fn run_grammar(args: GrammarArgs) -> Result<(), String> {
    let schema = load_schema(&args.model)?;
    let grammar = cligram_core::compile(&schema).map_err(|err| format!("Invalid model '{}': {err}", args.model.display()))?;
    if args.fingerprint {
        println!("{}", grammar.fingerprint());
    } else {
        print!("{grammar}");
    }
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let app = load_app(&args.model, !args.no_validate)?;

    if args.tree {
        let parser = ChartParser::new(app.grammar());
        let tree = parser.parse(&lexer::join_args(&args.args)).map_err(|err| err.to_string())?;
        return print_output(&tree, args.format);
    }

    let fields = app.invoke_args(&args.args).map_err(|err| err.to_string())?;
    print_output(&fields, args.format)
}

// ---------------------------------------------------------------------------
// batch command
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BatchEntry {
    line: usize,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_batch(args: BatchArgs) -> Result<(), String> {
    use rayon::prelude::*;

    let app = load_app(&args.model, !args.no_validate)?;
    let raw = fs::read_to_string(&args.input)
        .map_err(|err| format!("Failed to read '{}': {err}", args.input.display()))?;
    let lines: Vec<(usize, &str)> = raw
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let jobs = args
        .jobs
        .filter(|jobs| *jobs > 0)
        .unwrap_or_else(rayon::current_num_threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;

    let entries: Vec<BatchEntry> = pool.install(|| {
        lines
            .par_iter()
            .map(|(line, input)| match app.invoke_str(input) {
                Ok(fields) => BatchEntry {
                    line: *line,
                    input: input.to_string(),
                    fields: Some(fields),
                    error: None,
                },
                Err(err) => BatchEntry {
                    line: *line,
                    input: input.to_string(),
                    fields: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    });

    let failures = entries.iter().filter(|entry| entry.error.is_some()).count();
    debug!(lines = entries.len(), failures, jobs, "Parsed batch");
    print_output(&entries, CliOutputFormat::Json)?;

    if failures > 0 {
        return Err(format!("{failures} of {} line(s) failed to parse", entries.len()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// resolve command
// ---------------------------------------------------------------------------

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let schema = load_schema(&args.model)?;
    let prefix = args.env_prefix.unwrap_or_else(|| schema.name.clone());

    let mut builder = Layered::builder();
    if !args.args.is_empty() {
        builder = builder.with_cli(args.args);
    }
    builder = builder.with_source(EnvSource::from_process(&prefix));
    if let Some(path) = args.env_file {
        builder = builder.with_source(EnvFileSource::new(path, &prefix).required());
    }
    if let Some(path) = args.config {
        builder = builder.with_source(TomlSource::new(path).required());
    }

    let layered = builder
        .build(&schema)
        .map_err(|err| format!("Invalid model '{}': {err}", args.model.display()))?;
    let resolution = layered.read().map_err(|err| err.to_string())?;

    if args.origins {
        print_output(&resolution, args.format)
    } else {
        print_output(&resolution.value, args.format)
    }
}
