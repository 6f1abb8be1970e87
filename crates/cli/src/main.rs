mod check;
mod load;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use crate::check::CheckReport;

#[derive(Parser)]
#[command(name = "flagtree")]
#[command(version, about = "Parse argument vectors against a flagtree command schema", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse arguments and print the result as JSON
    Parse(ParseArgs),

    /// Print the help text for a command path
    Help(HelpArgs),

    /// Validate a schema file
    Check(CheckArgs),
}

#[derive(Parser)]
struct ParseArgs {
    /// Path to the command schema (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Parser options (JSON); overrides options embedded in the schema
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dotenv file overlaid on the process environment
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Arguments to parse, after `--`
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[derive(Parser)]
struct HelpArgs {
    /// Path to the command schema (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Parser options (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command path below the root, e.g. `remote add`
    #[arg(value_name = "COMMAND")]
    path: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the command schema (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Parser options (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only output JSON (no human-readable output)
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse(args) => parse(args),
        Commands::Help(args) => help(args),
        Commands::Check(args) => check_command(args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn parse(args: ParseArgs) -> Result<ExitCode> {
    tracing::debug!("executing parse command");
    let mut parser = load::build_parser(&args.schema, args.config.as_deref())?;
    let env = load::environment(args.env_file.as_deref())?;

    match parser.parse_with_env(args.args, &env) {
        Ok(_) => {
            let matches = parser.matches();
            let json = if args.pretty {
                serde_json::to_string_pretty(&matches)?
            } else {
                serde_json::to_string(&matches)?
            };
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_sentinel() => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(e.message().as_bytes())?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::debug!(kind = %e.kind(), "parse failed");
            eprintln!("error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn help(args: HelpArgs) -> Result<ExitCode> {
    let parser = load::build_parser(&args.schema, args.config.as_deref())?;
    let path: Vec<&str> = args.path.iter().map(String::as_str).collect();
    let Some(text) = parser.help_for(&path) else {
        bail!("no command `{}' in {}", path.join(" "), args.schema.display());
    };
    print!("{text}");
    Ok(ExitCode::SUCCESS)
}

fn check_command(args: CheckArgs) -> Result<ExitCode> {
    tracing::debug!("executing check command");

    let parser = load::build_parser(&args.schema, args.config.as_deref())
        .with_context(|| format!("schema check failed for {}", args.schema.display()))?;
    let report = CheckReport::new(&args.schema.display().to_string(), &parser);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("=== Schema Check Results ===");
    eprintln!("Schema: {}", report.schema);
    eprintln!("Root command: {}", report.command);
    eprintln!(
        "Commands: {}, flags: {}, positionals: {}, depth: {}",
        report.commands, report.flags, report.positionals, report.max_depth
    );
    eprintln!("OK: schema is valid");
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
