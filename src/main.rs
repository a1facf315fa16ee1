mod debug_report;

use outfitter::discovery::{DiscoveryOptions, discover};
use outfitter::{CancelFlag, FileOrdering, InMemoryRecords, Options, analyze};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let cancel = CancelFlag::new();
    let discovery = DiscoveryOptions { parallel: config.parallel, ..Default::default() };
    let files = match discover(&config.data_dir, &discovery, &cancel) {
        Ok(files) => files,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    // No plugin reader here: records are empty, so the report covers files and
    // conflicts; resolution needs a host that supplies characters.
    let records = InMemoryRecords::new();
    let options = Options { ordering: config.ordering, parallel: config.parallel };
    let analysis = match analyze(&files, &records, &options, &cancel) {
        Ok(analysis) => analysis,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    debug_report::print_run(&config.data_dir, &files, &analysis, config.color, config.conflicts_only);
}

struct CliConfig {
    data_dir: PathBuf,
    ordering: FileOrdering,
    parallel: bool,
    color: bool,
    conflicts_only: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut data_dir: Option<PathBuf> = None;
    let mut ordering = FileOrdering::default();
    let mut parallel = true;
    let mut color = io::stdout().is_terminal();
    let mut conflicts_only = false;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("outfitter {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--no-parallel" => parallel = false,
            "--conflicts-only" => conflicts_only = true,
            "--order" => {
                let value = args.next().ok_or_else(|| "error: --order expects a value".to_string())?;
                ordering = parse_ordering(&value)?;
            }
            _ if arg.starts_with("--order=") => {
                ordering = parse_ordering(arg.trim_start_matches("--order="))?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if data_dir.is_some() {
                    return Err("error: data directory provided multiple times".to_string());
                }
                data_dir = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(data_dir) = data_dir else {
        return Err(format!("error: no data directory provided\n\n{}", help_text()));
    };

    Ok(CliConfig { data_dir, ordering, parallel, color, conflicts_only })
}

fn parse_ordering(value: &str) -> Result<FileOrdering, String> {
    match value {
        "dialect" => Ok(FileOrdering::DialectThenPath),
        "path" => Ok(FileOrdering::PathOnly),
        _ => Err(format!("error: invalid --order '{value}' (expected 'dialect' or 'path')")),
    }
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "outfitter {version}

Outfit distribution rule checker for SPID and SkyPatcher files.

Usage:
  outfitter [OPTIONS] <data-dir>

Options:
  --order <dialect|path>     File load order used to settle conflicts.
                             Default: dialect (SPID files before SkyPatcher).
  --conflicts-only           Only print the conflict section.
  --no-parallel              Read files and compare entries on one thread.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  RUST_LOG                   Log filter for diagnostics on stderr. Default: warn

Exit codes:
  0  Success.
  1  Data directory missing or analysis failed.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
