//! Falsetto CLI: read an FL source file, compile it to C, write the
//! result. No subcommands — compilation is the only verb.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    Trace,
    Info,
    Warn,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Compile an FL source file to portable ISO C.
#[derive(Debug, Parser)]
#[command(name = "falsetto", version, about)]
struct Cli {
    /// FL source file to compile.
    #[arg(short, long)]
    input: PathBuf,

    /// Destination for the emitted C. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Logging verbosity.
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Warn)]
    loglevel: LogLevel,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.loglevel.as_filter()))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("falsetto: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> falsetto::error::Result<()> {
    tracing::info!(input = %cli.input.display(), "reading source");
    let source = fs::read_to_string(&cli.input)?;

    let c_source = falsetto::compile_source(&source)?;
    tracing::info!("compilation succeeded, writing output");

    match &cli.output {
        Some(path) => fs::write(path, c_source)?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(c_source.as_bytes())?;
        }
    }

    Ok(())
}
