use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use vore::{MatchConfig, Session, compile};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Vore program to run
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Files to search; a `use` statement in the program replaces these
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Log more (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Matcher steps allowed per start position
    #[arg(long, value_name = "N")]
    step_budget: Option<u64>,

    /// Maximum matcher nesting depth
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
        Err(err) => err.exit(),
    };

    if let Err(err) = logging::setup(args.verbose) {
        eprintln!("Failed to set up logging: {err:#}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("Failed to read {}", args.source.display()))?;
    let program = compile(&source).with_context(|| format!("In {}", args.source.display()))?;

    let defaults = MatchConfig::default();
    let mut session = Session::new(MatchConfig {
        step_budget: args.step_budget.unwrap_or(defaults.step_budget),
        max_depth: args.max_depth.unwrap_or(defaults.max_depth),
    });
    for path in &args.inputs {
        session.add_file(path)?;
    }

    let reports = session.execute(&program)?;
    for report in &reports {
        println!("{report}");
    }
    for path in session.written() {
        println!("{} written.", path.display());
    }
    Ok(())
}
