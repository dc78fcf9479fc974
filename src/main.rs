use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use treelox::ast_printer::AstPrinter;
use treelox::interpreter::Interpreter;
use treelox::lox::{Lox, Reporter, Status, StderrReporter};
use treelox::parser::Parser;
use treelox::scanner::Scanner;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Lox scripting language", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to treelox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as JSON, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse {
        filename: PathBuf,

        /// Print the AST as JSON instead of prefix form
        #[arg(long)]
        json: bool,
    },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a program
    Run { filename: PathBuf },

    /// Starts an interactive prompt (the default)
    Repl,
}

/// Reads a script through a read-only memory map.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is copied out and dropped before returning; scripts
    // are not expected to be rewritten while being loaded.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map file {:?}", filename))?;

    let source = std::str::from_utf8(&mmap)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("treelox.log").context("Failed to create treelox.log")?;

    Builder::new()
        .format(|buf, record| {
            let path: &str = record.module_path().unwrap_or("<unnamed>");
            let module: &str = path.strip_prefix("treelox::").unwrap_or(path);
            writeln!(
                buf,
                "[{} {}:{}] - {}",
                Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // RUST_LOG overrides below
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to treelox.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<Status> {
    info!("Running Tokenize subcommand");

    let source = read_file(filename)?;
    let mut status = Status::Ok;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) if json => println!("{}", serde_json::to_string(&token)?),
            Ok(token) => println!("{}", token),
            Err(e) => {
                status = Status::StaticError;
                eprintln!("{}", e);
            }
        }
    }

    Ok(status)
}

fn parse(filename: &Path, json: bool) -> Result<Status> {
    info!("Running Parse subcommand");

    let source = read_file(filename)?;
    let (tokens, lex_errors) = Scanner::new(&source).scan_tokens();
    let mut reporter = StderrReporter;

    for e in &lex_errors {
        reporter.report(e);
    }

    match Parser::new(&tokens).parse_expression() {
        Ok(expr) if lex_errors.is_empty() => {
            if json {
                println!("{}", serde_json::to_string_pretty(&expr)?);
            } else {
                let ast = AstPrinter::print(&expr);
                debug!("AST: {}", ast);
                println!("{}", ast);
            }
            Ok(Status::Ok)
        }
        Ok(_) => Ok(Status::StaticError),
        Err(errors) => {
            for e in &errors {
                reporter.report(e);
            }
            Ok(Status::StaticError)
        }
    }
}

fn evaluate(filename: &Path) -> Result<Status> {
    info!("Running Evaluate subcommand");

    let source = read_file(filename)?;
    let (tokens, lex_errors) = Scanner::new(&source).scan_tokens();
    let mut reporter = StderrReporter;

    for e in &lex_errors {
        reporter.report(e);
    }

    let expr = match Parser::new(&tokens).parse_expression() {
        Ok(expr) if lex_errors.is_empty() => expr,
        Ok(_) => return Ok(Status::StaticError),
        Err(errors) => {
            for e in &errors {
                reporter.report(e);
            }
            return Ok(Status::StaticError);
        }
    };

    let mut interpreter = Interpreter::new();

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            Ok(Status::Ok)
        }
        Err(e) => {
            reporter.report(&e);
            Ok(Status::RuntimeError)
        }
    }
}

fn run(filename: &Path) -> Result<Status> {
    info!("Running Run subcommand");

    let source = read_file(filename)?;
    let mut lox = Lox::new();

    Ok(lox.run(&source, &mut StderrReporter))
}

fn repl() -> Result<Status> {
    info!("Starting REPL");

    let mut lox = Lox::new();
    let mut reporter = StderrReporter;
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            println!();
            break;
        }

        // Errors were reported; the session carries on regardless.
        let status = lox.run(&line, &mut reporter);
        debug!("REPL line finished with {:?}", status);
    }

    Ok(Status::Ok)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let status = match args.commands.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename, json } => tokenize(&filename, json)?,
        Commands::Parse { filename, json } => parse(&filename, json)?,
        Commands::Evaluate { filename } => evaluate(&filename)?,
        Commands::Run { filename } => run(&filename)?,
        Commands::Repl => repl()?,
    };

    if status != Status::Ok {
        debug!("Exiting with code {}", status.exit_code());
        std::process::exit(status.exit_code());
    }

    Ok(())
}
