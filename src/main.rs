use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::{LoxError, Reporter, EXIT_IO_ERROR, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::session::{self, Status};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print each token as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },
}

/// Prints every diagnostic to stderr as soon as it is reported.
struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&mut self, error: LoxError) {
        debug!("Reporting error (line {:?}): {}", error.line(), error.message());
        eprintln!("{}", error);
    }
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    let source = String::from_utf8(buf)
        .map_err(LoxError::from)
        .context(format!("File {:?} is not valid UTF-8", filename))?;

    Ok(source)
}

/// [`read_file`], exiting with 74 and the full context chain on failure.
fn read_source(filename: PathBuf) -> String {
    match read_file(filename) {
        Ok(source) => source,
        Err(e) => {
            debug!("Input error: {:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_IO_ERROR);
        }
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn no_input(command: &str) -> ! {
    info!("No filepath provided for {}", command);
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let Some(filename) = filename else {
                no_input("Tokenize")
            };

            info!("Running Tokenize subcommand");
            let source = read_source(filename);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let mut tokenized = true;

            for token in Scanner::new(&source) {
                match token {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);

                        if json {
                            let line = serde_json::to_string(&token)
                                .context("Failed to serialize token")?;
                            writeln!(out, "{}", line)?;
                        } else {
                            writeln!(out, "{}", token)?;
                        }
                    }

                    Err(e) => {
                        tokenized = false;
                        debug!("Tokenization debug: {}", e);
                        eprintln!("{}", e);
                    }
                }
            }

            out.flush()?;

            if !tokenized {
                debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);
                std::process::exit(EXIT_STATIC_ERROR);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename else {
                no_input("Parse")
            };

            info!("Running Parse subcommand");
            let source = read_source(filename);
            let tokens = scan_or_exit(&source);
            let mut parser = Parser::new(&tokens);

            match parser.parse_expression() {
                Ok(expr) => {
                    let ast_str = AstPrinter::print(&expr);

                    debug!("AST: {}", ast_str);
                    println!("{}", ast_str);
                }

                Err(e) => {
                    debug!("Parse debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Evaluate { filename } => {
            let Some(filename) = filename else {
                no_input("Evaluate")
            };

            info!("Running Evaluate subcommand");
            let source = read_source(filename);
            let tokens = scan_or_exit(&source);
            let mut parser = Parser::new(&tokens);

            let expr = match parser.parse_expression() {
                Ok(expr) => expr,
                Err(e) => {
                    debug!("Parse debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            };

            let mut interpreter = Interpreter::new(io::stdout());

            match interpreter.evaluate(&expr) {
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }

                Err(e) => {
                    debug!("Evaluation debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(EXIT_RUNTIME_ERROR);
                }
            }

            info!("Evaluate subcommand completed");
        }

        Commands::Run { filename } => {
            let Some(filename) = filename else {
                no_input("Run")
            };

            info!("Running Run subcommand");
            let source = read_source(filename);
            info!("Provided input:\n {}", source);

            let status = session::run(&source, io::stdout().lock(), &mut StderrReporter);

            info!("Run finished with status {:?}", status);

            if status != Status::Success {
                std::process::exit(status.exit_code());
            }
        }
    }

    Ok(())
}

/// Scan `source` for the single-expression commands, exiting with 65 after
/// printing every lexical error.
fn scan_or_exit(source: &str) -> Vec<rox::token::Token<'_>> {
    let (tokens, errors) = rox::scanner::scan(source);

    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{}", e);
        }
        std::process::exit(EXIT_STATIC_ERROR);
    }

    tokens
}
