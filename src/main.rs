use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use loxide as lox;

use clap::Parser as ClapParser;
use clap::Subcommand;

use lox::ast_printer::AstPrinter;
use lox::driver::{Driver, Mode};
use lox::parser::Parser;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a Lox script from a given valid filepath
    Run { filename: PathBuf },

    /// Starts an interactive session; globals persist between lines
    Repl,

    /// Tokenizes the provided input and prints the token stream
    Tokenize { filename: PathBuf },

    /// Parses the provided input and prints the syntax tree
    Parse { filename: PathBuf },
}

fn read_source(filename: &PathBuf) -> anyhow::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(filename)?);

    reader.read_to_end(&mut buf)?;

    Ok(String::from_utf8(buf)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.commands {
        Commands::Run { filename } => {
            let source: String = read_source(&filename)?;

            let mut driver: Driver = Driver::new();

            driver.run(&source, Mode::File);

            if driver.had_compile_error() {
                std::process::exit(65);
            }

            if driver.had_runtime_error() {
                std::process::exit(70);
            }
        }

        Commands::Repl => {
            let mut driver: Driver = Driver::new();
            let stdin = io::stdin();

            loop {
                print!("> ");
                io::stdout().flush()?;

                let mut line: String = String::new();

                if stdin.read_line(&mut line)? == 0 {
                    break;
                }

                // Errors are printed but never exit the session.
                driver.run(&line, Mode::Repl);
            }
        }

        Commands::Tokenize { filename } => {
            let source: String = read_source(&filename)?;

            let mut tokenized: bool = true;

            for token in Scanner::new(&source) {
                match token {
                    Ok(token) => println!("{}", token),

                    Err(e) => {
                        tokenized = false;
                        eprintln!("{}", e);
                    }
                }
            }

            if !tokenized {
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            let source: String = read_source(&filename)?;

            let tokens: Vec<Token> = Scanner::new(&source).filter_map(Result::ok).collect();

            let (statements, errors) = Parser::new(tokens).parse();

            for e in &errors {
                eprintln!("{}", e);
            }

            for stmt in &statements {
                println!("{}", AstPrinter::print_stmt(stmt));
            }

            if !errors.is_empty() {
                std::process::exit(65);
            }
        }
    }

    Ok(())
}
