use serde_json::Value;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "Usage: jmatch [OPTIONS] <QUERY> [FILE]";

fn print_help() {
    println!(
        "jmatch {VERSION} - path queries over JSON documents, with write access

{USAGE}

Arguments:
  <QUERY>    jmatch path expression (e.g. \"friends[age > 30].name\")
  [FILE]     Input JSON file (reads from stdin if omitted)

Options:
  --set <JSON>   Set the matched values to the given JSON value and print
                 the resulting document
  --delete       Delete the matched values and print the resulting document
  -h, --help     Show this help message
  -V, --version  Show version

Without --set or --delete the matched values are printed as a JSON array."
    );
}

fn print_version() {
    println!("jmatch {VERSION}");
}

enum Operation {
    Values,
    Set(String),
    Delete,
}

enum ParsedArgs {
    Help,
    Version,
    Query {
        query: String,
        file: Option<String>,
        operation: Operation,
    },
}

fn parse_args() -> Result<ParsedArgs, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        return Err(format!(
            "missing required argument: <QUERY>\n\n{USAGE}\n\nFor more information, try '--help'"
        ));
    }

    let mut positional = Vec::new();
    let mut operation = Operation::Values;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParsedArgs::Help),
            "-V" | "--version" => return Ok(ParsedArgs::Version),
            "--delete" => operation = Operation::Delete,
            "--set" => {
                let value = iter.next().ok_or_else(|| {
                    format!("--set requires a JSON value\n\n{USAGE}")
                })?;
                operation = Operation::Set(value);
            }
            s if s.starts_with('-') => {
                return Err(format!(
                    "unknown option: {s}\n\n{USAGE}\n\nFor more information, try '--help'"
                ));
            }
            _ => positional.push(arg),
        }
    }

    match positional.len() {
        0 => Err(format!(
            "missing required argument: <QUERY>\n\n{USAGE}\n\nFor more information, try '--help'"
        )),
        1 | 2 => {
            let mut iter = positional.into_iter();
            Ok(ParsedArgs::Query {
                query: iter.next().unwrap_or_default(),
                file: iter.next(),
                operation,
            })
        }
        _ => Err(format!(
            "too many arguments\n\n{USAGE}\n\nFor more information, try '--help'"
        )),
    }
}

fn read_input(file: Option<&str>) -> Result<String, String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).map_err(|e| format!("error reading file '{path}': {e}"))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("error reading stdin: {e}"))?;
            Ok(buffer)
        }
    }
}

fn print_pretty(value: &Value) -> Result<(), String> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| format!("error serializing output: {e}"))?;
    println!("{output}");
    Ok(())
}

fn run() -> Result<(), String> {
    let args = parse_args()?;

    match args {
        ParsedArgs::Help => {
            print_help();
            Ok(())
        }
        ParsedArgs::Version => {
            print_version();
            Ok(())
        }
        ParsedArgs::Query {
            query,
            file,
            operation,
        } => {
            let input = read_input(file.as_deref())?;

            let json: Value =
                serde_json::from_str(&input).map_err(|e| format!("error parsing JSON: {e}"))?;

            let mut match_set = jmatch_core::match_path(&query, json)
                .map_err(|e| format!("error matching query: {e}"))?;

            match operation {
                Operation::Values => {
                    let values = match_set
                        .values()
                        .map_err(|e| format!("error reading values: {e}"))?;
                    print_pretty(&Value::Array(values))
                }
                Operation::Set(raw) => {
                    let value: Value = serde_json::from_str(&raw)
                        .map_err(|e| format!("error parsing --set value: {e}"))?;
                    let mutated = match_set
                        .set(value)
                        .map_err(|e| format!("error setting values: {e}"))?;
                    print_pretty(&mutated)
                }
                Operation::Delete => {
                    let mutated = match_set
                        .delete()
                        .map_err(|e| format!("error deleting values: {e}"))?;
                    print_pretty(&mutated)
                }
            }
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jmatch: {e}");
            ExitCode::FAILURE
        }
    }
}
