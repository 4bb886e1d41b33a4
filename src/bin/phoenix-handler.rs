use phoenix_handler::config::{default_config_path, load_config};
use phoenix_handler::core::db::SqliteDriver;
use phoenix_handler::render::parse_statement;
use phoenix_handler::{DatabaseHandler, HandlerError, PhoenixHandler, QueryResult, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "\
Usage: phoenix-handler [--config <path>] <command>

Commands:
  check              Check that a connection can be made
  tables             List tables
  columns <table>    List the columns of a table
  native <sql>       Run SQL text as-is
  query <sql>        Parse SQL, render it for Phoenix and run it";

/// A parsed command line.
#[derive(Debug, PartialEq)]
enum Command {
    Check,
    Tables,
    Columns(String),
    Native(String),
    Query(String),
}

fn parse_args(args: &[String]) -> std::result::Result<(Option<PathBuf>, Command), String> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        ["check"] => Command::Check,
        ["tables"] => Command::Tables,
        ["columns", table] => Command::Columns(table.to_string()),
        ["native", sql @ ..] if !sql.is_empty() => Command::Native(sql.join(" ")),
        ["query", sql @ ..] if !sql.is_empty() => Command::Query(sql.join(" ")),
        _ => return Err(USAGE.to_string()),
    };
    Ok((config, command))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(config_path: Option<PathBuf>, command: Command) -> Result<bool> {
    let path = config_path
        .or_else(default_config_path)
        .ok_or_else(|| HandlerError::Config("no configuration directory found".to_string()))?;
    let config = load_config(&path)?;
    info!("Using configuration {}", path.display());

    let mut handler = PhoenixHandler::from_config(SqliteDriver, config);
    let result = match command {
        Command::Check => {
            let status = handler.check_connection();
            print_json(&status)?;
            return Ok(status.success);
        }
        Command::Tables => handler.get_tables(),
        Command::Columns(table) => handler.get_columns(&table),
        Command::Native(sql) => handler.native_query(&sql),
        Command::Query(sql) => handler.query(&parse_statement(&sql)?),
    };
    print_json(&result)?;
    Ok(!matches!(result, QueryResult::Error { .. }))
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(usage) => {
            eprintln!("{}", usage);
            return ExitCode::from(2);
        }
    };

    match run(config_path, command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_args(&args(&["check"])).unwrap(), (None, Command::Check));
        assert_eq!(
            parse_args(&args(&["--config", "c.toml", "columns", "users"])).unwrap(),
            (Some(PathBuf::from("c.toml")), Command::Columns("users".to_string()))
        );
        assert_eq!(
            parse_args(&args(&["native", "SELECT", "1"])).unwrap().1,
            Command::Native("SELECT 1".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["columns"])).is_err());
        assert!(parse_args(&args(&["native"])).is_err());
        assert!(parse_args(&args(&["check", "--config"])).is_err());
    }
}
