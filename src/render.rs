//! Rendering of parsed statements into Phoenix SQL.
//!
//! Phoenix writes rows with `UPSERT INTO` and has no `UPDATE` statement.
//! `PhoenixRenderer` rewrites the former and, when fallback is allowed,
//! passes the latter through as generic SQL for the server to judge.
use crate::core::{HandlerError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

static INSERT_INTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*INSERT\s+INTO\b").expect("valid INSERT INTO pattern"));

/// Turns a parsed statement into text for one SQL dialect.
pub trait SqlRenderer {
    /// Dialect token, e.g. `phoenix`.
    fn dialect(&self) -> &str;

    /// Renders `ast`.
    ///
    /// With `with_fallback`, constructs the dialect cannot express are
    /// rendered as generic SQL instead of failing.
    fn render(&self, ast: &Statement, with_fallback: bool) -> Result<String>;
}

/// Renderer for Apache Phoenix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoenixRenderer;

impl PhoenixRenderer {
    pub const DIALECT: &'static str = "phoenix";

    fn unsupported(&self, generic: String, construct: &str, with_fallback: bool) -> Result<String> {
        if with_fallback {
            warn!("Phoenix cannot express {}, falling back to generic SQL", construct);
            Ok(generic)
        } else {
            Err(HandlerError::Render(format!(
                "{} is not supported by the {} dialect",
                construct,
                Self::DIALECT
            )))
        }
    }
}

impl SqlRenderer for PhoenixRenderer {
    fn dialect(&self) -> &str {
        Self::DIALECT
    }

    fn render(&self, ast: &Statement, with_fallback: bool) -> Result<String> {
        let generic = ast.to_string();
        let rendered = match ast {
            Statement::Insert { .. } => {
                if INSERT_INTO.is_match(&generic) {
                    INSERT_INTO.replace(&generic, "UPSERT INTO").into_owned()
                } else {
                    self.unsupported(generic, "INSERT without INTO", with_fallback)?
                }
            }
            Statement::Update { .. } => self.unsupported(generic, "UPDATE", with_fallback)?,
            _ => generic,
        };
        debug!("Rendered statement for {}: {}", Self::DIALECT, rendered);
        Ok(rendered)
    }
}

/// Parses SQL text into statements using the generic dialect.
///
/// # Errors
///
/// Returns `HandlerError::Parse` when the text is not valid SQL.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>> {
    let dialect = GenericDialect {};
    Ok(Parser::parse_sql(&dialect, sql)?)
}

/// Parses text that must hold exactly one statement.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let mut statements = parse_sql(sql)?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        n => Err(HandlerError::Render(format!(
            "expected exactly one statement, found {}",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(sql: &str, with_fallback: bool) -> Result<String> {
        PhoenixRenderer.render(&parse_statement(sql).unwrap(), with_fallback)
    }

    #[test]
    fn test_select_renders_unchanged() {
        assert_eq!(render("SELECT a, b FROM t", false).unwrap(), "SELECT a, b FROM t");
    }

    #[test]
    fn test_insert_becomes_upsert() {
        let rendered = render("INSERT INTO t (a) VALUES (1)", false).unwrap();
        assert!(rendered.starts_with("UPSERT INTO t"));
        assert!(rendered.ends_with("VALUES (1)"));
    }

    #[test]
    fn test_update_requires_fallback() {
        match render("UPDATE t SET a = 1", false) {
            Err(HandlerError::Render(msg)) => assert!(msg.contains("UPDATE")),
            other => panic!("Expected Render error, got {:?}", other),
        }

        let fallback = render("UPDATE t SET a = 1", true).unwrap();
        assert!(fallback.starts_with("UPDATE t SET a = 1"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_sql("SELEC nothing"), Err(HandlerError::Parse(_))));
        assert!(parse_statement("SELECT 1; SELECT 2").is_err());
    }

    #[test]
    fn test_dialect_token() {
        assert_eq!(PhoenixRenderer.dialect(), "phoenix");
    }
}
