//! SQL safety classification and execution policy.
//!
//! Statements generated by the LLM are parsed before execution and
//! classified by the kind of change they make. The default policy only
//! lets read-only statements through.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::error::{GatewayError, Result};

/// How dangerous a SQL statement is to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyLevel {
    /// Read-only statements (SELECT, EXPLAIN, SHOW).
    Safe,
    /// Statements that modify data (INSERT, UPDATE) or create objects.
    Mutating,
    /// Statements that delete data or drop objects.
    Destructive,
}

impl SafetyLevel {
    /// Returns a human-readable description of the level.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Safe => "read-only",
            Self::Mutating => "modifies data",
            Self::Destructive => "deletes data or drops objects",
        }
    }
}

/// Which safety levels the gateway will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    /// Only read-only statements are executed.
    #[default]
    ReadOnly,
    /// All statements are executed, including destructive ones.
    ReadWrite,
}

impl ExecutionPolicy {
    /// Returns true if statements at this safety level may run.
    pub fn allows(&self, level: SafetyLevel) -> bool {
        match self {
            Self::ReadOnly => level == SafetyLevel::Safe,
            Self::ReadWrite => true,
        }
    }

    /// Classifies the statement and rejects it if the policy forbids it.
    pub fn check(&self, sql: &str) -> Result<SafetyLevel> {
        let level = classify_sql(sql);
        debug!(level = ?level, "classified SQL statement");

        if self.allows(level) {
            Ok(level)
        } else {
            Err(GatewayError::execution(format!(
                "Statement rejected by read-only policy ({}): {}",
                level.description(),
                sql
            )))
        }
    }
}

/// Classifies a SQL statement by parsing it.
///
/// Multi-statement input is classified by its most dangerous statement.
/// Statements the parser cannot handle fall back to a keyword check, and
/// anything unrecognized is treated as destructive.
pub fn classify_sql(sql: &str) -> SafetyLevel {
    let dialect = PostgreSqlDialect {};

    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements
            .iter()
            .map(classify_statement)
            .max_by_key(|level| match level {
                SafetyLevel::Safe => 0,
                SafetyLevel::Mutating => 1,
                SafetyLevel::Destructive => 2,
            })
            .unwrap_or(SafetyLevel::Destructive),
        Err(e) => {
            debug!("SQL parse failed, using keyword fallback: {}", e);
            classify_by_keyword(sql)
        }
    }
}

fn classify_statement(statement: &Statement) -> SafetyLevel {
    match statement {
        Statement::Query(_) | Statement::ExplainTable { .. } | Statement::Explain { .. } => {
            SafetyLevel::Safe
        }
        Statement::ShowColumns { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowVariable { .. } => SafetyLevel::Safe,
        Statement::Insert(_) | Statement::Update { .. } | Statement::Merge { .. } => {
            SafetyLevel::Mutating
        }
        Statement::CreateTable(_)
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_) => SafetyLevel::Mutating,
        Statement::Delete(_)
        | Statement::Drop { .. }
        | Statement::Truncate { .. }
        | Statement::AlterTable { .. } => SafetyLevel::Destructive,
        _ => SafetyLevel::Destructive,
    }
}

/// Keyword-based fallback for statements sqlparser rejects.
fn classify_by_keyword(sql: &str) -> SafetyLevel {
    let first_word = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase();

    match first_word.as_str() {
        "SELECT" | "EXPLAIN" | "SHOW" | "WITH" => SafetyLevel::Safe,
        "INSERT" | "UPDATE" | "CREATE" | "MERGE" => SafetyLevel::Mutating,
        _ => SafetyLevel::Destructive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_safe() {
        assert_eq!(classify_sql("SELECT * FROM users"), SafetyLevel::Safe);
        assert_eq!(
            classify_sql(
                "SELECT c.name, COUNT(*) FROM categories c \
                 JOIN products p ON p.category_id = c.id GROUP BY c.name"
            ),
            SafetyLevel::Safe
        );
    }

    #[test]
    fn test_cte_is_safe() {
        assert_eq!(
            classify_sql("WITH t AS (SELECT 1 AS n) SELECT n FROM t"),
            SafetyLevel::Safe
        );
    }

    #[test]
    fn test_insert_update_are_mutating() {
        assert_eq!(
            classify_sql("INSERT INTO users (name) VALUES ('x')"),
            SafetyLevel::Mutating
        );
        assert_eq!(
            classify_sql("UPDATE users SET name = 'x' WHERE user_id = '1'"),
            SafetyLevel::Mutating
        );
    }

    #[test]
    fn test_delete_drop_truncate_are_destructive() {
        assert_eq!(
            classify_sql("DELETE FROM users WHERE user_id = '1'"),
            SafetyLevel::Destructive
        );
        assert_eq!(classify_sql("DROP TABLE users"), SafetyLevel::Destructive);
        assert_eq!(
            classify_sql("TRUNCATE TABLE users"),
            SafetyLevel::Destructive
        );
    }

    #[test]
    fn test_multi_statement_takes_most_dangerous() {
        assert_eq!(
            classify_sql("SELECT 1; DROP TABLE users"),
            SafetyLevel::Destructive
        );
    }

    #[test]
    fn test_unparseable_input_is_not_safe() {
        assert_eq!(
            classify_sql("GRANT ALL ON weird SYNTAX !!"),
            SafetyLevel::Destructive
        );
    }

    #[test]
    fn test_read_only_policy_rejects_writes() {
        let policy = ExecutionPolicy::ReadOnly;
        assert!(policy.check("SELECT * FROM users").is_ok());
        assert!(policy.check("DELETE FROM users").is_err());
        assert!(policy.check("INSERT INTO users (name) VALUES ('x')").is_err());
    }

    #[test]
    fn test_read_write_policy_allows_everything() {
        let policy = ExecutionPolicy::ReadWrite;
        assert!(policy.check("SELECT * FROM users").is_ok());
        assert!(policy.check("DELETE FROM users").is_ok());
        assert!(policy.check("DROP TABLE users").is_ok());
    }

    #[test]
    fn test_default_policy_is_read_only() {
        assert_eq!(ExecutionPolicy::default(), ExecutionPolicy::ReadOnly);
    }
}
