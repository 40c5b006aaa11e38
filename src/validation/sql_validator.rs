use sqlparser::ast::{Expr, LimitClause, Query, SetExpr, Statement, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::api::middleware::AppError;

/// Gate between model-generated SQL and the crawler databases
pub struct SqlValidator;

impl SqlValidator {
    fn parse(sql: &str) -> Result<Vec<Statement>, AppError> {
        let dialect = PostgreSqlDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        let ast = parser
            .parse_statements()
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        if ast.is_empty() {
            return Err(AppError::InvalidSql("Empty SQL query".to_string()));
        }
        Ok(ast)
    }

    /// Leading keyword of a statement, for error messages
    fn statement_keyword(stmt: &Statement) -> String {
        stmt.to_string()
            .split_whitespace()
            .next()
            .unwrap_or("UNKNOWN")
            .to_uppercase()
    }

    /// Accept exactly one read-only query.
    ///
    /// `SELECT ... INTO` and row-locking clauses are refused as well since
    /// both write on PostgreSQL.
    pub fn validate_select_only(sql: &str) -> Result<String, AppError> {
        let ast = Self::parse(sql)?;

        if ast.len() > 1 {
            return Err(AppError::InvalidSql(format!(
                "Expected a single statement, found {}",
                ast.len()
            )));
        }

        match &ast[0] {
            Statement::Query(query) => {
                if !query.locks.is_empty() {
                    return Err(AppError::InvalidSql(
                        "Row-locking clauses (FOR UPDATE/SHARE) are not allowed".to_string(),
                    ));
                }
                if let SetExpr::Select(select) = query.body.as_ref() {
                    if select.into.is_some() {
                        return Err(AppError::InvalidSql(
                            "SELECT ... INTO is not allowed".to_string(),
                        ));
                    }
                }
            }
            other => {
                return Err(AppError::InvalidSql(format!(
                    "{} statements are not allowed. Only SELECT queries are permitted.",
                    Self::statement_keyword(other)
                )));
            }
        }

        Ok(sql.trim().to_string())
    }

    /// Add a LIMIT to a query that bounds neither with LIMIT nor FETCH.
    ///
    /// The limit is set on the parsed query and the statement re-rendered, so
    /// comments in the input are dropped rather than swallowing the clause.
    pub fn ensure_limit(sql: &str, default_limit: u64) -> Result<String, AppError> {
        let mut ast = Self::parse(sql)?;

        if let Statement::Query(query) = &mut ast[0] {
            if !Self::query_is_bounded(query) {
                query.limit_clause = Some(LimitClause::LimitOffset {
                    limit: Some(Expr::value(Value::Number(default_limit.to_string(), false))),
                    offset: None,
                    limit_by: vec![],
                });
                return Ok(ast[0].to_string());
            }
        }
        Ok(sql.to_string())
    }

    fn query_is_bounded(query: &Query) -> bool {
        query.limit_clause.is_some() || query.fetch.is_some()
    }

    fn check_limit_in_statement(stmt: &Statement) -> bool {
        match stmt {
            Statement::Query(query) => Self::query_is_bounded(query),
            _ => false,
        }
    }

    /// Validate SELECT-only and ensure LIMIT; returns the SQL to run and
    /// whether a limit was appended
    pub fn validate_and_prepare(sql: &str, default_limit: u64) -> Result<(String, bool), AppError> {
        let validated_sql = Self::validate_select_only(sql)?;
        let original_has_limit = Self::has_limit(&validated_sql);
        let final_sql = Self::ensure_limit(&validated_sql, default_limit)?;

        Ok((final_sql, !original_has_limit))
    }

    fn has_limit(sql: &str) -> bool {
        match Self::parse(sql) {
            Ok(ast) => Self::check_limit_in_statement(&ast[0]),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_select_only() {
        assert!(SqlValidator::validate_select_only("SELECT COUNT(*) FROM posts").is_ok());
        assert!(SqlValidator::validate_select_only(
            "WITH b AS (SELECT board_name FROM posts) SELECT COUNT(*) FROM b"
        )
        .is_ok());

        assert!(SqlValidator::validate_select_only("INSERT INTO boards VALUES ('g')").is_err());
        assert!(SqlValidator::validate_select_only("UPDATE posts SET replies = 0").is_err());
        assert!(SqlValidator::validate_select_only("DELETE FROM comments").is_err());
        assert!(SqlValidator::validate_select_only("DROP TABLE toxicity").is_err());
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let err = SqlValidator::validate_select_only("SELECT 1; DROP TABLE posts").unwrap_err();
        assert!(err.to_string().contains("single statement"));
    }

    #[test]
    fn test_rejects_writing_selects() {
        assert!(SqlValidator::validate_select_only("SELECT * INTO backup FROM posts").is_err());
        assert!(SqlValidator::validate_select_only("SELECT * FROM posts FOR UPDATE").is_err());
    }

    #[test]
    fn test_error_names_statement() {
        let err = SqlValidator::validate_select_only("delete from comments").unwrap_err();
        assert!(err.to_string().contains("DELETE statements are not allowed"));
    }

    #[test]
    fn test_unparseable_sql() {
        let err = SqlValidator::validate_select_only("Sorry, I cannot help with that").unwrap_err();
        assert!(matches!(err, AppError::InvalidSql(_)));
        assert!(SqlValidator::validate_select_only("   ").is_err());
    }

    #[test]
    fn test_ensure_limit() {
        let result = SqlValidator::ensure_limit("SELECT * FROM boards;", 1000).unwrap();
        assert_eq!(result, "SELECT * FROM boards LIMIT 1000");

        let sql = "SELECT * FROM boards LIMIT 100";
        assert_eq!(SqlValidator::ensure_limit(sql, 1000).unwrap(), sql);
    }

    #[test]
    fn test_limit_detection_with_ast() {
        // Identifiers and comments mentioning "limit" are not LIMIT clauses
        let (result, applied) = SqlValidator::validate_and_prepare("SELECT bumplimit FROM posts", 500).unwrap();
        assert!(result.ends_with("LIMIT 500"));
        assert!(applied);

        let (result, applied) = SqlValidator::validate_and_prepare("SELECT * FROM posts /* LIMIT */", 500).unwrap();
        assert!(result.ends_with("LIMIT 500"));
        assert!(applied);

        let (result, applied) =
            SqlValidator::validate_and_prepare("SELECT * FROM posts LIMIT 10 OFFSET 5", 500).unwrap();
        assert!(result.contains("LIMIT 10"));
        assert!(!applied);
    }

    #[test]
    fn test_limit_survives_trailing_comment() {
        let (result, applied) =
            SqlValidator::validate_and_prepare("SELECT * FROM posts -- every post", 1000).unwrap();
        assert!(applied);
        assert!(!result.contains("--"));
        assert!(result.ends_with("LIMIT 1000"));
    }

    #[test]
    fn test_fetch_first_counts_as_limit() {
        let sql = "SELECT * FROM posts ORDER BY post_no FETCH FIRST 5 ROWS ONLY";
        let (result, applied) = SqlValidator::validate_and_prepare(sql, 1000).unwrap();
        assert!(!applied);
        assert!(!result.contains("LIMIT"));
        assert_eq!(result, sql);
    }

    #[test]
    fn test_limit_follows_order_by() {
        let result =
            SqlValidator::ensure_limit("SELECT board_name FROM boards ORDER BY board_name", 50).unwrap();
        assert_eq!(result, "SELECT board_name FROM boards ORDER BY board_name LIMIT 50");
    }
}
