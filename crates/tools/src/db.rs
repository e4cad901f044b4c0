//! `db_table_info` / `db_query` / `db_relations` tools. Read-only:
//! queries are rejected unless they start with `SELECT` and pass a
//! dangerous-keyword scan. Built over `sqlx::Any` so one tool works
//! against whatever backend `DATABASE_URL` names, rather than a single
//! vendor driver.

use serde::Deserialize;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Column, Row, TypeInfo};

use wk_domain::error::{Error, Result};

use crate::registry::Tool;

const MAX_ROWS: i64 = 200;
/// Result width cap: total characters across all cells in a single row.
const MAX_ROW_CHARS: usize = 2_000;

const DANGEROUS_KEYWORDS: &[&str] = &[
    "DELETE", "UPDATE", "INSERT", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "MERGE", "REPLACE",
];

/// Reject anything that isn't a bare SELECT, and anything that embeds a
/// DML/DDL keyword even inside an otherwise-SELECT statement (subqueries
/// smuggling a write).
fn guard_select_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    let upper = trimmed.to_ascii_uppercase();

    if !upper.starts_with("SELECT") {
        return Err(Error::Tool {
            tool: "db_query".into(),
            message: "only SELECT statements are allowed".into(),
        });
    }

    for kw in DANGEROUS_KEYWORDS {
        if contains_keyword(&upper, kw) {
            return Err(Error::Tool {
                tool: "db_query".into(),
                message: format!("query contains a disallowed keyword: {kw}"),
            });
        }
    }

    if trimmed.contains(';') && trimmed.trim_end_matches(';').contains(';') {
        return Err(Error::Tool {
            tool: "db_query".into(),
            message: "multiple statements are not allowed".into(),
        });
    }

    Ok(())
}

/// Word-boundary keyword match so e.g. `CREATED_AT` doesn't trip the
/// `CREATE` guard.
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(keyword));
    regex::Regex::new(&pattern)
        .expect("keyword pattern is always valid")
        .is_match(haystack)
}

async fn connect(database_url: &str) -> Result<sqlx::AnyPool> {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(4)
        .connect(database_url)
        .await
        .map_err(|e| Error::Tool { tool: "db".into(), message: format!("connect failed: {e}") })
}

fn row_to_json(row: &AnyRow) -> Value {
    let mut obj = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let name = col.name().to_string();
        let value = any_cell_to_json(row, i, col.type_info().name());
        obj.insert(name, value);
    }
    Value::Object(obj)
}

fn any_cell_to_json(row: &AnyRow, idx: usize, type_name: &str) -> Value {
    // sqlx::Any exposes a limited decode surface; fall back to string
    // representation for anything not cleanly numeric/boolean.
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::from(v);
    }
    if let Ok(None) = row.try_get::<Option<String>, _>(idx) {
        return Value::Null;
    }
    Value::String(format!("<unrepresentable {type_name}>"))
}

fn cap_row_width(row: &Value) -> Value {
    let mut s = row.to_string();
    if s.len() > MAX_ROW_CHARS {
        s.truncate(MAX_ROW_CHARS);
        return serde_json::json!({ "truncated_row": s });
    }
    row.clone()
}

pub struct DbTool {
    database_url: String,
}

impl DbTool {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self { database_url: database_url.into() }
    }

    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".into()))?;
        Ok(Self::new(database_url))
    }
}

#[derive(Debug, Deserialize)]
struct TableInfoArgs {
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    schema: Option<String>,
}

#[async_trait::async_trait]
impl Tool for DbTool {
    fn name(&self) -> &str {
        "db_table_info"
    }
    fn description(&self) -> &str {
        "List tables, or describe one table's columns, in the configured database."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table": {"type": "string"},
                "schema": {"type": "string"},
            },
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: TableInfoArgs = serde_json::from_value(arguments)?;
        let pool = connect(&self.database_url).await?;

        let sql = match &args.table {
            None => "SELECT table_name FROM information_schema.tables WHERE table_schema = COALESCE($1, current_schema())".to_string(),
            Some(_) => "SELECT column_name, data_type, is_nullable, column_default FROM information_schema.columns WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema()) ORDER BY ordinal_position".to_string(),
        };
        guard_select_only(&sql)?;

        let rows: Vec<AnyRow> = match &args.table {
            None => sqlx::query(&sql)
                .bind(args.schema.clone())
                .fetch_all(&pool)
                .await
                .map_err(|e| Error::Tool { tool: "db_table_info".into(), message: e.to_string() })?,
            Some(table) => sqlx::query(&sql)
                .bind(table)
                .bind(args.schema.clone())
                .fetch_all(&pool)
                .await
                .map_err(|e| Error::Tool { tool: "db_table_info".into(), message: e.to_string() })?,
        };

        let json_rows: Vec<Value> = rows.iter().map(|r| cap_row_width(&row_to_json(r))).collect();
        Ok(serde_json::json!({ "table": args.table, "rows": json_rows }))
    }
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    sql: String,
    #[serde(default)]
    limit: Option<i64>,
}

pub struct DbQueryTool {
    database_url: String,
}

impl DbQueryTool {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self { database_url: database_url.into() }
    }
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".into()))?;
        Ok(Self::new(database_url))
    }
}

#[async_trait::async_trait]
impl Tool for DbQueryTool {
    fn name(&self) -> &str {
        "db_query"
    }
    fn description(&self) -> &str {
        "Run a read-only SELECT query against the configured database."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string", "description": "a SELECT statement"},
                "limit": {"type": "integer", "description": "max rows to return, capped at 200"},
            },
            "required": ["sql"],
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: QueryArgs = serde_json::from_value(arguments)?;
        guard_select_only(&args.sql)?;

        let limit = args.limit.unwrap_or(MAX_ROWS).min(MAX_ROWS).max(1);
        let pool = connect(&self.database_url).await?;

        let rows: Vec<AnyRow> = sqlx::query(&args.sql)
            .fetch_all(&pool)
            .await
            .map_err(|e| Error::Tool { tool: "db_query".into(), message: e.to_string() })?;

        let truncated = rows.len() as i64 > limit;
        let json_rows: Vec<Value> = rows
            .iter()
            .take(limit as usize)
            .map(|r| cap_row_width(&row_to_json(r)))
            .collect();

        Ok(serde_json::json!({
            "rows": json_rows,
            "row_count": json_rows.len(),
            "truncated": truncated,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct RelationsArgs {
    table: String,
    #[serde(default)]
    schema: Option<String>,
}

pub struct DbRelationsTool {
    database_url: String,
}

impl DbRelationsTool {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self { database_url: database_url.into() }
    }
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".into()))?;
        Ok(Self::new(database_url))
    }
}

#[async_trait::async_trait]
impl Tool for DbRelationsTool {
    fn name(&self) -> &str {
        "db_relations"
    }
    fn description(&self) -> &str {
        "List a table's foreign-key relationships."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table": {"type": "string"},
                "schema": {"type": "string"},
            },
            "required": ["table"],
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: RelationsArgs = serde_json::from_value(arguments)?;
        let sql = "SELECT \
                tc.constraint_name, kcu.column_name, ccu.table_name AS ref_table, ccu.column_name AS ref_column \
            FROM information_schema.table_constraints tc \
            JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
            JOIN information_schema.constraint_column_usage ccu ON tc.constraint_name = ccu.constraint_name \
            WHERE tc.constraint_type = 'FOREIGN KEY' AND kcu.table_name = $1 AND tc.table_schema = COALESCE($2, current_schema())";
        guard_select_only(sql)?;

        let pool = connect(&self.database_url).await?;
        let rows: Vec<AnyRow> = sqlx::query(sql)
            .bind(&args.table)
            .bind(args.schema.clone())
            .fetch_all(&pool)
            .await
            .map_err(|e| Error::Tool { tool: "db_relations".into(), message: e.to_string() })?;

        let json_rows: Vec<Value> = rows.iter().map(|r| cap_row_width(&row_to_json(r))).collect();
        Ok(serde_json::json!({ "table": args.table, "relations": json_rows }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_select() {
        assert!(guard_select_only("DELETE FROM users").is_err());
        assert!(guard_select_only("  delete from users").is_err());
    }

    #[test]
    fn rejects_embedded_dangerous_keyword_in_select() {
        assert!(guard_select_only("SELECT * FROM (DROP TABLE users) x").is_err());
    }

    #[test]
    fn accepts_plain_select() {
        assert!(guard_select_only("SELECT * FROM users WHERE id = 1").is_ok());
    }

    #[test]
    fn rejects_non_select_prefix_even_when_it_resolves_to_a_select() {
        assert!(guard_select_only("WITH recent AS (SELECT * FROM orders) SELECT * FROM recent").is_err());
    }

    #[test]
    fn does_not_false_positive_on_substrings() {
        // "CREATED_AT" contains "CREATE" as a substring but not as a word.
        assert!(guard_select_only("SELECT created_at FROM users").is_ok());
    }

    #[test]
    fn rejects_stacked_statements() {
        assert!(guard_select_only("SELECT 1; DROP TABLE users;").is_err());
    }
}
