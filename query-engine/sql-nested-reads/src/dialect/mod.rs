mod mysql;
mod postgres;

use std::fmt;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavour {
    Mysql,
    Postgres,
}

/// Maps the abstract SQL fragments the synthesizers emit to the syntax of
/// one SQL dialect. Implementations are pure functions over strings; all of
/// them are total, so there is no fallible path and no capability check.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    fn flavour(&self) -> Flavour;

    fn quote_identifier(&self, name: &str) -> String;

    /// A JSON object constructor from (key, value expression) pairs. Keys
    /// are emitted as string literals in pair order.
    fn json_object_expr(&self, pairs: &[(String, String)]) -> String;

    /// A JSON array aggregate over `expr`. Dialects whose aggregate function
    /// accepts an ORDER BY clause fold `order_by` into the call; the others
    /// ignore it and rely on the caller ordering the surrounding subquery.
    fn json_array_agg_expr(&self, expr: &str, order_by: Option<&str>) -> String;

    fn empty_array_literal(&self) -> String;

    fn cast_to_text_expr(&self, expr: &str) -> String;
}

/// A single-quoted SQL string literal with embedded quotes doubled.
pub(crate) fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
