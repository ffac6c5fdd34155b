use itertools::Itertools;

use super::{Flavour, SqlDialect, quote_string_literal};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl SqlDialect for MysqlDialect {
    fn flavour(&self) -> Flavour {
        Flavour::Mysql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn json_object_expr(&self, pairs: &[(String, String)]) -> String {
        let args = pairs
            .iter()
            .map(|(key, value)| format!("{}, {}", quote_string_literal(key), value))
            .join(", ");

        format!("JSON_OBJECT({args})")
    }

    /// JSON_ARRAYAGG carries no ORDER BY clause. Ordered aggregation is
    /// achieved by ordering the correlated subquery itself together with a
    /// LIMIT, which MySQL honors for the aggregation order.
    fn json_array_agg_expr(&self, expr: &str, _order_by: Option<&str>) -> String {
        format!("JSON_ARRAYAGG({expr})")
    }

    fn empty_array_literal(&self) -> String {
        "JSON_ARRAY()".to_owned()
    }

    fn cast_to_text_expr(&self, expr: &str) -> String {
        format!("CAST({expr} AS CHAR)")
    }
}
