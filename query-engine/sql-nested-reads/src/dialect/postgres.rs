use itertools::Itertools;

use super::{Flavour, SqlDialect, quote_string_literal};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn flavour(&self) -> Flavour {
        Flavour::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn json_object_expr(&self, pairs: &[(String, String)]) -> String {
        let args = pairs
            .iter()
            .map(|(key, value)| format!("{}, {}", quote_string_literal(key), value))
            .join(", ");

        format!("JSON_BUILD_OBJECT({args})")
    }

    fn json_array_agg_expr(&self, expr: &str, order_by: Option<&str>) -> String {
        match order_by {
            Some(order_by) => format!("JSON_AGG({expr} ORDER BY {order_by})"),
            None => format!("JSON_AGG({expr})"),
        }
    }

    fn empty_array_literal(&self) -> String {
        "'[]'::JSON".to_owned()
    }

    fn cast_to_text_expr(&self, expr: &str) -> String {
        format!("CAST({expr} AS TEXT)")
    }
}
