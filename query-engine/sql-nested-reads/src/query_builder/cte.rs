use query_metadata::{FieldSelection, ForeignKeyBinding, TableMetadata, resolve};
use tracing::warn;

use crate::alias::Alias;
use crate::error::SqlError;
use crate::query_builder::select::NestedReadBuilder;

/// Column carrying the parent identifier in a synthesized CTE.
pub const CTE_PARENT_IDENT: &str = "__parent_id__";

/// Column carrying the aggregated JSON array in a synthesized CTE.
pub const CTE_DATA_IDENT: &str = "__nested_data__";

/// One named common table expression aggregating a to-many relation for a
/// bounded parent page, plus the fragments the caller needs to splice it
/// into the outer query.
///
/// The empty-array guarantee cannot live in the CTE body (grouping only
/// produces rows for parents that have children), so `outer_expr` wraps the
/// aggregated column in a COALESCE for the caller's select list, and
/// `join_condition` is the ON clause for LEFT JOINing the CTE to the parent
/// page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCte {
    pub name: String,
    pub body: String,
    pub outer_expr: String,
    pub join_condition: String,
}

impl<'a> NestedReadBuilder<'a> {
    /// Builds the batch CTE for one top-level to-many relation, restricted
    /// to the parent rows of the limited-parent CTE `parent_cte`.
    ///
    /// Cheap scalar lookups never take this path: passing a many-to-one or
    /// one-to-one relation is a caller error, not a metadata degradation.
    pub async fn to_many_relation_cte(
        &self,
        parent_meta: &TableMetadata,
        relation_name: &str,
        requested_fields: &[String],
        parent_cte: &str,
    ) -> crate::Result<Option<NamedCte>> {
        let Some(descriptor) = parent_meta.relation(relation_name) else {
            warn!(
                table = %parent_meta.name,
                relation = %relation_name,
                "requested relation is not declared in the metadata, CTE dropped"
            );
            return Ok(None);
        };

        if descriptor.kind.is_to_one() {
            return Err(SqlError::UnsupportedRelationKind {
                kind: descriptor.kind,
                operation: "the batch CTE strategy",
            });
        }

        let Some(target_meta) = self.ctx.accessor.get(&descriptor.target_table_name).await else {
            warn!(
                table = %descriptor.target_table_name,
                relation = %relation_name,
                "no metadata for the relation target table, CTE dropped"
            );
            return Ok(None);
        };

        let resolved = match resolve(parent_meta, descriptor, &target_meta, self.ctx.conventions) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(
                    table = %parent_meta.name,
                    relation = %relation_name,
                    %error,
                    "relation could not be resolved, CTE dropped"
                );
                return Ok(None);
            }
        };

        let alias = Alias::table(1).to_string();
        let selection = FieldSelection::parse(requested_fields);
        let fields = self
            .object_fields(
                alias.clone(),
                &target_meta,
                selection,
                relation_name.to_owned(),
                2,
            )
            .await;

        if fields.is_empty() {
            return Ok(None);
        }

        let dialect = self.ctx.dialect;
        let json_obj = dialect.json_object_expr(&fields);

        let order_sql = self.ctx.ordering_for(relation_name).map(|ordering| {
            format!(
                "{alias}.{} {}",
                dialect.quote_identifier(&ordering.column),
                ordering.order.as_sql()
            )
        });
        let aggregate = dialect.json_array_agg_expr(&json_obj, order_sql.as_deref());

        let pk = dialect.quote_identifier(self.ctx.conventions.primary_key_column());
        let target = dialect.quote_identifier(&resolved.target_table);
        let parent_cte_ref = dialect.quote_identifier(parent_cte);
        let parent_ident = dialect.quote_identifier(CTE_PARENT_IDENT);
        let data_ident = dialect.quote_identifier(CTE_DATA_IDENT);

        let body = match &resolved.binding {
            // Group children by their foreign key, keeping only children of
            // the parent page.
            ForeignKeyBinding::Inverse(fk) => {
                let fk_col = format!("{alias}.{}", dialect.quote_identifier(fk));
                let join_left = dialect.cast_to_text_expr(&fk_col);
                let join_right =
                    dialect.cast_to_text_expr(&format!("{parent_cte_ref}.{pk}"));

                format!(
                    "SELECT {fk_col} AS {parent_ident}, {aggregate} AS {data_ident} \
                     FROM {target} AS {alias} \
                     INNER JOIN {parent_cte_ref} ON {join_left} = {join_right} \
                     GROUP BY {fk_col}"
                )
            }
            // Group junction rows by their source column.
            ForeignKeyBinding::Junction {
                table,
                source_column,
                target_column,
            } => {
                let junction = dialect.quote_identifier(table);
                let junction_alias = Alias::junction(1).to_string();
                let source_col =
                    format!("{junction_alias}.{}", dialect.quote_identifier(source_column));

                let join_left = dialect.cast_to_text_expr(&format!(
                    "{junction_alias}.{}",
                    dialect.quote_identifier(target_column)
                ));
                let join_right = dialect.cast_to_text_expr(&format!("{alias}.{pk}"));

                let page_left = dialect.cast_to_text_expr(&source_col);
                let page_right =
                    dialect.cast_to_text_expr(&format!("{parent_cte_ref}.{pk}"));

                format!(
                    "SELECT {source_col} AS {parent_ident}, {aggregate} AS {data_ident} \
                     FROM {target} AS {alias} \
                     INNER JOIN {junction} AS {junction_alias} ON {join_left} = {join_right} \
                     INNER JOIN {parent_cte_ref} ON {page_left} = {page_right} \
                     GROUP BY {source_col}"
                )
            }
            ForeignKeyBinding::Owning(_) => {
                unreachable!("to-one relations never use the batch CTE strategy")
            }
        };

        let name = format!("{relation_name}_agg");
        let name_ref = dialect.quote_identifier(&name);

        let outer_expr = format!(
            "COALESCE({name_ref}.{data_ident}, {})",
            dialect.empty_array_literal()
        );

        let join_condition = format!(
            "{} = {}",
            dialect.cast_to_text_expr(&format!("{name_ref}.{parent_ident}")),
            dialect.cast_to_text_expr(&format!("{parent_cte_ref}.{pk}"))
        );

        Ok(Some(NamedCte {
            name,
            body,
            outer_expr,
            join_condition,
        }))
    }
}
