use futures::FutureExt;
use futures::future::BoxFuture;
use query_metadata::{
    FieldSelection, ForeignKeyBinding, RelationKind, ResolvedRelation, TableMetadata, resolve,
};
use tracing::warn;

use crate::alias::Alias;
use crate::context::Context;
use crate::dialect::Flavour;

/// MySQL honors the subquery's ORDER BY for JSON_ARRAYAGG only when the
/// subquery also carries a LIMIT.
const MYSQL_ORDERED_AGG_LIMIT: &str = "9223372036854775807";

/// Synthesizes nested-read SQL fragments from runtime metadata.
///
/// Every public method is a pure function of the metadata snapshot and the
/// requested field selection: identical inputs yield byte-identical SQL.
/// Per-relation failures (unknown relation, missing target metadata,
/// unresolvable foreign key) are logged and degrade to a dropped field.
pub struct NestedReadBuilder<'a> {
    pub(crate) ctx: &'a Context<'a>,
}

impl<'a> NestedReadBuilder<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        Self { ctx }
    }

    /// Builds one correlated subquery for `relation_name` on the root table,
    /// returning a fragment that evaluates to a JSON object (to-one) or a
    /// JSON array (to-many) per parent row.
    ///
    /// Returns `None` when the relation cannot be resolved or no requested
    /// field survives; the caller simply omits the field.
    pub async fn relation_subquery(
        &self,
        parent_table: &str,
        parent_meta: &TableMetadata,
        relation_name: &str,
        requested_fields: &[String],
    ) -> Option<String> {
        let parent_ref = self.ctx.dialect.quote_identifier(parent_table);

        self.relation_subquery_inner(
            &parent_ref,
            parent_meta,
            relation_name,
            requested_fields,
            relation_name,
            1,
        )
        .await
    }

    /// Like [`Self::relation_subquery`], but correlated to an explicit alias
    /// instead of the parent table name. Used below the first nesting level
    /// of the batch CTE strategy, where the parent row is a CTE row.
    pub async fn relation_subquery_with_alias(
        &self,
        parent_alias: &str,
        nesting_level: usize,
        parent_meta: &TableMetadata,
        relation_name: &str,
        requested_fields: &[String],
    ) -> Option<String> {
        self.relation_subquery_inner(
            parent_alias,
            parent_meta,
            relation_name,
            requested_fields,
            relation_name,
            nesting_level,
        )
        .await
    }

    /// The ordered `(field name, SQL expression)` pairs for a root-level
    /// selection: scalar columns as qualified references, relations as
    /// correlated subqueries. The caller splices them into its SELECT list.
    pub async fn root_fields(
        &self,
        root_table: &str,
        root_meta: &TableMetadata,
        requested_fields: &[String],
    ) -> Vec<(String, String)> {
        let container = self.ctx.dialect.quote_identifier(root_table);
        let selection = FieldSelection::parse(requested_fields);

        self.object_fields(container, root_meta, selection, String::new(), 1)
            .await
    }

    async fn relation_subquery_inner(
        &self,
        parent_ref: &str,
        parent_meta: &TableMetadata,
        relation_name: &str,
        requested_fields: &[String],
        path: &str,
        depth: usize,
    ) -> Option<String> {
        let Some(descriptor) = parent_meta.relation(relation_name) else {
            warn!(
                table = %parent_meta.name,
                relation = %relation_name,
                "requested relation is not declared in the metadata, field dropped"
            );
            return None;
        };

        let Some(target_meta) = self.ctx.accessor.get(&descriptor.target_table_name).await else {
            warn!(
                table = %descriptor.target_table_name,
                relation = %relation_name,
                "no metadata for the relation target table, field dropped"
            );
            return None;
        };

        let resolved = match resolve(parent_meta, descriptor, &target_meta, self.ctx.conventions) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(
                    table = %parent_meta.name,
                    relation = %relation_name,
                    %error,
                    "relation could not be resolved, field dropped"
                );
                return None;
            }
        };

        let alias = Alias::table(depth);
        let selection = FieldSelection::parse(requested_fields);
        let fields = self
            .object_fields(
                alias.to_string(),
                &target_meta,
                selection,
                path.to_owned(),
                depth + 1,
            )
            .await;

        if fields.is_empty() {
            return None;
        }

        let json_obj = self.ctx.dialect.json_object_expr(&fields);

        Some(self.wrap_by_cardinality(&resolved, &json_obj, parent_ref, alias, path))
    }

    /// The `(field name, SQL expression)` pairs selected from one table
    /// instance, in deterministic order: scalar columns first (request
    /// order, declaration order under a wildcard), then explicitly
    /// requested relations in request order, then the implicit
    /// identifier-only relations a wildcard adds in declaration order.
    pub(crate) fn object_fields<'f>(
        &'f self,
        container_ref: String,
        meta: &'f TableMetadata,
        selection: FieldSelection,
        path: String,
        child_depth: usize,
    ) -> BoxFuture<'f, Vec<(String, String)>> {
        async move {
            let dialect = self.ctx.dialect;
            let conventions = self.ctx.conventions;
            let wildcard = selection.has_wildcard();
            let mut fields: Vec<(String, String)> = Vec::new();

            // Foreign key columns re-exposed as nested objects instead of raw
            // scalars: all owning columns under a wildcard, otherwise those of
            // the relations the selection nests explicitly.
            let hidden_fks: Vec<String> = if wildcard {
                meta.owning_foreign_key_columns(conventions)
            } else {
                selection
                    .sub_relations()
                    .filter_map(|(name, _)| meta.relation(name))
                    .filter(|r| r.is_owning())
                    .map(|r| {
                        r.foreign_key_column
                            .clone()
                            .unwrap_or_else(|| conventions.foreign_key_for_table(&r.target_table_name))
                    })
                    .collect()
            };

            if wildcard {
                for column in meta.columns() {
                    if hidden_fks.contains(&column.name) {
                        continue;
                    }

                    fields.push((
                        column.name.clone(),
                        format!("{container_ref}.{}", dialect.quote_identifier(&column.name)),
                    ));
                }
            } else {
                for field in selection.named_root_fields() {
                    if meta.column(field).is_none() {
                        warn!(
                            table = %meta.name,
                            column = %field,
                            "selected column is not declared in the metadata, field dropped"
                        );
                        continue;
                    }

                    if hidden_fks.iter().any(|fk| fk == field) {
                        continue;
                    }

                    if fields.iter().any(|(name, _)| name == field) {
                        continue;
                    }

                    fields.push((
                        field.to_owned(),
                        format!("{container_ref}.{}", dialect.quote_identifier(field)),
                    ));
                }
            }

            for (name, sub_paths) in selection.sub_relations() {
                let child_path = join_path(&path, name);

                if let Some(sql) = self
                    .relation_subquery_inner(
                        &container_ref,
                        meta,
                        name,
                        sub_paths,
                        &child_path,
                        child_depth,
                    )
                    .await
                {
                    fields.push((name.to_owned(), sql));
                }
            }

            if wildcard {
                let pk_selection = vec![conventions.primary_key_column().to_owned()];

                for relation in meta.relations() {
                    if selection.sub_relation(&relation.property_name).is_some() {
                        continue;
                    }

                    let child_path = join_path(&path, &relation.property_name);

                    if let Some(sql) = self
                        .relation_subquery_inner(
                            &container_ref,
                            meta,
                            &relation.property_name,
                            &pk_selection,
                            &child_path,
                            child_depth,
                        )
                        .await
                    {
                        fields.push((relation.property_name.clone(), sql));
                    }
                }
            }

            fields
        }
        .boxed()
    }

    fn wrap_by_cardinality(
        &self,
        resolved: &ResolvedRelation,
        json_obj: &str,
        parent_ref: &str,
        alias: Alias,
        path: &str,
    ) -> String {
        let dialect = self.ctx.dialect;
        let pk = dialect.quote_identifier(self.ctx.conventions.primary_key_column());
        let target = dialect.quote_identifier(&resolved.target_table);
        let depth = alias.depth();
        let alias = alias.to_string();

        match &resolved.binding {
            // SELECT <obj> FROM target WHERE target.id = parent.<fk> LIMIT 1
            ForeignKeyBinding::Owning(fk) => {
                let child = dialect.cast_to_text_expr(&format!("{alias}.{pk}"));
                let parent = dialect
                    .cast_to_text_expr(&format!("{parent_ref}.{}", dialect.quote_identifier(fk)));

                format!("(SELECT {json_obj} FROM {target} AS {alias} WHERE {child} = {parent} LIMIT 1)")
            }
            // SELECT <obj> FROM target WHERE target.<fk> = parent.id LIMIT 1
            ForeignKeyBinding::Inverse(fk) if resolved.kind == RelationKind::OneToOne => {
                let child = dialect
                    .cast_to_text_expr(&format!("{alias}.{}", dialect.quote_identifier(fk)));
                let parent = dialect.cast_to_text_expr(&format!("{parent_ref}.{pk}"));

                format!("(SELECT {json_obj} FROM {target} AS {alias} WHERE {child} = {parent} LIMIT 1)")
            }
            // SELECT COALESCE(<agg>, <empty>) FROM target WHERE target.<fk> = parent.id
            ForeignKeyBinding::Inverse(fk) => {
                let child = dialect
                    .cast_to_text_expr(&format!("{alias}.{}", dialect.quote_identifier(fk)));
                let parent = dialect.cast_to_text_expr(&format!("{parent_ref}.{pk}"));
                let condition = format!("{child} = {parent}");

                self.aggregate_subquery(json_obj, &target, &alias, None, &condition, path)
            }
            // SELECT COALESCE(<agg>, <empty>) FROM target
            //   JOIN junction ON junction.<target col> = target.id
            //   WHERE junction.<source col> = parent.id
            ForeignKeyBinding::Junction {
                table,
                source_column,
                target_column,
            } => {
                let junction = dialect.quote_identifier(table);
                let junction_alias = Alias::junction(depth).to_string();
                let join_left = dialect.cast_to_text_expr(&format!(
                    "{junction_alias}.{}",
                    dialect.quote_identifier(target_column)
                ));
                let join_right = dialect.cast_to_text_expr(&format!("{alias}.{pk}"));
                let join =
                    format!("INNER JOIN {junction} AS {junction_alias} ON {join_left} = {join_right}");

                let where_left = dialect.cast_to_text_expr(&format!(
                    "{junction_alias}.{}",
                    dialect.quote_identifier(source_column)
                ));
                let where_right = dialect.cast_to_text_expr(&format!("{parent_ref}.{pk}"));
                let condition = format!("{where_left} = {where_right}");

                self.aggregate_subquery(json_obj, &target, &alias, Some(&join), &condition, path)
            }
        }
    }

    fn aggregate_subquery(
        &self,
        json_obj: &str,
        target: &str,
        alias: &str,
        join: Option<&str>,
        condition: &str,
        path: &str,
    ) -> String {
        let dialect = self.ctx.dialect;

        let order_sql = self.ctx.ordering_for(path).map(|ordering| {
            format!(
                "{alias}.{} {}",
                dialect.quote_identifier(&ordering.column),
                ordering.order.as_sql()
            )
        });

        let aggregate = dialect.json_array_agg_expr(json_obj, order_sql.as_deref());
        let aggregate = format!("COALESCE({aggregate}, {})", dialect.empty_array_literal());

        let join_clause = join.map(|j| format!(" {j}")).unwrap_or_default();

        let tail = match (dialect.flavour(), &order_sql) {
            (Flavour::Mysql, Some(order)) => {
                format!(" ORDER BY {order} LIMIT {MYSQL_ORDERED_AGG_LIMIT}")
            }
            _ => String::new(),
        };

        format!("(SELECT {aggregate} FROM {target} AS {alias}{join_clause} WHERE {condition}{tail})")
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        format!("{prefix}.{segment}")
    }
}
