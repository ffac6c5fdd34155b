use crate::conventions::NamingConvention;
use crate::error::MetadataError;
use crate::relation::{RelationDescriptor, RelationKind};
use crate::table::TableMetadata;

/// How a resolved relation is joined to its source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKeyBinding {
    /// The foreign key column lives on the source table and references the
    /// target's primary key. Many-to-one and owning one-to-one.
    Owning(String),

    /// The foreign key column lives on the target table and references the
    /// source's primary key. One-to-many and inverse one-to-one.
    Inverse(String),

    /// An intermediate table carries one column per side. Many-to-many.
    Junction {
        table: String,
        source_column: String,
        target_column: String,
    },
}

/// A relation with every join ingredient resolved: cardinality, target
/// table, and the concrete foreign key binding, explicit or derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelation {
    pub property_name: String,
    pub kind: RelationKind,
    pub target_table: String,
    pub binding: ForeignKeyBinding,
}

/// Resolves the join ingredients of `relation`, declared on `source` and
/// pointing at `target`.
///
/// Derivation fallbacks, first match wins:
/// - owning side: explicit column, else derived from the target table name;
/// - inverse side: explicit column, else derived from the inverse property
///   name, else the explicit-or-derived column of a reciprocal many-to-one
///   found on the target table;
/// - many-to-many: explicit junction members, else derived from the two
///   table names.
///
/// Failure is reported as a [`MetadataError`]; callers treat it as a warning
/// and drop the relation rather than failing the query.
pub fn resolve(
    source: &TableMetadata,
    relation: &RelationDescriptor,
    target: &TableMetadata,
    conventions: &dyn NamingConvention,
) -> Result<ResolvedRelation, MetadataError> {
    let binding = match relation.kind {
        RelationKind::ManyToOne => owning_binding(relation, conventions),
        RelationKind::OneToOne if !relation.is_inverse => owning_binding(relation, conventions),
        RelationKind::OneToOne | RelationKind::OneToMany => {
            inverse_binding(source, relation, target, conventions)?
        }
        RelationKind::ManyToMany => junction_binding(source, relation, conventions),
    };

    Ok(ResolvedRelation {
        property_name: relation.property_name.clone(),
        kind: relation.kind,
        target_table: relation.target_table_name.clone(),
        binding,
    })
}

/// Looks up `property_name` on `source` and resolves it. The target table
/// metadata must already be fetched by the caller.
pub fn resolve_property(
    source: &TableMetadata,
    property_name: &str,
    target: &TableMetadata,
    conventions: &dyn NamingConvention,
) -> Result<ResolvedRelation, MetadataError> {
    let relation = source
        .relation(property_name)
        .ok_or_else(|| MetadataError::relation_not_found(&source.name, property_name))?;

    resolve(source, relation, target, conventions)
}

fn owning_binding(
    relation: &RelationDescriptor,
    conventions: &dyn NamingConvention,
) -> ForeignKeyBinding {
    let column = relation
        .foreign_key_column
        .clone()
        .unwrap_or_else(|| conventions.foreign_key_for_table(&relation.target_table_name));

    ForeignKeyBinding::Owning(column)
}

fn inverse_binding(
    source: &TableMetadata,
    relation: &RelationDescriptor,
    target: &TableMetadata,
    conventions: &dyn NamingConvention,
) -> Result<ForeignKeyBinding, MetadataError> {
    if let Some(column) = &relation.foreign_key_column {
        return Ok(ForeignKeyBinding::Inverse(column.clone()));
    }

    if let Some(inverse_property) = &relation.inverse_property_name {
        return Ok(ForeignKeyBinding::Inverse(
            conventions.foreign_key_for_property(inverse_property),
        ));
    }

    // Last resort: a reciprocal many-to-one on the target pointing back here.
    let reciprocal = target
        .relations()
        .find(|r| r.kind == RelationKind::ManyToOne && r.target_table_name == source.name);

    match reciprocal {
        Some(r) => {
            let column = r
                .foreign_key_column
                .clone()
                .unwrap_or_else(|| conventions.foreign_key_for_table(&source.name));

            Ok(ForeignKeyBinding::Inverse(column))
        }
        None => Err(MetadataError::unresolved_foreign_key(
            &source.name,
            &relation.property_name,
        )),
    }
}

fn junction_binding(
    source: &TableMetadata,
    relation: &RelationDescriptor,
    conventions: &dyn NamingConvention,
) -> ForeignKeyBinding {
    let table = relation
        .junction_table_name
        .clone()
        .unwrap_or_else(|| conventions.junction_table(&source.name, &relation.target_table_name));

    let source_column = relation
        .junction_source_column
        .clone()
        .unwrap_or_else(|| conventions.junction_column(&source.name));

    let target_column = relation
        .junction_target_column
        .clone()
        .unwrap_or_else(|| conventions.junction_column(&relation.target_table_name));

    ForeignKeyBinding::Junction {
        table,
        source_column,
        target_column,
    }
}
