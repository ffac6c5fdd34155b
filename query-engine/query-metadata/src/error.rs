use thiserror::Error;

/// Errors surfaced while navigating schema metadata.
///
/// Every variant maps to a non-fatal degradation at the query layer: callers
/// log a warning and drop the affected field or relation instead of failing
/// the whole request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Table `{0}` was not found in the schema metadata.")]
    TableNotFound(String),

    #[error("Relation `{relation}` does not exist on table `{table}`.")]
    RelationNotFound { table: String, relation: String },

    #[error(
        "No foreign key column could be resolved for relation `{relation}` on table `{table}`."
    )]
    UnresolvedForeignKey { table: String, relation: String },
}

impl MetadataError {
    pub fn relation_not_found(table: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::RelationNotFound {
            table: table.into(),
            relation: relation.into(),
        }
    }

    pub fn unresolved_foreign_key(table: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnresolvedForeignKey {
            table: table.into(),
            relation: relation.into(),
        }
    }
}
