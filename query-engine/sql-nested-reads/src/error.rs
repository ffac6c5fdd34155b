use query_metadata::{MetadataError, RelationKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Programmer error: an API was handed a relation kind it is not defined
    /// for (e.g. a to-one relation on the batch CTE path). Unlike metadata
    /// gaps this is not degraded away.
    #[error("Relation kind {kind:?} is not supported by {operation}.")]
    UnsupportedRelationKind {
        kind: RelationKind,
        operation: &'static str,
    },
}
