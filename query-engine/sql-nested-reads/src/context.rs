use query_metadata::{MetadataAccessor, NamingConvention};

use crate::dialect::SqlDialect;
use crate::ordering::RelationOrdering;

/// Everything a synthesis pass needs besides the metadata of the tables it
/// visits: the target dialect, the metadata lookup, the naming convention,
/// and the caller's relation-scoped orderings.
///
/// The engine itself holds no state across invocations; a context borrows
/// its collaborators for the duration of one call.
pub struct Context<'a> {
    pub(crate) dialect: &'a dyn SqlDialect,
    pub(crate) accessor: &'a dyn MetadataAccessor,
    pub(crate) conventions: &'a dyn NamingConvention,
    pub(crate) orderings: &'a [RelationOrdering],
}

impl<'a> Context<'a> {
    pub fn new(
        dialect: &'a dyn SqlDialect,
        accessor: &'a dyn MetadataAccessor,
        conventions: &'a dyn NamingConvention,
    ) -> Self {
        Self {
            dialect,
            accessor,
            conventions,
            orderings: &[],
        }
    }

    pub fn with_orderings(mut self, orderings: &'a [RelationOrdering]) -> Self {
        self.orderings = orderings;
        self
    }

    pub(crate) fn ordering_for(&self, path: &str) -> Option<&'a RelationOrdering> {
        self.orderings.iter().find(|o| o.matches(path))
    }
}
