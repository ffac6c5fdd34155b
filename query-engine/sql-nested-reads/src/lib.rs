//! SQL synthesis and row decoding for metadata-driven nested reads.
//!
//! Given runtime table metadata and a client field selection, this crate
//! emits dialect-specific SQL fragments that return relation data already
//! shaped as nested JSON (correlated subqueries, or batch CTEs for bounded
//! parent pages), and decodes flat multi-join result rows back into the
//! same nested shape.
//!
//! Fragments are embeddable only: the surrounding SELECT is owned by the
//! calling query layer, which also executes it.

#![deny(unsafe_code)]

mod alias;
mod context;
mod dialect;
mod error;
mod ordering;
mod query_builder;
mod row;

pub use context::Context;
pub use dialect::{Flavour, MysqlDialect, PostgresDialect, SqlDialect};
pub use error::SqlError;
pub use ordering::{RelationOrdering, SortOrder};
pub use query_builder::{CTE_DATA_IDENT, CTE_PARENT_IDENT, NamedCte, NestedReadBuilder};
pub use row::{FlatRow, JoinNode, JoinTree, remap_rows};

pub type Result<T> = std::result::Result<T, error::SqlError>;
