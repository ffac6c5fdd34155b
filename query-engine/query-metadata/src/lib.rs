//! Runtime schema metadata for the dynamic query engine.
//!
//! Table, column and relation definitions live as data and are only known at
//! runtime. This crate models them, resolves relation join ingredients from
//! them (with convention-based fallbacks for anything the metadata leaves
//! implicit), and parses client field selections into per-relation shapes.

mod accessor;
mod conventions;
mod error;
mod field_selection;
mod relation;
mod resolver;
mod table;

pub use accessor::{InMemoryMetadata, MetadataAccessor};
pub use conventions::{CamelCase, NamingConvention, SnakeCase, foreign_key_spellings, to_snake_case};
pub use error::MetadataError;
pub use field_selection::{FieldSelection, WILDCARD};
pub use relation::{RelationDescriptor, RelationKind};
pub use resolver::{ForeignKeyBinding, ResolvedRelation, resolve, resolve_property};
pub use table::{ColumnMetadata, TableMetadata};
