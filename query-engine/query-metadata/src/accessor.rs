use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::table::TableMetadata;

/// Asynchronous lookup of table metadata by table name.
///
/// The schema store behind this trait (database, cache, remote service) is
/// outside this engine; the lookup is the engine's only suspension point.
/// Returning `None` signals an unknown table and degrades the affected
/// field, never the whole query.
#[async_trait]
pub trait MetadataAccessor: Send + Sync {
    async fn get(&self, table: &str) -> Option<Arc<TableMetadata>>;
}

/// Map-backed accessor for embedders whose schema already lives in memory,
/// and for tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetadata {
    tables: HashMap<String, Arc<TableMetadata>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.tables.insert(table.name.clone(), Arc::new(table));
        self
    }

    pub fn insert(&mut self, table: TableMetadata) {
        self.tables.insert(table.name.clone(), Arc::new(table));
    }
}

#[async_trait]
impl MetadataAccessor for InMemoryMetadata {
    async fn get(&self, table: &str) -> Option<Arc<TableMetadata>> {
        self.tables.get(table).cloned()
    }
}
