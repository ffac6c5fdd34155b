use serde::{Deserialize, Serialize};

use crate::conventions::NamingConvention;
use crate::relation::RelationDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,

    /// The declared column type, kept as the free-form string the schema
    /// store uses. The engine never interprets it.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// The runtime description of one table: its columns in declaration order
/// and its relations in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.columns.push(ColumnMetadata::new(name, type_name));
        self
    }

    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Linear scan by property name, as relation lists are small.
    pub fn relation(&self, property_name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.property_name == property_name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter()
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.iter()
    }

    /// The foreign key columns held by this table for its owning relations,
    /// explicit or derived by convention from the target table name. These
    /// are the raw columns that get re-exposed as nested objects instead of
    /// scalar values.
    pub fn owning_foreign_key_columns(&self, conventions: &dyn NamingConvention) -> Vec<String> {
        self.relations
            .iter()
            .filter(|r| r.is_owning())
            .map(|r| {
                r.foreign_key_column
                    .clone()
                    .unwrap_or_else(|| conventions.foreign_key_for_table(&r.target_table_name))
            })
            .collect()
    }
}
