use serde::{Deserialize, Serialize};

/// The cardinality of a relation. A closed set: every site traversing
/// relations matches exhaustively over these four kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ManyToOne,
    OneToMany,
    OneToOne,
    ManyToMany,
}

impl RelationKind {
    /// Whether the relation produces an array of related records.
    pub fn is_to_many(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }

    pub fn is_to_one(self) -> bool {
        !self.is_to_many()
    }
}

/// A relation as declared in the schema metadata.
///
/// Table, column and relation definitions live as data; this is the
/// deserialized shape of one relation entry. Optional members are filled in
/// by convention-based derivation at resolution time when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    /// The name client field selections use to address this relation. Unique
    /// within the owning table.
    pub property_name: String,

    #[serde(rename = "type")]
    pub kind: RelationKind,

    pub target_table_name: String,

    /// Name of the reciprocal relation declared on the target table, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_property_name: Option<String>,

    /// Explicit foreign key column. On the owning side this column lives on
    /// the declaring table, on the inverse side it lives on the target table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,

    /// Distinguishes the non-owning side of a one-to-one pair.
    #[serde(default)]
    pub is_inverse: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction_table_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction_source_column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction_target_column: Option<String>,
}

impl RelationDescriptor {
    /// A new relation with only the required members set.
    pub fn new(
        property_name: impl Into<String>,
        kind: RelationKind,
        target_table_name: impl Into<String>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            kind,
            target_table_name: target_table_name.into(),
            inverse_property_name: None,
            foreign_key_column: None,
            is_inverse: false,
            junction_table_name: None,
            junction_source_column: None,
            junction_target_column: None,
        }
    }

    pub fn with_foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key_column = Some(column.into());
        self
    }

    pub fn with_inverse_property(mut self, property: impl Into<String>) -> Self {
        self.inverse_property_name = Some(property.into());
        self
    }

    pub fn as_inverse(mut self) -> Self {
        self.is_inverse = true;
        self
    }

    pub fn with_junction(
        mut self,
        table: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.junction_table_name = Some(table.into());
        self.junction_source_column = Some(source_column.into());
        self.junction_target_column = Some(target_column.into());
        self
    }

    /// Whether this side of the relation holds the foreign key column.
    pub fn is_owning(&self) -> bool {
        match self.kind {
            RelationKind::ManyToOne => true,
            RelationKind::OneToOne => !self.is_inverse,
            RelationKind::OneToMany | RelationKind::ManyToMany => false,
        }
    }
}
