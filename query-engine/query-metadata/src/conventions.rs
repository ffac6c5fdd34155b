use std::fmt;

/// The naming convention used to derive foreign key columns, junction tables
/// and primary key columns when the schema metadata does not spell them out.
///
/// Injectable so that schemas following a different convention can supply
/// their own derivation rules instead of relying on hard-coded fallbacks.
pub trait NamingConvention: fmt::Debug + Send + Sync {
    /// The identifier column every table is assumed to carry.
    fn primary_key_column(&self) -> &str {
        "id"
    }

    /// Foreign key column derived from the related table's name, e.g.
    /// `user` -> `userId`.
    fn foreign_key_for_table(&self, table: &str) -> String;

    /// Foreign key column derived from a relation property name, e.g.
    /// `author` -> `authorId`.
    fn foreign_key_for_property(&self, property: &str) -> String;

    /// Junction table name derived from the two related table names, e.g.
    /// (`post`, `category`) -> `post_categories`.
    fn junction_table(&self, source_table: &str, target_table: &str) -> String;

    /// Junction column referencing the given table, e.g. `post` -> `postId`.
    fn junction_column(&self, table: &str) -> String;
}

/// `authorId` style derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CamelCase;

impl NamingConvention for CamelCase {
    fn foreign_key_for_table(&self, table: &str) -> String {
        format!("{table}Id")
    }

    fn foreign_key_for_property(&self, property: &str) -> String {
        format!("{property}Id")
    }

    fn junction_table(&self, source_table: &str, target_table: &str) -> String {
        format!("{}_{}", to_snake_case(source_table), pluralize(&to_snake_case(target_table)))
    }

    fn junction_column(&self, table: &str) -> String {
        format!("{table}Id")
    }
}

/// `author_id` style derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCase;

impl NamingConvention for SnakeCase {
    fn foreign_key_for_table(&self, table: &str) -> String {
        format!("{}_id", to_snake_case(table))
    }

    fn foreign_key_for_property(&self, property: &str) -> String {
        format!("{}_id", to_snake_case(property))
    }

    fn junction_table(&self, source_table: &str, target_table: &str) -> String {
        format!("{}_{}", to_snake_case(source_table), pluralize(&to_snake_case(target_table)))
    }

    fn junction_column(&self, table: &str) -> String {
        format!("{}_id", to_snake_case(table))
    }
}

/// The two spellings a raw foreign key property can take for a given base
/// name. The row remapper strips both regardless of the active convention.
pub fn foreign_key_spellings(base: &str) -> [String; 2] {
    [format!("{base}Id"), format!("{}_id", to_snake_case(base))]
}

pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// English pluralization covering the table names encountered in practice.
fn pluralize(noun: &str) -> String {
    if let Some(stem) = noun.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }

    if noun.ends_with('s')
        || noun.ends_with('x')
        || noun.ends_with('z')
        || noun.ends_with("ch")
        || noun.ends_with("sh")
    {
        return format!("{noun}es");
    }

    format!("{noun}s")
}
