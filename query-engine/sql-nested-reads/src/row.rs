use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use query_metadata::{
    MetadataAccessor, NamingConvention, RelationKind, TableMetadata, foreign_key_spellings,
};
use record_value::RecordValue;
use tracing::warn;

/// One flat result row as returned by the database driver: column names
/// (possibly alias-prefixed) to values, in select order.
pub type FlatRow = IndexMap<String, RecordValue>;

/// One joined table instance in the join plan that produced the flat rows.
///
/// Nodes reference their parent by index instead of by alias string, so the
/// nesting tree is explicit and no alias decomposition is ever needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinNode {
    /// Prefix of this join's columns in the flat rows (`alias_column`).
    pub alias: String,
    /// The relation property as seen from the immediate parent.
    pub property: String,
    /// Cardinality recorded by the join planner. Advisory: classification
    /// uses the metadata's own cardinality.
    pub kind: RelationKind,
    /// Index of the parent join, `None` when joined to the root table.
    pub parent: Option<usize>,
}

/// The arena of join nodes for one query, in planning order. Parents always
/// precede their children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinTree {
    nodes: Vec<JoinNode>,
}

impl JoinTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a join attached directly to the root table. Returns its index.
    pub fn join_root(
        &mut self,
        alias: impl Into<String>,
        property: impl Into<String>,
        kind: RelationKind,
    ) -> usize {
        self.push(JoinNode {
            alias: alias.into(),
            property: property.into(),
            kind,
            parent: None,
        })
    }

    /// Adds a join attached to a previously added join. Returns its index.
    pub fn join_child(
        &mut self,
        parent: usize,
        alias: impl Into<String>,
        property: impl Into<String>,
        kind: RelationKind,
    ) -> usize {
        assert!(parent < self.nodes.len(), "parent join must be added first");

        self.push(JoinNode {
            alias: alias.into(),
            property: property.into(),
            kind,
            parent: Some(parent),
        })
    }

    pub fn nodes(&self) -> &[JoinNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: JoinNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// A join node whose relation resolved against the metadata.
#[derive(Debug, Clone)]
struct ResolvedJoin {
    index: usize,
    parent: Option<usize>,
    alias: String,
    /// Property chain from the root object to this join's value.
    property_path: Vec<String>,
    kind: RelationKind,
    target_meta: Arc<TableMetadata>,
}

/// Reconstructs nested objects from flat multi-join rows.
///
/// To-one joins nest as objects (null on a LEFT JOIN miss); to-many joins
/// group the fan-out rows by the root identifier and collect deduplicated
/// arrays; raw foreign key columns are stripped afterwards. Joins that fail
/// to resolve are skipped with a warning and their columns stay un-nested.
pub async fn remap_rows(
    rows: Vec<FlatRow>,
    joins: &JoinTree,
    root_meta: &TableMetadata,
    accessor: &dyn MetadataAccessor,
    conventions: &dyn NamingConvention,
) -> Vec<RecordValue> {
    if rows.is_empty() {
        return Vec::new();
    }

    let root_meta = Arc::new(root_meta.clone());
    let resolved = resolve_joins(joins, &root_meta, accessor).await;
    let owners = column_owners(&rows[0], &resolved);

    let root_singles: Vec<&ResolvedJoin> = {
        let mut singles: Vec<&ResolvedJoin> = resolved
            .iter()
            .flatten()
            .filter(|j| j.kind.is_to_one() && to_many_ancestor(&resolved, j.index).is_none())
            .collect();
        // Parents nest before their children attach.
        singles.sort_by_key(|j| j.property_path.len());
        singles
    };

    let to_many: Vec<&ResolvedJoin> = resolved
        .iter()
        .flatten()
        .filter(|j| j.kind.is_to_many())
        .collect();

    let pk = conventions.primary_key_column();

    let grouped = !to_many.is_empty() && rows[0].contains_key(pk);

    if !to_many.is_empty() && !grouped {
        warn!(
            column = %pk,
            "root identifier column missing from the row set, to-many joins are left un-grouped"
        );
    }

    let objects: Vec<Vec<(String, RecordValue)>> = if grouped {
        group_rows(&rows, &resolved, &root_singles, &to_many, &owners, conventions)
    } else {
        rows.iter()
            .map(|row| {
                let mut object = base_object(row, &root_singles, &owners, conventions);

                for &join in &to_many {
                    let items = match to_many_entry(row, join, &resolved, &owners, conventions) {
                        Some(entry) => vec![RecordValue::Object(entry)],
                        None => Vec::new(),
                    };

                    attach_at_path(&mut object, &join.property_path, RecordValue::List(items));
                }

                object
            })
            .collect()
    };

    let mut out = Vec::with_capacity(objects.len());

    for object in objects {
        out.push(
            strip_foreign_keys(
                RecordValue::Object(object),
                root_meta.clone(),
                accessor,
                conventions,
            )
            .await,
        );
    }

    out
}

/// Resolves every join node against the metadata, in planning order. The
/// result is index-aligned with the tree; unresolvable nodes (and their
/// descendants) are `None`.
async fn resolve_joins(
    joins: &JoinTree,
    root_meta: &Arc<TableMetadata>,
    accessor: &dyn MetadataAccessor,
) -> Vec<Option<ResolvedJoin>> {
    let mut resolved: Vec<Option<ResolvedJoin>> = Vec::with_capacity(joins.nodes().len());

    for (index, node) in joins.nodes().iter().enumerate() {
        let (source_meta, parent_path) = match node.parent {
            None => (root_meta.clone(), Vec::new()),
            Some(parent) => match resolved[parent].as_ref() {
                Some(parent_join) => (
                    parent_join.target_meta.clone(),
                    parent_join.property_path.clone(),
                ),
                None => {
                    warn!(
                        alias = %node.alias,
                        property = %node.property,
                        "parent join did not resolve, join skipped"
                    );
                    resolved.push(None);
                    continue;
                }
            },
        };

        let Some(descriptor) = source_meta.relation(&node.property) else {
            warn!(
                table = %source_meta.name,
                property = %node.property,
                "join references a relation that is not declared in the metadata, join skipped"
            );
            resolved.push(None);
            continue;
        };

        let Some(target_meta) = accessor.get(&descriptor.target_table_name).await else {
            warn!(
                table = %descriptor.target_table_name,
                property = %node.property,
                "no metadata for the join target table, join skipped"
            );
            resolved.push(None);
            continue;
        };

        if descriptor.kind != node.kind {
            warn!(
                property = %node.property,
                planned = ?node.kind,
                declared = ?descriptor.kind,
                "join cardinality differs from the metadata, metadata wins"
            );
        }

        if descriptor.kind.is_to_many() && has_to_many_ancestor(&resolved, node.parent) {
            warn!(
                property = %node.property,
                "to-many join nested below another to-many join is not supported, join skipped"
            );
            resolved.push(None);
            continue;
        }

        let mut property_path = parent_path;
        property_path.push(node.property.clone());

        resolved.push(Some(ResolvedJoin {
            index,
            parent: node.parent,
            alias: node.alias.clone(),
            property_path,
            kind: descriptor.kind,
            target_meta,
        }));
    }

    resolved
}

/// Nearest to-many ancestor of a resolved join, if any.
fn to_many_ancestor(resolved: &[Option<ResolvedJoin>], index: usize) -> Option<usize> {
    let mut cursor = resolved[index].as_ref()?.parent;

    while let Some(parent) = cursor {
        let join = resolved[parent].as_ref()?;

        if join.kind.is_to_many() {
            return Some(parent);
        }

        cursor = join.parent;
    }

    None
}

fn has_to_many_ancestor(resolved: &[Option<ResolvedJoin>], parent: Option<usize>) -> bool {
    let mut cursor = parent;

    while let Some(index) = cursor {
        match resolved[index].as_ref() {
            Some(join) if join.kind.is_to_many() => return true,
            Some(join) => cursor = join.parent,
            None => return false,
        }
    }

    false
}

/// Maps every column of the row shape to the join owning it, by longest
/// alias prefix. Columns owned by no join are root scalars.
fn column_owners(
    first_row: &FlatRow,
    resolved: &[Option<ResolvedJoin>],
) -> HashMap<String, usize> {
    let mut owners = HashMap::new();

    for column in first_row.keys() {
        let owner = resolved
            .iter()
            .flatten()
            .filter(|join| column.starts_with(&format!("{}_", join.alias)))
            .max_by_key(|join| join.alias.len());

        if let Some(join) = owner {
            owners.insert(column.clone(), join.index);
        }
    }

    owners
}

/// The root object of one row: un-prefixed scalar columns plus the to-one
/// joins on single-only chains, nested parent-first.
fn base_object(
    row: &FlatRow,
    root_singles: &[&ResolvedJoin],
    owners: &HashMap<String, usize>,
    conventions: &dyn NamingConvention,
) -> Vec<(String, RecordValue)> {
    let mut object: Vec<(String, RecordValue)> = row
        .iter()
        .filter(|(column, _)| !owners.contains_key(*column))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect();

    for &join in root_singles {
        let value = extract_join_object(row, join, owners, conventions);
        attach_at_path(&mut object, &join.property_path, value);
    }

    object
}

/// Groups fan-out rows by the root identifier. The first occurrence of a
/// root id builds the output object and one empty array per to-many join;
/// later occurrences only contribute array entries, deduplicated by the
/// entry identifier, first seen wins.
fn group_rows(
    rows: &[FlatRow],
    resolved: &[Option<ResolvedJoin>],
    root_singles: &[&ResolvedJoin],
    to_many: &[&ResolvedJoin],
    owners: &HashMap<String, usize>,
    conventions: &dyn NamingConvention,
) -> Vec<Vec<(String, RecordValue)>> {
    let pk = conventions.primary_key_column();

    let mut groups: IndexMap<RecordValue, Vec<(String, RecordValue)>> = IndexMap::new();
    let mut seen: HashMap<(usize, usize), HashSet<RecordValue>> = HashMap::new();

    for row in rows {
        let root_id = row.get(pk).cloned().unwrap_or(RecordValue::Null);

        let group_index = match groups.get_index_of(&root_id) {
            Some(index) => index,
            None => {
                let mut object = base_object(row, root_singles, owners, conventions);

                for &join in to_many {
                    attach_at_path(&mut object, &join.property_path, RecordValue::List(Vec::new()));
                }

                groups.insert(root_id.clone(), object);
                groups.len() - 1
            }
        };

        for &join in to_many {
            // None: LEFT JOIN produced no child on this row.
            let Some(entry) = to_many_entry(row, join, resolved, owners, conventions) else {
                continue;
            };

            if let Some((_, entry_id)) = entry.iter().find(|(key, _)| key == pk) {
                let seen_ids = seen.entry((group_index, join.index)).or_default();

                if !seen_ids.insert(entry_id.clone()) {
                    continue;
                }
            }

            let (_, object) = groups.get_index_mut(group_index).expect("group exists");
            push_at_path(object, &join.property_path, RecordValue::Object(entry));
        }
    }

    groups.into_values().collect()
}

/// One array entry for a to-many join on this row: the join's own columns
/// plus any to-one joins nested below it. `None` when the joined row's
/// identifier is null.
fn to_many_entry(
    row: &FlatRow,
    join: &ResolvedJoin,
    resolved: &[Option<ResolvedJoin>],
    owners: &HashMap<String, usize>,
    conventions: &dyn NamingConvention,
) -> Option<Vec<(String, RecordValue)>> {
    let RecordValue::Object(mut entry) = extract_join_object(row, join, owners, conventions)
    else {
        return None;
    };

    for single in entry_singles(resolved, join.index) {
        let nested = extract_join_object(row, single, owners, conventions);
        let relative_path = &single.property_path[join.property_path.len()..];
        attach_at_path(&mut entry, relative_path, nested);
    }

    Some(entry)
}

/// The to-one joins whose nearest to-many ancestor is `ancestor`: they nest
/// inside that join's array entries, parent-first.
fn entry_singles(resolved: &[Option<ResolvedJoin>], ancestor: usize) -> Vec<&ResolvedJoin> {
    let mut singles: Vec<&ResolvedJoin> = resolved
        .iter()
        .flatten()
        .filter(|j| j.kind.is_to_one() && to_many_ancestor(resolved, j.index) == Some(ancestor))
        .collect();

    singles.sort_by_key(|j| j.property_path.len());
    singles
}

/// Extracts the columns prefixed by a join's alias into an object, or
/// `Null` when the joined row's identifier is null (LEFT JOIN miss).
fn extract_join_object(
    row: &FlatRow,
    join: &ResolvedJoin,
    owners: &HashMap<String, usize>,
    conventions: &dyn NamingConvention,
) -> RecordValue {
    let prefix = format!("{}_", join.alias);

    let fields: Vec<(String, RecordValue)> = row
        .iter()
        .filter(|(column, _)| owners.get(*column) == Some(&join.index))
        .filter_map(|(column, value)| {
            column
                .strip_prefix(&prefix)
                .map(|field| (field.to_owned(), value.clone()))
        })
        .collect();

    if fields.is_empty() {
        return RecordValue::Null;
    }

    let pk = conventions.primary_key_column();
    let missing = match fields.iter().find(|(key, _)| key == pk) {
        Some((_, value)) => value.is_null(),
        None => fields.iter().all(|(_, value)| value.is_null()),
    };

    if missing {
        RecordValue::Null
    } else {
        RecordValue::Object(fields)
    }
}

/// Sets `value` at the nested `path`, replacing an existing entry. Missing
/// or null ancestors drop the value: an unresolved or unmatched parent
/// cannot receive children.
fn attach_at_path(object: &mut Vec<(String, RecordValue)>, path: &[String], value: RecordValue) {
    match path {
        [] => {}
        [last] => match object.iter_mut().find(|(key, _)| key == last) {
            Some(entry) => entry.1 = value,
            None => object.push((last.clone(), value)),
        },
        [head, rest @ ..] => {
            if let Some((_, RecordValue::Object(inner))) =
                object.iter_mut().find(|(key, _)| key == head)
            {
                attach_at_path(inner, rest, value);
            }
        }
    }
}

/// Pushes `value` onto the array at the nested `path`.
fn push_at_path(object: &mut Vec<(String, RecordValue)>, path: &[String], value: RecordValue) {
    match path {
        [] => {}
        [last] => {
            if let Some((_, RecordValue::List(items))) =
                object.iter_mut().find(|(key, _)| key == last)
            {
                items.push(value);
            }
        }
        [head, rest @ ..] => {
            if let Some((_, RecordValue::Object(inner))) =
                object.iter_mut().find(|(key, _)| key == head)
            {
                push_at_path(inner, rest, value);
            }
        }
    }
}

/// Removes raw foreign key columns from an object tree, using each level's
/// own table metadata and recognizing both the camel-case and underscore
/// spelling of every owning relation's key. Scalar, temporal and binary
/// values are leaves and pass through untouched.
fn strip_foreign_keys<'f>(
    value: RecordValue,
    meta: Arc<TableMetadata>,
    accessor: &'f dyn MetadataAccessor,
    conventions: &'f dyn NamingConvention,
) -> BoxFuture<'f, RecordValue> {
    async move {
        match value {
            RecordValue::Object(fields) => {
                let foreign_keys = foreign_key_columns(&meta, conventions);
                let mut stripped = Vec::with_capacity(fields.len());

                for (key, value) in fields {
                    if foreign_keys.contains(&key) {
                        continue;
                    }

                    let value = match meta.relation(&key) {
                        Some(descriptor) => {
                            match accessor.get(&descriptor.target_table_name).await {
                                Some(target) => {
                                    strip_foreign_keys(value, target, accessor, conventions).await
                                }
                                None => value,
                            }
                        }
                        None => value,
                    };

                    stripped.push((key, value));
                }

                RecordValue::Object(stripped)
            }
            RecordValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());

                for item in items {
                    out.push(strip_foreign_keys(item, meta.clone(), accessor, conventions).await);
                }

                RecordValue::List(out)
            }
            leaf => leaf,
        }
    }
    .boxed()
}

/// The strippable key spellings of a table's owning relations: the explicit
/// or convention-derived column plus both spellings of the property name.
fn foreign_key_columns(
    meta: &TableMetadata,
    conventions: &dyn NamingConvention,
) -> HashSet<String> {
    let mut columns = HashSet::new();

    for relation in meta.relations().filter(|r| r.is_owning()) {
        match &relation.foreign_key_column {
            Some(column) => {
                columns.insert(column.clone());
            }
            None => {
                columns.insert(conventions.foreign_key_for_table(&relation.target_table_name));
            }
        }

        for spelling in foreign_key_spellings(&relation.property_name) {
            columns.insert(spelling);
        }
    }

    columns
}
