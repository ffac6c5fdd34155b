use indexmap::IndexMap;

/// The root-field marker requesting every declared column.
pub const WILDCARD: &str = "*";

/// A client-requested field selection, split into the scalar fields of the
/// current table and the remaining dotted paths grouped per relation.
///
/// Built fresh for every request level; relation sub-paths are parsed again
/// one level down. Order is preserved everywhere so that emitted field order
/// tracks requested field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    root_fields: Vec<String>,
    sub_relations: IndexMap<String, Vec<String>>,
}

impl FieldSelection {
    /// Splits a flat list of dotted field paths.
    ///
    /// `id` and `*` are root fields; `author.name` files `name` under the
    /// `author` relation; `comments.author.name` files `author.name` under
    /// `comments`. Unknown relation names are not validated here.
    pub fn parse<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root_fields = Vec::new();
        let mut sub_relations: IndexMap<String, Vec<String>> = IndexMap::new();

        for path in paths {
            let path = path.as_ref();

            match path.split_once('.') {
                Some((head, rest)) if !head.is_empty() && !rest.is_empty() => {
                    sub_relations.entry(head.to_owned()).or_default().push(rest.to_owned());
                }
                _ => root_fields.push(path.to_owned()),
            }
        }

        Self {
            root_fields,
            sub_relations,
        }
    }

    pub fn root_fields(&self) -> &[String] {
        &self.root_fields
    }

    /// Scalar root fields without the wildcard marker.
    pub fn named_root_fields(&self) -> impl Iterator<Item = &str> {
        self.root_fields
            .iter()
            .map(String::as_str)
            .filter(|f| *f != WILDCARD)
    }

    pub fn sub_relations(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.sub_relations
            .iter()
            .map(|(name, paths)| (name.as_str(), paths.as_slice()))
    }

    pub fn sub_relation(&self, property_name: &str) -> Option<&[String]> {
        self.sub_relations.get(property_name).map(Vec::as_slice)
    }

    pub fn has_wildcard(&self) -> bool {
        self.root_fields.iter().any(|f| f == WILDCARD)
    }

    pub fn is_empty(&self) -> bool {
        self.root_fields.is_empty() && self.sub_relations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_roots_from_relations() {
        let selection =
            FieldSelection::parse(["id", "author.name", "comments.body", "title", "author.id"]);

        assert_eq!(selection.root_fields(), ["id", "title"]);

        let subs: Vec<_> = selection.sub_relations().collect();
        assert_eq!(
            subs,
            vec![
                ("author", &["name".to_owned(), "id".to_owned()][..]),
                ("comments", &["body".to_owned()][..]),
            ]
        );
    }

    #[test]
    fn deep_paths_keep_their_remainder() {
        let selection = FieldSelection::parse(["comments.author.name"]);

        assert_eq!(selection.sub_relation("comments"), Some(&["author.name".to_owned()][..]));
    }

    #[test]
    fn wildcard_is_a_root_field_not_a_relation() {
        let selection = FieldSelection::parse(["*", "comments.*"]);

        assert!(selection.has_wildcard());
        assert_eq!(selection.root_fields(), ["*"]);
        assert_eq!(selection.sub_relation("comments"), Some(&["*".to_owned()][..]));
        assert!(selection.sub_relation("*").is_none());
    }

    #[test]
    fn relation_order_is_first_mention_order() {
        let selection = FieldSelection::parse(["b.x", "a.y", "b.z"]);

        let names: Vec<_> = selection.sub_relations().map(|(name, _)| name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(selection.sub_relation("b"), Some(&["x".to_owned(), "z".to_owned()][..]));
    }

    #[test]
    fn degenerate_paths_stay_root_fields() {
        let selection = FieldSelection::parse(["trailing.", ".leading", ""]);

        assert_eq!(selection.root_fields(), ["trailing.", ".leading", ""]);
        assert_eq!(selection.sub_relations().count(), 0);
    }
}
