//! End-to-end synthesis over a small blog schema: posts with an author
//! (many-to-one), comments (one-to-many, with their own author) and
//! categories (many-to-many via a junction table).

use pretty_assertions::assert_eq;
use query_metadata::{
    CamelCase, InMemoryMetadata, MetadataAccessor, RelationDescriptor, RelationKind, TableMetadata,
};
use sql_nested_reads::{
    Context, MysqlDialect, NestedReadBuilder, PostgresDialect, RelationOrdering, SqlError,
};

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_table(
            TableMetadata::new("post")
                .with_column("id", "integer")
                .with_column("title", "text")
                .with_column("authorId", "integer")
                .with_relation(
                    RelationDescriptor::new("author", RelationKind::ManyToOne, "user")
                        .with_foreign_key("authorId"),
                )
                .with_relation(
                    RelationDescriptor::new("comments", RelationKind::OneToMany, "comment")
                        .with_inverse_property("post"),
                )
                .with_relation(RelationDescriptor::new(
                    "categories",
                    RelationKind::ManyToMany,
                    "category",
                )),
        )
        .with_table(
            TableMetadata::new("user")
                .with_column("id", "integer")
                .with_column("name", "text"),
        )
        .with_table(
            TableMetadata::new("comment")
                .with_column("id", "integer")
                .with_column("body", "text")
                .with_column("postId", "integer")
                .with_column("authorId", "integer")
                .with_relation(
                    RelationDescriptor::new("post", RelationKind::ManyToOne, "post")
                        .with_foreign_key("postId"),
                )
                .with_relation(
                    RelationDescriptor::new("author", RelationKind::ManyToOne, "user")
                        .with_foreign_key("authorId"),
                ),
        )
        .with_table(
            TableMetadata::new("category")
                .with_column("id", "integer")
                .with_column("name", "text"),
        )
}

fn fields(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| (*p).to_owned()).collect()
}

#[tokio::test]
async fn many_to_one_becomes_a_scalar_subquery_postgres() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "author", &fields(&["name"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT JSON_BUILD_OBJECT('name', t1.\"name\") FROM \"user\" AS t1 \
         WHERE CAST(t1.\"id\" AS TEXT) = CAST(\"post\".\"authorId\" AS TEXT) LIMIT 1)"
    );
}

#[tokio::test]
async fn many_to_one_becomes_a_scalar_subquery_mysql() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&MysqlDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "author", &fields(&["name"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT JSON_OBJECT('name', t1.`name`) FROM `user` AS t1 \
         WHERE CAST(t1.`id` AS CHAR) = CAST(`post`.`authorId` AS CHAR) LIMIT 1)"
    );
}

#[tokio::test]
async fn one_to_many_aggregates_to_an_array_with_empty_fallback() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["body"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT COALESCE(JSON_AGG(JSON_BUILD_OBJECT('body', t1.\"body\")), '[]'::JSON) \
         FROM \"comment\" AS t1 \
         WHERE CAST(t1.\"postId\" AS TEXT) = CAST(\"post\".\"id\" AS TEXT))"
    );
}

#[tokio::test]
async fn many_to_many_joins_the_junction_table() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "categories", &fields(&["name"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT COALESCE(JSON_AGG(JSON_BUILD_OBJECT('name', t1.\"name\")), '[]'::JSON) \
         FROM \"category\" AS t1 \
         INNER JOIN \"post_categories\" AS j1 \
         ON CAST(j1.\"categoryId\" AS TEXT) = CAST(t1.\"id\" AS TEXT) \
         WHERE CAST(j1.\"postId\" AS TEXT) = CAST(\"post\".\"id\" AS TEXT))"
    );
}

#[tokio::test]
async fn nested_relations_get_depth_indexed_aliases() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["author.name"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT COALESCE(JSON_AGG(JSON_BUILD_OBJECT('author', \
         (SELECT JSON_BUILD_OBJECT('name', t2.\"name\") FROM \"user\" AS t2 \
         WHERE CAST(t2.\"id\" AS TEXT) = CAST(t1.\"authorId\" AS TEXT) LIMIT 1))), '[]'::JSON) \
         FROM \"comment\" AS t1 \
         WHERE CAST(t1.\"postId\" AS TEXT) = CAST(\"post\".\"id\" AS TEXT))"
    );
}

#[tokio::test]
async fn subqueries_can_correlate_to_an_explicit_alias() {
    let accessor = metadata();
    let comment = accessor.get("comment").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery_with_alias("t1", 2, &comment, "author", &fields(&["name"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT JSON_BUILD_OBJECT('name', t2.\"name\") FROM \"user\" AS t2 \
         WHERE CAST(t2.\"id\" AS TEXT) = CAST(t1.\"authorId\" AS TEXT) LIMIT 1)"
    );
}

#[tokio::test]
async fn relation_ordering_is_embedded_on_postgres() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let orderings = [RelationOrdering::ascending("comments", "id")];
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase).with_orderings(&orderings);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["body"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT COALESCE(JSON_AGG(JSON_BUILD_OBJECT('body', t1.\"body\") \
         ORDER BY t1.\"id\" ASC), '[]'::JSON) \
         FROM \"comment\" AS t1 \
         WHERE CAST(t1.\"postId\" AS TEXT) = CAST(\"post\".\"id\" AS TEXT))"
    );
}

#[tokio::test]
async fn relation_ordering_uses_the_limit_workaround_on_mysql() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let orderings = [RelationOrdering::descending("comments", "id")];
    let ctx = Context::new(&MysqlDialect, &accessor, &CamelCase).with_orderings(&orderings);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["body"]))
        .await
        .unwrap();

    assert_eq!(
        sql,
        "(SELECT COALESCE(JSON_ARRAYAGG(JSON_OBJECT('body', t1.`body`)), JSON_ARRAY()) \
         FROM `comment` AS t1 \
         WHERE CAST(t1.`postId` AS CHAR) = CAST(`post`.`id` AS CHAR) \
         ORDER BY t1.`id` DESC LIMIT 9223372036854775807)"
    );
}

#[tokio::test]
async fn wildcard_hides_foreign_keys_and_defaults_relations_to_id_only() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let selected = builder.root_fields("post", &post, &fields(&["*"])).await;

    let names: Vec<&str> = selected.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["id", "title", "author", "comments", "categories"]);

    // The raw foreign key never shows up next to the nested object.
    assert!(!names.contains(&"authorId"));

    let author = &selected[2].1;
    assert_eq!(
        author,
        "(SELECT JSON_BUILD_OBJECT('id', t1.\"id\") FROM \"user\" AS t1 \
         WHERE CAST(t1.\"id\" AS TEXT) = CAST(\"post\".\"authorId\" AS TEXT) LIMIT 1)"
    );

    let comments = &selected[3].1;
    assert_eq!(
        comments,
        "(SELECT COALESCE(JSON_AGG(JSON_BUILD_OBJECT('id', t1.\"id\")), '[]'::JSON) \
         FROM \"comment\" AS t1 \
         WHERE CAST(t1.\"postId\" AS TEXT) = CAST(\"post\".\"id\" AS TEXT))"
    );
}

#[tokio::test]
async fn wildcard_on_a_table_without_relations_selects_all_columns_in_order() {
    let accessor = metadata();
    let user = accessor.get("user").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let selected = builder.root_fields("user", &user, &fields(&["*"])).await;

    assert_eq!(
        selected,
        vec![
            ("id".to_owned(), "\"user\".\"id\"".to_owned()),
            ("name".to_owned(), "\"user\".\"name\"".to_owned()),
        ]
    );
}

#[tokio::test]
async fn explicitly_selected_foreign_key_is_dropped_when_its_relation_is_nested() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let selected = builder
        .root_fields("post", &post, &fields(&["id", "authorId", "author.name"]))
        .await;

    let names: Vec<&str> = selected.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["id", "author"]);
}

#[tokio::test]
async fn unknown_relation_is_dropped_without_an_error() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "ghost", &fields(&["id"]))
        .await;

    assert_eq!(sql, None);

    let selected = builder
        .root_fields("post", &post, &fields(&["id", "ghost.name"]))
        .await;

    let names: Vec<&str> = selected.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["id"]);
}

#[tokio::test]
async fn missing_target_metadata_drops_the_relation() {
    let accessor = InMemoryMetadata::new().with_table(
        TableMetadata::new("post")
            .with_column("id", "integer")
            .with_relation(RelationDescriptor::new(
                "comments",
                RelationKind::OneToMany,
                "comment",
            )),
    );
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["body"]))
        .await;

    assert_eq!(sql, None);
}

#[tokio::test]
async fn unresolvable_foreign_key_drops_the_relation() {
    let accessor = InMemoryMetadata::new()
        .with_table(
            TableMetadata::new("post")
                .with_column("id", "integer")
                .with_relation(RelationDescriptor::new(
                    "comments",
                    RelationKind::OneToMany,
                    "comment",
                )),
        )
        // No explicit column, no inverse property, no reciprocal relation.
        .with_table(
            TableMetadata::new("comment")
                .with_column("id", "integer")
                .with_column("body", "text"),
        );
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["body"]))
        .await;

    assert_eq!(sql, None);
}

#[tokio::test]
async fn empty_surviving_selection_omits_the_fragment() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let sql = builder
        .relation_subquery("post", &post, "comments", &fields(&["nope"]))
        .await;

    assert_eq!(sql, None);
}

#[tokio::test]
async fn synthesis_is_deterministic() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let selection = fields(&["id", "title", "author.name", "comments.body", "categories.name"]);

    let first = builder.root_fields("post", &post, &selection).await;
    let second = builder.root_fields("post", &post, &selection).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn dialects_agree_on_the_emitted_field_shape() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let selection = fields(&["id", "author.name", "comments.body", "categories.name"]);

    let pg_ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let pg: Vec<String> = NestedReadBuilder::new(&pg_ctx)
        .root_fields("post", &post, &selection)
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    let my_ctx = Context::new(&MysqlDialect, &accessor, &CamelCase);
    let my: Vec<String> = NestedReadBuilder::new(&my_ctx)
        .root_fields("post", &post, &selection)
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    assert_eq!(pg, my);
    assert_eq!(pg, ["id", "author", "comments", "categories"]);
}

#[tokio::test]
async fn one_to_many_cte_groups_children_by_foreign_key() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let cte = builder
        .to_many_relation_cte(&post, "comments", &fields(&["body"]), "post_page")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cte.name, "comments_agg");
    assert_eq!(
        cte.body,
        "SELECT t1.\"postId\" AS \"__parent_id__\", \
         JSON_AGG(JSON_BUILD_OBJECT('body', t1.\"body\")) AS \"__nested_data__\" \
         FROM \"comment\" AS t1 \
         INNER JOIN \"post_page\" ON CAST(t1.\"postId\" AS TEXT) = CAST(\"post_page\".\"id\" AS TEXT) \
         GROUP BY t1.\"postId\""
    );
    assert_eq!(
        cte.outer_expr,
        "COALESCE(\"comments_agg\".\"__nested_data__\", '[]'::JSON)"
    );
    assert_eq!(
        cte.join_condition,
        "CAST(\"comments_agg\".\"__parent_id__\" AS TEXT) = CAST(\"post_page\".\"id\" AS TEXT)"
    );
}

#[tokio::test]
async fn many_to_many_cte_groups_junction_rows_by_source_column() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let cte = builder
        .to_many_relation_cte(&post, "categories", &fields(&["name"]), "post_page")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cte.name, "categories_agg");
    assert_eq!(
        cte.body,
        "SELECT j1.\"postId\" AS \"__parent_id__\", \
         JSON_AGG(JSON_BUILD_OBJECT('name', t1.\"name\")) AS \"__nested_data__\" \
         FROM \"category\" AS t1 \
         INNER JOIN \"post_categories\" AS j1 \
         ON CAST(j1.\"categoryId\" AS TEXT) = CAST(t1.\"id\" AS TEXT) \
         INNER JOIN \"post_page\" ON CAST(j1.\"postId\" AS TEXT) = CAST(\"post_page\".\"id\" AS TEXT) \
         GROUP BY j1.\"postId\""
    );
}

#[tokio::test]
async fn cte_relations_below_the_first_level_use_correlated_subqueries() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let cte = builder
        .to_many_relation_cte(&post, "comments", &fields(&["body", "author.name"]), "post_page")
        .await
        .unwrap()
        .unwrap();

    assert!(cte.body.contains(
        "(SELECT JSON_BUILD_OBJECT('name', t2.\"name\") FROM \"user\" AS t2 \
         WHERE CAST(t2.\"id\" AS TEXT) = CAST(t1.\"authorId\" AS TEXT) LIMIT 1)"
    ));
}

#[tokio::test]
async fn to_one_relations_are_rejected_by_the_cte_strategy() {
    let accessor = metadata();
    let post = accessor.get("post").await.unwrap();
    let ctx = Context::new(&PostgresDialect, &accessor, &CamelCase);
    let builder = NestedReadBuilder::new(&ctx);

    let result = builder
        .to_many_relation_cte(&post, "author", &fields(&["name"]), "post_page")
        .await;

    assert!(matches!(
        result,
        Err(SqlError::UnsupportedRelationKind {
            kind: RelationKind::ManyToOne,
            ..
        })
    ));
}
