use memorel::{attrs, AssociationDef, Db, DbError, ModelDef, Result, Schema, Value};
use serde_json::json;

fn named_schema() -> Result<Schema> {
    Schema::new(
        Db::new(),
        vec![
            ModelDef::new("user").association("blogPosts", AssociationDef::has_many().model("post")),
            ModelDef::new("post"),
            ModelDef::new("foo"),
        ],
    )
}

fn library_schema() -> Result<Schema> {
    Schema::new(
        Db::new(),
        vec![
            ModelDef::new("author").association("books", AssociationDef::has_many().keyed_on_child()),
            ModelDef::new("book").belongs_to("author"),
        ],
    )
}

fn assert_single_link(schema: &Schema, user: &memorel::Model, post: &memorel::Model) -> Result<()> {
    let blog_posts = user.has_many("blogPosts")?;
    assert_eq!(blog_posts.ids()?, vec![post.id().unwrap()]);
    assert_eq!(user.get("blogPostIds"), Value::from(vec!["1"]));
    assert_eq!(blog_posts.get()?.first().map(|p| p.attrs()), Some(post.attrs()));

    let db = schema.dump();
    assert_eq!(db["users"], json!([{ "id": "1", "blogPostIds": ["1"] }]));
    assert_eq!(db["posts"], json!([{ "id": "1" }]));
    Ok(())
}

#[test]
fn test_create_with_foreign_keys() -> Result<()> {
    let schema = named_schema()?;
    let post = schema.create("post", attrs! {})?;

    let user = schema.create("user", attrs! { "blogPostIds" => vec![post.id().unwrap()] })?;

    assert_single_link(&schema, &user, &post)
}

#[test]
fn test_create_with_a_list_of_models() -> Result<()> {
    let schema = named_schema()?;
    let post = schema.create("post", attrs! {})?;

    let user = schema.create("user", attrs! { "blogPosts" => vec![post.clone()] })?;

    assert_single_link(&schema, &user, &post)
}

#[test]
fn test_create_with_a_collection() -> Result<()> {
    let schema = named_schema()?;
    schema.create("post", attrs! {})?;
    let posts = schema.table("post")?.all()?;

    let user = schema.create("user", attrs! { "blogPosts" => &posts })?;

    let post = posts.first().cloned().unwrap();
    assert_single_link(&schema, &user, &post)
}

#[test]
fn test_undeclared_relationship_is_rejected() -> Result<()> {
    let schema = named_schema()?;
    let foo = schema.create("foo", attrs! {})?;

    // 1. A single model
    let res = schema.create("user", attrs! { "foo" => &foo });
    assert!(matches!(res, Err(DbError::UndefinedRelationship(_))));

    // 2. A list of models
    let res = schema.create("user", attrs! { "foos" => vec![foo.clone()] });
    assert!(matches!(res, Err(DbError::UndefinedRelationship(_))));

    // 3. A collection
    let res = schema.create("user", attrs! { "foos" => schema.table("foo")?.all()? });
    assert!(matches!(res, Err(DbError::UndefinedRelationship(_))));

    // 4. A model of the wrong type for a declared relationship
    let res = schema.create("user", attrs! { "blogPosts" => vec![foo.clone()] });
    assert!(matches!(res, Err(DbError::UndefinedRelationship(_))));

    assert!(schema.table("user")?.is_empty()?);

    Ok(())
}

#[test]
fn test_rejected_assignment_changes_nothing() -> Result<()> {
    let schema = named_schema()?;
    let post = schema.create("post", attrs! {})?;
    let foo = schema.create("foo", attrs! {})?;
    let user = schema.create("user", attrs! { "name" => "Link" })?;

    let res = user.assign(attrs! { "name" => "Ganon", "blogPosts" => vec![post.clone()], "foo" => &foo });
    assert!(res.is_err());
    assert_eq!(user.get("name"), Value::from("Link"));
    assert!(user.has_many("blogPosts")?.ids()?.is_empty());

    Ok(())
}

#[test]
fn test_destroying_members_removes_their_keys() -> Result<()> {
    let schema = named_schema()?;
    let user = schema.create("user", attrs! {})?;
    let first = user.has_many("blogPosts")?.create(None, attrs! { "title" => "a" })?;
    let second = user.has_many("blogPosts")?.create(None, attrs! { "title" => "b" })?;
    assert_eq!(user.has_many("blogPosts")?.get()?.len(), 2);

    first.destroy()?;
    second.destroy()?;
    user.reload()?;

    assert_eq!(user.has_many("blogPosts")?.get()?.len(), 0);
    assert!(user.has_many("blogPosts")?.ids()?.is_empty());

    Ok(())
}

#[test]
fn test_new_member_is_saved_with_the_owner() -> Result<()> {
    let schema = named_schema()?;
    let user = schema.new_model("user", attrs! {})?;

    let post = user.has_many("blogPosts")?.new_model(None, attrs! { "title" => "Lorem" })?;
    assert!(post.is_new());
    assert!(user.has_many("blogPosts")?.includes(&post)?);
    assert!(user.has_many("blogPosts")?.ids()?.is_empty());

    user.save()?;
    assert!(post.is_saved());
    assert_eq!(user.has_many("blogPosts")?.ids()?, vec![post.id().unwrap()]);

    Ok(())
}

#[test]
fn test_add_and_remove() -> Result<()> {
    let schema = named_schema()?;
    let user = schema.create("user", attrs! {})?;
    let a = schema.create("post", attrs! {})?;
    let b = schema.create("post", attrs! {})?;

    let posts = user.has_many("blogPosts")?;
    posts.add(&a)?;
    posts.add(&b)?;
    posts.add(&a)?;
    assert_eq!(posts.ids()?, vec!["1".to_string(), "2".to_string()]);

    posts.remove(&a)?;
    user.save()?;
    user.reload()?;
    assert_eq!(user.has_many("blogPosts")?.ids()?, vec!["2".to_string()]);

    Ok(())
}

#[test]
fn test_set_ids_then_clear() -> Result<()> {
    let schema = named_schema()?;
    let user = schema.create("user", attrs! {})?;
    schema.create("post", attrs! {})?;
    schema.create("post", attrs! {})?;

    user.has_many("blogPosts")?.set_ids(vec![2, 1])?;
    user.save()?;
    assert_eq!(user.has_many("blogPosts")?.get()?.ids(), vec!["2".to_string(), "1".to_string()]);

    user.set("blogPostIds", Value::Null)?;
    user.save()?;
    assert!(user.has_many("blogPosts")?.get()?.is_empty());

    Ok(())
}

#[test]
fn test_keyed_on_child() -> Result<()> {
    let schema = library_schema()?;
    let author = schema.create("author", attrs! { "name" => "Herbert" })?;

    // 1. Create through the owner
    let book = author.has_many("books")?.create(None, attrs! { "title" => "Dune" })?;
    assert_eq!(book.get("authorId"), Value::from("1"));
    let books = author.has_many("books")?.get()?;
    assert_eq!(books.len(), 1);
    assert!(books.includes(&book));

    // 2. The owner record carries no key list
    assert_eq!(schema.dump()["authors"], json!([{ "id": "1", "name": "Herbert" }]));

    // 3. Emptying the membership clears the child keys
    author.has_many("books")?.set(&[])?;
    author.save()?;
    book.reload()?;
    assert_eq!(book.get("authorId"), Value::Null);
    assert!(author.has_many("books")?.get()?.is_empty());

    // 4. set_ids links existing children
    author.has_many("books")?.set_ids(vec![book.id().unwrap()])?;
    author.save()?;
    book.reload()?;
    assert_eq!(book.get("authorId"), Value::from(author.id()));

    Ok(())
}

#[test]
fn test_keyed_on_child_owner_destroyed() -> Result<()> {
    let schema = library_schema()?;
    let author = schema.create("author", attrs! {})?;
    let book = schema.create("book", attrs! { "author" => &author })?;
    assert_eq!(author.has_many("books")?.ids()?, vec![book.id().unwrap()]);

    author.destroy()?;
    book.reload()?;

    assert_eq!(book.get("authorId"), Value::Null);
    assert_eq!(schema.table("book")?.len()?, 1);

    Ok(())
}

#[test]
fn test_keyed_on_child_stale_member_changes_nothing() -> Result<()> {
    let schema = library_schema()?;
    let author = schema.create("author", attrs! {})?;
    let kept = schema.create("book", attrs! { "author" => &author })?;
    schema.create("book", attrs! {})?;

    // 1. A handle outlives its record
    let stale = schema.find("book", "2")?;
    schema.find("book", "2")?.destroy()?;

    // 2. Saving a membership that names it fails before any write
    author.has_many("books")?.set(&[stale])?;
    match author.save() {
        Err(DbError::RecordNotFound { collection, id }) => {
            assert_eq!(collection, "books");
            assert_eq!(id, "2");
        }
        other => panic!("Expected RecordNotFound, got {:?}", other),
    }

    // 3. The existing child keeps its key
    assert_eq!(
        schema.dump()["books"],
        json!([{ "id": "1", "authorId": author.id() }])
    );
    kept.reload()?;
    assert_eq!(kept.get("authorId"), Value::from(author.id()));

    Ok(())
}
