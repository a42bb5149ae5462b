use memorel::{attrs, AssociationDef, Db, DbError, ErrorKind, ModelDef, Result, Schema, Value};
use serde_json::json;

fn blog_schema() -> Result<Schema> {
    Schema::new(
        Db::new(),
        vec![
            ModelDef::new("author").has_many("posts"),
            ModelDef::new("post").belongs_to("author"),
            ModelDef::new("foo"),
        ],
    )
}

fn best_friend_schema(explicit_inverse: bool) -> Result<Schema> {
    let mut best_friend = AssociationDef::belongs_to().model("user");
    if explicit_inverse {
        best_friend = best_friend.inverse("bestFriend");
    }
    Schema::new(
        Db::new(),
        vec![ModelDef::new("user").association("bestFriend", best_friend)],
    )
}

#[test]
fn test_new_parent_is_saved_with_the_child() -> Result<()> {
    let schema = blog_schema()?;
    let post = schema.create("post", attrs! { "title" => "Lorem" })?;

    // 1. Build the parent in memory
    let author = post.belongs_to("author")?.new_model(attrs! { "name" => "Link" })?;
    assert!(author.is_new());
    assert_eq!(post.get("authorId"), Value::Null);
    assert_eq!(post.belongs_to("author")?.get()?, Some(author.clone()));

    // 2. Saving the child saves the parent first
    post.save()?;
    assert!(author.is_saved());
    assert_eq!(post.get("authorId"), Value::from(author.id()));

    // 3. Both sides are stored
    assert_eq!(
        schema.dump(),
        json!({
            "authors": [{ "id": "1", "name": "Link", "postIds": ["1"] }],
            "posts": [{ "id": "1", "title": "Lorem", "authorId": "1" }],
            "foos": [],
        })
    );

    Ok(())
}

#[test]
fn test_create_parent() -> Result<()> {
    let schema = blog_schema()?;
    let post = schema.new_model("post", attrs! { "title" => "Lorem" })?;

    let author = post.belongs_to("author")?.create(attrs! { "name" => "Zelda" })?;

    assert!(post.is_saved());
    assert_eq!(post.belongs_to("author")?.id(), author.id());
    author.reload()?;
    assert!(author.has_many("posts")?.includes(&post)?);

    Ok(())
}

#[test]
fn test_reassigning_moves_the_child() -> Result<()> {
    let schema = blog_schema()?;
    let zelda = schema.create("author", attrs! { "name" => "Zelda" })?;
    let link = schema.create("author", attrs! { "name" => "Link" })?;
    let post = schema.create("post", attrs! { "author" => &zelda })?;

    // 1. Point the post at another author
    post.belongs_to("author")?.set(Some(&link))?;
    post.save()?;

    // 2. The previous author no longer lists it
    zelda.reload()?;
    link.reload()?;
    assert!(zelda.has_many("posts")?.ids()?.is_empty());
    assert_eq!(link.has_many("posts")?.ids()?, vec![post.id().unwrap()]);

    // 3. Clearing the key unlinks it everywhere
    post.set("authorId", Value::Null)?;
    post.save()?;
    link.reload()?;
    assert!(link.has_many("posts")?.ids()?.is_empty());
    assert!(post.belongs_to("author")?.get()?.is_none());

    Ok(())
}

#[test]
fn test_taking_a_child_from_another_parent() -> Result<()> {
    let schema = blog_schema()?;
    let zelda = schema.create("author", attrs! { "name" => "Zelda" })?;
    let post = schema.create("post", attrs! { "author" => &zelda })?;
    let link = schema.create("author", attrs! { "name" => "Link" })?;

    link.has_many("posts")?.set(&[post.clone()])?;
    link.save()?;

    zelda.reload()?;
    post.reload()?;
    assert!(zelda.has_many("posts")?.ids()?.is_empty());
    assert_eq!(post.get("authorId"), Value::from(link.id()));

    Ok(())
}

#[test]
fn test_destroying_the_parent_clears_the_key() -> Result<()> {
    let schema = blog_schema()?;
    let author = schema.create("author", attrs! { "name" => "Zelda" })?;
    let saved = schema.create("post", attrs! { "author" => &author })?;
    let unsaved = schema.new_model("post", attrs! { "author" => &author })?;

    author.destroy()?;
    assert!(author.is_destroyed());

    // 1. The stored reference is cleared
    saved.reload()?;
    assert_eq!(saved.get("authorId"), Value::Null);
    assert!(saved.belongs_to("author")?.get()?.is_none());

    // 2. The in-memory reference is cleared too
    assert_eq!(unsaved.get("authorId"), Value::Null);
    assert!(unsaved.belongs_to("author")?.get()?.is_none());

    // 3. A destroyed model cannot be saved or assigned
    match author.save() {
        Err(DbError::ModelDestroyed(_)) => {}
        other => panic!("Expected ModelDestroyed, got {:?}", other),
    }
    match unsaved.set("author", &author) {
        Err(DbError::ModelDestroyed(_)) => {}
        other => panic!("Expected ModelDestroyed, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_wrong_target_type_is_rejected() -> Result<()> {
    let schema = blog_schema()?;
    let author = schema.create("author", attrs! {})?;
    let post = schema.create("post", attrs! { "author" => &author })?;
    let foo = schema.create("foo", attrs! {})?;

    let res = post.set("author", &foo);
    match res {
        Err(ref err @ DbError::UndefinedRelationship(_)) => {
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
        _ => panic!("Expected UndefinedRelationship, got {:?}", res),
    }
    assert_eq!(post.get("authorId"), Value::from(author.id()));

    // A has-many key cannot be read as a belongs-to
    match author.belongs_to("posts") {
        Err(DbError::TypeMismatch(_)) => {}
        other => panic!("Expected TypeMismatch, got {:?}", other.map(|_| ())),
    }

    Ok(())
}

#[test]
fn test_dangling_key_is_a_lookup_failure() -> Result<()> {
    let schema = blog_schema()?;
    let post = schema.create("post", attrs! {})?;

    post.belongs_to("author")?.set_id(99)?;
    assert_eq!(post.get("authorId"), Value::from("99"));

    let res = post.belongs_to("author")?.get();
    assert!(matches!(res, Err(ref err) if err.is_not_found()));

    let res = post.save();
    assert!(matches!(res, Err(DbError::RecordNotFound { .. })));

    Ok(())
}

#[test]
fn test_named_reflexive_new() -> Result<()> {
    for saved in [false, true] {
        let schema = best_friend_schema(false)?;
        let user = if saved {
            schema.create("user", attrs! { "name" => "Link" })?
        } else {
            schema.new_model("user", attrs! { "name" => "Link" })?
        };

        // 1. Build the friend in memory
        let ganon = user.belongs_to("bestFriend")?.new_model(attrs! { "name" => "Ganon" })?;
        assert!(ganon.is_new());
        assert_eq!(user.belongs_to("bestFriend")?.get()?, Some(ganon.clone()));
        assert_eq!(user.get("bestFriendId"), Value::Null);

        // 2. Saving writes both keys
        user.save()?;
        assert!(ganon.is_saved());
        assert_eq!(user.get("bestFriendId"), Value::from(ganon.id()));
        let stored = schema.find("user", ganon.id())?;
        assert_eq!(stored.get("bestFriendId"), Value::from(user.id()));
    }

    Ok(())
}

#[test]
fn test_named_reflexive_create_with_explicit_inverse() -> Result<()> {
    for saved in [false, true] {
        let schema = best_friend_schema(true)?;
        let user = if saved {
            schema.create("user", attrs! { "name" => "Link" })?
        } else {
            schema.new_model("user", attrs! { "name" => "Link" })?
        };

        let ganon = user.belongs_to("bestFriend")?.create(attrs! { "name" => "Ganon" })?;

        assert!(ganon.is_saved());
        assert!(user.is_saved());
        assert_eq!(user.get("bestFriendId"), Value::from(ganon.id()));
        assert_eq!(
            user.belongs_to("bestFriend")?.get()?.map(|m| m.attrs()),
            Some(ganon.attrs())
        );
        assert_eq!(
            schema.find("user", user.id())?.get("bestFriendId"),
            Value::from(ganon.id())
        );
        assert_eq!(
            schema.find("user", ganon.id())?.get("bestFriendId"),
            Value::from(user.id())
        );
    }

    Ok(())
}

#[test]
fn test_replacing_a_reflexive_friend_unlinks_the_old_one() -> Result<()> {
    let schema = best_friend_schema(true)?;
    let user = schema.create("user", attrs! { "name" => "Link" })?;
    let zelda = user.belongs_to("bestFriend")?.create(attrs! { "name" => "Zelda" })?;
    let ganon = user.belongs_to("bestFriend")?.create(attrs! { "name" => "Ganon" })?;

    zelda.reload()?;
    ganon.reload()?;
    assert_eq!(zelda.get("bestFriendId"), Value::Null);
    assert_eq!(ganon.get("bestFriendId"), Value::from(user.id()));

    Ok(())
}

#[test]
fn test_one_way_polymorphic_target_deleted() -> Result<()> {
    let schema = Schema::new(
        Db::new(),
        vec![
            ModelDef::new("comment").association(
                "commentable",
                AssociationDef::belongs_to().polymorphic().one_way(),
            ),
            ModelDef::new("post"),
        ],
    )?;
    let post = schema.create("post", attrs! { "title" => "Lorem" })?;
    let comment = schema.create("comment", attrs! { "commentable" => &post })?;
    assert_eq!(comment.get("commentableType"), Value::from("post"));

    post.destroy()?;
    comment.reload()?;

    assert_eq!(comment.get("commentableId"), Value::Null);
    assert_eq!(comment.get("commentableType"), Value::Null);
    assert!(comment.belongs_to("commentable")?.get()?.is_none());

    Ok(())
}
