use memorel::{attrs, AssociationDef, Db, Model, ModelDef, Result, Schema, Value};
use serde_json::json;

fn tag_schema() -> Result<Schema> {
    Schema::new(Db::new(), vec![ModelDef::new("tag").has_many("tags")])
}

fn label_schema() -> Result<Schema> {
    Schema::new(
        Db::new(),
        vec![ModelDef::new("tag").association("labels", AssociationDef::has_many().model("tag"))],
    )
}

fn assert_mutual_tags(schema: &Schema, tag_a: &Model, tag_b: &Model) -> Result<()> {
    tag_a.reload()?;
    assert_eq!(tag_b.get("tagIds"), Value::from(vec!["1"]));
    assert_eq!(tag_a.get("tagIds"), Value::from(vec!["2"]));
    assert!(tag_a.has_many("tags")?.includes(tag_b)?);
    assert!(tag_b.has_many("tags")?.includes(tag_a)?);
    assert_eq!(
        schema.dump()["tags"],
        json!([
            { "id": "1", "tagIds": ["2"] },
            { "id": "2", "tagIds": ["1"] },
        ])
    );
    Ok(())
}

#[test]
fn test_reflexive_create_with_foreign_keys() -> Result<()> {
    let schema = tag_schema()?;
    let tag_a = schema.create("tag", attrs! {})?;

    let tag_b = schema.create("tag", attrs! { "tagIds" => vec![tag_a.id().unwrap()] })?;

    assert_mutual_tags(&schema, &tag_a, &tag_b)
}

#[test]
fn test_reflexive_create_with_a_list_of_models() -> Result<()> {
    let schema = tag_schema()?;
    let tag_a = schema.create("tag", attrs! {})?;

    let tag_b = schema.create("tag", attrs! { "tags" => vec![tag_a.clone()] })?;

    assert_mutual_tags(&schema, &tag_a, &tag_b)
}

#[test]
fn test_reflexive_create_with_a_collection() -> Result<()> {
    let schema = tag_schema()?;
    let tag_a = schema.create("tag", attrs! {})?;
    let tags = schema.table("tag")?.all()?;

    let tag_b = schema.create("tag", attrs! { "tags" => tags })?;

    assert_mutual_tags(&schema, &tag_a, &tag_b)
}

#[test]
fn test_reflexive_unlink_is_mutual() -> Result<()> {
    let schema = tag_schema()?;
    let tag_a = schema.create("tag", attrs! {})?;
    let tag_b = schema.create("tag", attrs! { "tags" => vec![tag_a.clone()] })?;

    tag_b.has_many("tags")?.set(&[])?;
    tag_b.save()?;
    tag_a.reload()?;

    assert!(tag_a.has_many("tags")?.ids()?.is_empty());
    assert!(tag_b.has_many("tags")?.ids()?.is_empty());

    Ok(())
}

// Label states: a new tag, a saved tag, and a saved tag that already has labels.
fn tag_in_state(schema: &Schema, state: &str) -> Result<Model> {
    match state {
        "new" => schema.new_model("tag", attrs! { "name" => "Red" }),
        "saved" => schema.create("tag", attrs! { "name" => "Red" }),
        _ => {
            let blue = schema.create("tag", attrs! { "name" => "Blue" })?;
            let green = schema.create("tag", attrs! { "name" => "Green" })?;
            schema.create("tag", attrs! { "name" => "Red", "labels" => vec![blue, green] })
        }
    }
}

#[test]
fn test_named_reflexive_create() -> Result<()> {
    for state in ["new", "saved", "labelled"] {
        let schema = label_schema()?;
        let tag = tag_in_state(&schema, state)?;
        let initial = tag.has_many("labels")?.get()?.len();

        let orange = tag.has_many("labels")?.create(None, attrs! { "name" => "Orange" })?;

        assert!(orange.is_saved(), "state {}", state);
        assert!(tag.is_saved(), "state {}", state);
        assert_eq!(tag.has_many("labels")?.get()?.len(), initial + 1, "state {}", state);
        assert!(tag.has_many("labels")?.includes(&orange)?);
        assert!(tag.has_many("labels")?.ids()?.contains(&orange.id().unwrap()));
        assert!(orange.has_many("labels")?.includes(&tag)?, "state {}", state);

        let stored = schema.find("tag", orange.id())?;
        assert_eq!(stored.get("labelIds"), Value::from(vec![tag.id().unwrap()]));
    }

    Ok(())
}

#[test]
fn test_named_reflexive_delete() -> Result<()> {
    let schema = label_schema()?;
    let tag = tag_in_state(&schema, "labelled")?;
    let labels = tag.has_many("labels")?.get()?;
    assert_eq!(labels.len(), 2);

    labels.destroy()?;
    tag.reload()?;

    assert_eq!(tag.has_many("labels")?.get()?.len(), 0);
    assert!(tag.has_many("labels")?.ids()?.is_empty());

    Ok(())
}
