// ============================================================================
// memorel Library
// ============================================================================

//! An in-process relational data layer: a record store, models with
//! belongs-to and has-many associations kept consistent on both sides, and a
//! JSON:API document serializer.
//!
//! ```
//! use memorel::{attrs, Db, ModelDef, Schema, SerializerConfig, SerializerRegistry};
//!
//! # fn main() -> memorel::Result<()> {
//! let schema = Schema::new(
//!     Db::new(),
//!     vec![
//!         ModelDef::new("author").has_many("posts"),
//!         ModelDef::new("post").belongs_to("author"),
//!     ],
//! )?;
//!
//! let author = schema.create("author", attrs! { "name" => "Link" })?;
//! let post = author.has_many("posts")?.create(None, attrs! { "title" => "Lorem" })?;
//! assert_eq!(post.get("authorId"), "1".into());
//!
//! let registry = SerializerRegistry::new(schema.clone())
//!     .serializer("author", SerializerConfig::new().include(&["posts"]));
//! let document = registry.serialize(&author)?;
//! assert_eq!(document.included.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod storage;
pub mod orm;
pub mod serializer;

// Re-export main types for convenience
pub use core::{DbError, ErrorKind, ID_KEY, ModelKey, Record, Result, Value};
pub use storage::{Db, Table};

pub use orm::{
    Association, AssociationDef, AssociationKind, Attrs, BelongsTo, Collection, Field, HasMany,
    KeyStorage, Model, ModelDef, ModelTable, Registry, Schema,
};

pub use serializer::{
    Document, Linkage, Payload, PrimaryData, Relationship, ResourceIdentifier, ResourceObject,
    SerializerConfig, SerializerRegistry,
};
