pub mod association;
pub mod attrs;
pub mod belongs_to;
pub mod collection;
pub mod has_many;
pub mod inflector;
mod linkage;
pub mod model;
pub mod registry;
pub mod schema;

pub use association::{Association, AssociationDef, AssociationKind, KeyStorage};
pub use attrs::{Attrs, Field};
pub use belongs_to::BelongsTo;
pub use collection::Collection;
pub use has_many::HasMany;
pub use model::Model;
pub use registry::{ModelDef, Registry};
pub use schema::{ModelTable, Schema};
