pub mod config;
pub mod document;
mod json_api;
pub mod registry;

pub use config::SerializerConfig;
pub use document::{
    Document, Linkage, PrimaryData, Relationship, ResourceIdentifier, ResourceObject,
};
pub use registry::{Payload, SerializerRegistry};
