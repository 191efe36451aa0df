//! Metadata catalog: the model that query identifiers resolve against.

mod model;
mod schema;

pub use model::MetadataModel;
pub use schema::{
    Catalog, EntitySet, EnumMember, EnumType, NavigationProperty, Operation, OperationKind,
    OperationParameter, Property, SchemaType, Singleton, StructuredKind, StructuredType,
};
