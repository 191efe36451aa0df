//! Type system: EDM primitive kinds, type references, and literal values.

mod literal;
mod primitive;
mod type_ref;
mod value;

pub use literal::{LiteralConverter, ProtocolVersion};
pub use primitive::PrimitiveKind;
pub use type_ref::{TypeId, TypeKind, TypeRef};
pub use value::{LiteralValue, PrimitiveValue};
