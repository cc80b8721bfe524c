//! Core data model for the tether binding generator.
//!
//! This crate holds everything the other tether crates agree on: the IR
//! entity model, recursive type references, canonical signatures and their
//! deterministic hashes, resolved layouts, the raw native pointer cell, and
//! the error taxonomy.
//!
//! It deliberately has no opinion on where IR documents come from (parsing is
//! out of scope) or how entry points are called (that lives in `tether-ffi`).

pub mod entity_hash;
pub mod error;
pub mod ir;
pub mod layout;
pub mod mem;
pub mod signature;
pub mod type_ref;

pub use entity_hash::EntityHash;
pub use error::{AccessError, BindError, BindResult, CallError, ForeignError, ResolveError};
pub use ir::{
    CallMode, EntityKind, Field, IrDocument, LockDiscipline, Method, MethodKind, ThreadSafety,
    TypeDefinition, Variant,
};
pub use layout::{EntityLayout, FieldLayout, LayoutSegment, VariantLayout};
pub use mem::NativePtr;
pub use signature::{QUALIFIER, Signature};
pub use type_ref::{AccessorKind, Ownership, Primitive, TypeRef};
