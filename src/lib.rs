//! # tether
//!
//! tether generates safe bindings that let a managed, garbage-collected host
//! call into natively compiled libraries, and provides the host-side runtime
//! those bindings go through.
//!
//! Given IR documents describing foreign entities, the pipeline:
//!
//! 1. resolves every short type reference to a canonical signature
//!    ([`tether_registry::SignatureIndex`])
//! 2. derives the exact foreign entry-point set and call signature per
//!    entity ([`tether_ffi::BindingPlan`], [`tether_ffi::BoundEntity`])
//! 3. probes true memory layout from the foreign library at first use,
//!    never trusting static offsets ([`tether_ffi::probe_layout`])
//! 4. emits binding source per entity ([`Generator`])
//!
//! At run time, generated bindings call through the ownership runtime
//! (validity flags, region scopes, idempotent release, weak-cached derived
//! wrappers), the per-member locking disciplines, and the async bridge
//! ([`tether_runtime`]).
//!
//! ```
//! use tether::{Generator, ir::IrDocument};
//!
//! let docs = vec![IrDocument::new("geo")];
//! let units = Generator::default().generate(docs).unwrap();
//! assert!(units.is_empty());
//! ```

pub mod emit;
mod generator;
mod options;

pub use generator::{GeneratedUnit, Generator, resolve_references};
pub use options::BindOptions;

pub use tether_core as core;
pub use tether_core::{
    error::{AccessError, BindError, BindResult, CallError, ForeignError, ResolveError},
    ir,
    layout::{EntityLayout, FieldLayout, LayoutSegment},
    signature::Signature,
    type_ref::{Ownership, Primitive, TypeRef},
};
pub use tether_ffi as ffi;
pub use tether_ffi::{BindingPlan, BoundEntity, EntityCatalog, ForeignFn, ForeignLibrary, RawValue};
pub use tether_registry::SignatureIndex;
pub use tether_runtime as runtime;
pub use tether_runtime::{CallArg, ForeignTask, NativeInstance, OwnershipFlag};
