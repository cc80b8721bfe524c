//! Foreign function interface layer for tether.
//!
//! This crate owns everything between the IR model and a loaded foreign
//! library:
//! - the [`ForeignLibrary`] abstraction and type-erased entry points
//! - the [`Handle`] binder deriving the exact entry-point set per entity
//! - call-signature derivation (self slots, envelopes, task descriptors)
//! - the layout resolver, probing true memory layout at bind time
//! - the [`BindingPlan`] handed to the emitter

// Foreign-library abstraction and call frames
mod foreign;
pub use foreign::{CallFrame, ForeignFn, ForeignLibrary, RawValue, TaskDescriptor, read_cstring};

// Resolved entry points and symbol naming
mod handle;
pub use handle::{Handle, LifecycleOp, STRING_FREE_SYMBOL, lifecycle_symbol, property_symbol};

// Call signature derivation
mod calls;
pub use calls::{CallConvention, CallSignature, EnvelopeTag, ReturnEncoding, SlotKind};

// Layout probing
mod layout;
pub use layout::{SELF_SENTINEL, parse_report, probe_layout};

// Per-entity handle binding
mod binder;
pub use binder::{AccessorHandles, BoundEntity, EntityCatalog, EntityHandles, LifecycleHandles, MethodHandles};

// Binding plans for the emitter
mod plan;
pub use plan::{BindingPlan, MemberLockPlan, PlannedAccessor, PlannedLifecycle, PlannedMethod};
