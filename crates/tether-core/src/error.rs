//! Unified error types for tether.
//!
//! Errors fall into three families, matching how they propagate:
//!
//! ```text
//! BindError (top-level wrapper)
//! ├── ResolveError - bind-time resolution failures, fatal, never retried
//! ├── AccessError  - per-call lifetime failures, recoverable by the caller
//! ├── ForeignError - failures reported by the foreign side (panic envelopes,
//! │                  async task error payloads)
//! └── CallError    - malformed traffic across a single call frame
//! ```
//!
//! A `ResolveError` indicates a fixed mismatch between the IR and the foreign
//! library (layout-incorrect bindings would result), so it is surfaced
//! immediately with identifying context and cached by the binder rather than
//! retried. `AccessError` and `ForeignError` are scoped to one call and never
//! affect the validity of unrelated instances.

use thiserror::Error;

pub type BindResult<T> = anyhow::Result<T, BindError>;

/// Fatal bind-time resolution failure.
///
/// These are cached by the single-initialization barriers in the binder:
/// once an entity fails to resolve, every later use observes the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A short type name matched no IR document.
    #[error(
        "unresolved type '{name}' referenced by {context}: declare the type in an IR document \
         visible to this build, or qualify the reference with its package path"
    )]
    UnresolvedType { name: String, context: String },

    /// A short type name matched more than one canonical signature.
    ///
    /// Silent resolution here would make generated code nondeterministic
    /// across builds, so every candidate is listed instead.
    #[error(
        "ambiguous type '{name}' referenced by {context}: candidates are {}",
        .candidates.join(", ")
    )]
    AmbiguousType {
        name: String,
        context: String,
        candidates: Vec<String>,
    },

    /// The foreign library does not export a symbol the entity needs.
    #[error("missing foreign entry point '{symbol}' required by {entity}")]
    MissingEntryPoint { symbol: String, entity: String },

    /// The layout probe returned something unusable.
    #[error("malformed layout report for {entity}: {detail}")]
    MalformedLayout { entity: String, detail: String },

    /// A declared field was absent from the foreign layout report.
    #[error("field '{field}' of {entity} is missing from the foreign layout report")]
    MissingLayoutField { entity: String, field: String },
}

/// Per-call lifetime failure.
///
/// Surfaced at the call site; the instance that failed stays invalid but
/// nothing else is corrupted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The instance's ownership flag (or one of its ancestors) is invalid.
    #[error("invalid access: {entity} instance is no longer valid")]
    InvalidHandle { entity: String },

    /// A null native pointer where a live value was expected.
    #[error("invalid access: null native pointer where a live {what} was expected")]
    NullPointer { what: String },

    /// A sub-range view outside its owning region.
    #[error("invalid access: range {offset}+{len} exceeds the {region_len}-byte region of {entity}")]
    OutOfRegion {
        entity: String,
        offset: usize,
        len: usize,
        region_len: usize,
    },
}

/// A failure reported by the foreign side itself.
///
/// Decoded from a panic-propagating envelope or an async task's error
/// payload, always after the corresponding drop entry point has run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("foreign call failed: {message}")]
pub struct ForeignError {
    pub message: String,
}

impl ForeignError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Malformed traffic across a single call frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("argument index {index} out of bounds ({count} slots)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    #[error("slot {index} holds {found}, expected {expected}")]
    SlotMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("return slot holds {found}, expected {expected}")]
    ReturnMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Message(String),
}

/// Top-level error for anything the binding layer can fail with.
#[derive(Error, Debug)]
pub enum BindError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Foreign(#[from] ForeignError),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl BindError {
    /// Whether this error is fatal at bind time (as opposed to per-call).
    pub fn is_resolution(&self) -> bool {
        matches!(self, BindError::Resolve(_))
    }
}
