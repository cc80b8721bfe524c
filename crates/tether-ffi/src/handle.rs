//! Resolved entry points and the derived-symbol naming contract.
//!
//! A [`Handle`] is a resolved, callable reference to one foreign function,
//! bound once per entity and cached for the process lifetime. Symbol names
//! follow a fixed convention so the foreign side and the generator agree
//! without negotiation:
//!
//! - `{prefix}_{op}` for lifecycle operations
//! - `{prefix}_property_{field}_{kind}_{get|set}` for non-trivial accessors
//! - [`STRING_FREE_SYMBOL`] for the process-wide string deallocator

use std::fmt;
use std::sync::Arc;

use tether_core::{AccessorKind, CallError};

use crate::calls::CallConvention;
use crate::foreign::{CallFrame, ForeignFn, RawValue};

/// Symbol of the process-wide string-deallocation entry point.
pub const STRING_FREE_SYMBOL: &str = "tether_string_free";

/// Lifecycle operations every concrete entity binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    Construct,
    Destroy,
    Duplicate,
    Borrow,
    BorrowMut,
    /// The "describe layout" probe.
    Layout,
}

impl LifecycleOp {
    pub fn suffix(&self) -> &'static str {
        match self {
            LifecycleOp::Construct => "new",
            LifecycleOp::Destroy => "drop",
            LifecycleOp::Duplicate => "clone",
            LifecycleOp::Borrow => "ref",
            LifecycleOp::BorrowMut => "ref_mut",
            LifecycleOp::Layout => "layout",
        }
    }
}

/// Derived symbol for a lifecycle operation.
pub fn lifecycle_symbol(prefix: &str, op: LifecycleOp) -> String {
    format!("{prefix}_{}", op.suffix())
}

/// Derived symbol for a non-trivial field accessor.
pub fn property_symbol(prefix: &str, field: &str, kind: AccessorKind, get: bool) -> String {
    let dir = if get { "get" } else { "set" };
    format!("{prefix}_property_{field}_{}_{dir}", kind.suffix())
}

/// A resolved, callable foreign entry point.
#[derive(Clone)]
pub struct Handle {
    symbol: Arc<str>,
    convention: CallConvention,
    imp: ForeignFn,
}

impl Handle {
    pub fn new(symbol: impl Into<Arc<str>>, convention: CallConvention, imp: ForeignFn) -> Self {
        Self {
            symbol: symbol.into(),
            convention,
            imp,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Calling-convention hints attached at bind time. Hints only; the call
    /// path is identical for every convention.
    pub fn convention(&self) -> CallConvention {
        self.convention
    }

    /// Invoke the entry point with the given argument slots.
    pub fn invoke(&self, args: Vec<RawValue>) -> Result<RawValue, CallError> {
        let mut frame = CallFrame::new(args);
        (self.imp.as_ref())(&mut frame)?;
        Ok(frame.into_return())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("symbol", &self.symbol)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}
