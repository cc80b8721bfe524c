//! The foreign-library boundary.
//!
//! The foreign library's implementation is out of scope; what tether sees is
//! a symbol table of type-erased entry points. Each entry point is a callable
//! over a [`CallFrame`] of raw slots, so functions of different signatures
//! can be stored and invoked uniformly.
//!
//! ## Raw values
//!
//! [`RawValue`] models exactly what crosses the boundary: machine words,
//! floats, pointers, the tagged `{tag, payload}` envelope used by
//! panic-propagating returns and task polls, and the three-pointer task
//! descriptor returned by asynchronous methods.

use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

use tether_core::{CallError, NativePtr};

/// Type-erased foreign entry point.
pub type ForeignFn = Arc<dyn Fn(&mut CallFrame) -> Result<(), CallError> + Send + Sync>;

/// A loaded foreign library, viewed as a symbol table.
pub trait ForeignLibrary: Send + Sync {
    /// Look up an exported entry point by symbol name.
    fn entry_point(&self, symbol: &str) -> Option<ForeignFn>;
}

/// A foreign asynchronous task: handle plus its poll and drop entry points.
///
/// The poll and drop functions are returned by the foreign side at call time;
/// they are not named symbols.
#[derive(Clone)]
pub struct TaskDescriptor {
    pub handle: NativePtr,
    pub poll: ForeignFn,
    pub drop_fn: ForeignFn,
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// One raw slot crossing the foreign boundary.
#[derive(Clone, Debug, Default)]
pub enum RawValue {
    #[default]
    Void,
    /// Integers, booleans, enum discriminants.
    Word(u64),
    Float(f64),
    Ptr(NativePtr),
    /// Tagged envelope: panic-propagating returns (`{ok, value}`) and task
    /// polls (`{ready, payload}`).
    Envelope { tag: u8, payload: NativePtr },
    /// Three-pointer descriptor returned by asynchronous methods.
    Task(TaskDescriptor),
}

impl RawValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Void => "void",
            RawValue::Word(_) => "word",
            RawValue::Float(_) => "float",
            RawValue::Ptr(_) => "ptr",
            RawValue::Envelope { .. } => "envelope",
            RawValue::Task(_) => "task",
        }
    }

    pub fn word(&self) -> Option<u64> {
        match self {
            RawValue::Word(w) => Some(*w),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<f64> {
        match self {
            RawValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn ptr(&self) -> Option<NativePtr> {
        match self {
            RawValue::Ptr(p) => Some(*p),
            _ => None,
        }
    }
}

/// Argument and return slots for one foreign call.
///
/// Slot 0 is the receiver for non-static methods; the binder prepends it when
/// deriving call signatures, so entry points can index arguments uniformly.
pub struct CallFrame {
    slots: Vec<RawValue>,
    ret: RawValue,
}

impl CallFrame {
    pub fn new(slots: Vec<RawValue>) -> Self {
        Self {
            slots,
            ret: RawValue::Void,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.slots.len()
    }

    pub fn arg(&self, index: usize) -> Result<&RawValue, CallError> {
        self.slots
            .get(index)
            .ok_or(CallError::ArgumentIndexOutOfBounds {
                index,
                count: self.slots.len(),
            })
    }

    pub fn word(&self, index: usize) -> Result<u64, CallError> {
        let slot = self.arg(index)?;
        slot.word().ok_or(CallError::SlotMismatch {
            index,
            expected: "word",
            found: slot.kind_name(),
        })
    }

    pub fn float(&self, index: usize) -> Result<f64, CallError> {
        let slot = self.arg(index)?;
        slot.float().ok_or(CallError::SlotMismatch {
            index,
            expected: "float",
            found: slot.kind_name(),
        })
    }

    pub fn ptr(&self, index: usize) -> Result<NativePtr, CallError> {
        let slot = self.arg(index)?;
        slot.ptr().ok_or(CallError::SlotMismatch {
            index,
            expected: "ptr",
            found: slot.kind_name(),
        })
    }

    pub fn set_return(&mut self, value: RawValue) {
        self.ret = value;
    }

    pub fn return_value(&self) -> &RawValue {
        &self.ret
    }

    pub fn into_return(self) -> RawValue {
        self.ret
    }
}

/// Copy a NUL-terminated UTF-8 string out of foreign memory.
///
/// The buffer stays owned by the foreign side; callers release it through
/// the shared string-deallocation entry point afterwards.
pub fn read_cstring(ptr: NativePtr) -> Result<String, CallError> {
    if ptr.is_null() {
        return Err(CallError::Message(
            "null string pointer from foreign call".to_string(),
        ));
    }
    let text = unsafe { CStr::from_ptr(ptr.as_ptr().cast()) };
    text.to_str()
        .map(str::to_owned)
        .map_err(|e| CallError::Message(format!("foreign string is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_slot_access() {
        let frame = CallFrame::new(vec![
            RawValue::Word(7),
            RawValue::Float(1.5),
            RawValue::Ptr(NativePtr::null()),
        ]);
        assert_eq!(frame.word(0).unwrap(), 7);
        assert_eq!(frame.float(1).unwrap(), 1.5);
        assert!(frame.ptr(2).unwrap().is_null());
    }

    #[test]
    fn mismatched_slot_reports_kinds() {
        let frame = CallFrame::new(vec![RawValue::Float(0.0)]);
        match frame.word(0) {
            Err(CallError::SlotMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "word");
                assert_eq!(found, "float");
            }
            other => panic!("expected slot mismatch, got {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_argument() {
        let frame = CallFrame::new(Vec::new());
        assert!(matches!(
            frame.arg(0),
            Err(CallError::ArgumentIndexOutOfBounds { index: 0, count: 0 })
        ));
    }

    #[test]
    fn cstring_round_trip() {
        let text = std::ffi::CString::new("geo::Point").unwrap();
        let ptr = NativePtr::from_const(text.as_ptr().cast());
        assert_eq!(read_cstring(ptr).unwrap(), "geo::Point");
    }

    #[test]
    fn null_cstring_is_an_error() {
        assert!(read_cstring(NativePtr::null()).is_err());
    }
}
