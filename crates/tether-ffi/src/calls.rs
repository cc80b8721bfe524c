//! Call-signature derivation.
//!
//! A method's foreign call signature is fully determined by its IR record:
//! the receiver slot, one raw slot per argument, and a return encoding that
//! depends on the declared return type and call mode. Once derived it is
//! cached with the entity's handles for the process lifetime.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use tether_core::{CallMode, Method, MethodKind, TypeRef};

bitflags! {
    /// Calling-convention hints attached to a bound handle.
    ///
    /// Hints do not change the call path; they are carried through to the
    /// emitter so generated code can pick the matching foreign calling mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallConvention: u8 {
        /// Fast/critical call that skips host runtime bookkeeping.
        const CRITICAL = 1;
        /// Critical call that may still touch the managed heap.
        const ALLOWS_HEAP = 1 << 1;
        /// Return is wrapped in an `{ok, value}` envelope.
        const PANIC_PROPAGATING = 1 << 2;
    }
}

impl CallConvention {
    pub fn from_mode(mode: CallMode) -> Self {
        match mode {
            CallMode::Normal => CallConvention::empty(),
            CallMode::Critical { allows_heap_access } => {
                let mut flags = CallConvention::CRITICAL;
                if allows_heap_access {
                    flags |= CallConvention::ALLOWS_HEAP;
                }
                flags
            }
            CallMode::PanicPropagating => CallConvention::PANIC_PROPAGATING,
        }
    }
}

/// Tag byte of a panic-propagating `{ok, value}` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum EnvelopeTag {
    /// `value` points at the foreign-supplied error message.
    Err = 0,
    /// `value` points at (or is) the true return value.
    Ok = 1,
}

/// Which machine slot a value occupies when crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Word,
    Float,
    Ptr,
}

impl SlotKind {
    pub fn of(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Primitive(p) if p.is_float() => SlotKind::Float,
            TypeRef::Primitive(_) => SlotKind::Word,
            _ => SlotKind::Ptr,
        }
    }
}

/// How a method's return value is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnEncoding {
    /// Void: no return slot.
    None,
    /// The declared return value in one raw slot.
    Scalar(SlotKind),
    /// Panic-propagating: a tagged `{ok: byte, value: pointer}` envelope
    /// around the declared encoding.
    Envelope(Box<ReturnEncoding>),
    /// Asynchronous: a `{taskHandle, pollEntryPoint, dropEntryPoint}`
    /// descriptor instead of the declared return type.
    Task,
}

/// The complete derived call signature of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSignature {
    /// One slot per argument; non-static methods get a leading pointer-sized
    /// receiver slot.
    pub args: Vec<SlotKind>,
    pub ret: ReturnEncoding,
    pub convention: CallConvention,
}

impl CallSignature {
    /// Derive the signature for a method record.
    ///
    /// Async wrapping wins over the panic envelope: an async method's
    /// failures arrive through the task's error payload instead.
    pub fn derive(method: &Method) -> Self {
        let mut args = Vec::with_capacity(method.args.len() + 1);
        if method.kind != MethodKind::Static {
            args.push(SlotKind::Ptr);
        }
        args.extend(method.args.iter().map(|arg| SlotKind::of(&arg.ty)));

        let declared = match &method.ret {
            None => ReturnEncoding::None,
            Some(ty) => ReturnEncoding::Scalar(SlotKind::of(ty)),
        };
        let ret = if method.is_async {
            ReturnEncoding::Task
        } else if method.call_mode == CallMode::PanicPropagating {
            ReturnEncoding::Envelope(Box::new(declared))
        } else {
            declared
        };

        Self {
            args,
            ret,
            convention: CallConvention::from_mode(method.call_mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{Field, Ownership, Primitive};

    fn method(kind: MethodKind) -> Method {
        let mut m = Method::new("scale", "geo_point_scale", kind);
        m.args = vec![Field::new("factor", TypeRef::Primitive(Primitive::F64))];
        m.ret = Some(TypeRef::Primitive(Primitive::F64));
        m
    }

    #[test]
    fn static_methods_omit_the_receiver_slot() {
        let sig = CallSignature::derive(&method(MethodKind::Static));
        assert_eq!(sig.args, vec![SlotKind::Float]);
    }

    #[test]
    fn instance_methods_prepend_a_pointer_receiver() {
        let sig = CallSignature::derive(&method(MethodKind::ByConstRef));
        assert_eq!(sig.args, vec![SlotKind::Ptr, SlotKind::Float]);
        assert_eq!(sig.ret, ReturnEncoding::Scalar(SlotKind::Float));
    }

    #[test]
    fn panic_propagation_wraps_the_return() {
        let mut m = method(MethodKind::ByConstRef);
        m.call_mode = CallMode::PanicPropagating;
        let sig = CallSignature::derive(&m);
        assert_eq!(
            sig.ret,
            ReturnEncoding::Envelope(Box::new(ReturnEncoding::Scalar(SlotKind::Float)))
        );
        assert!(sig.convention.contains(CallConvention::PANIC_PROPAGATING));
    }

    #[test]
    fn async_returns_a_task_descriptor() {
        let mut m = method(MethodKind::ByConstRef);
        m.is_async = true;
        m.call_mode = CallMode::PanicPropagating;
        let sig = CallSignature::derive(&m);
        assert_eq!(sig.ret, ReturnEncoding::Task);
    }

    #[test]
    fn object_arguments_are_pointer_slots() {
        let mut m = Method::new("attach", "ui_win_attach", MethodKind::ByMutRef);
        m.args = vec![Field::new(
            "child",
            TypeRef::object("ui::Widget", Ownership::Owned),
        )];
        let sig = CallSignature::derive(&m);
        assert_eq!(sig.args, vec![SlotKind::Ptr, SlotKind::Ptr]);
        assert_eq!(sig.ret, ReturnEncoding::None);
    }

    #[test]
    fn critical_modes_become_convention_hints() {
        let mut m = method(MethodKind::ByConstRef);
        m.call_mode = CallMode::Critical {
            allows_heap_access: true,
        };
        let sig = CallSignature::derive(&m);
        assert!(sig.convention.contains(CallConvention::CRITICAL));
        assert!(sig.convention.contains(CallConvention::ALLOWS_HEAP));
    }
}
