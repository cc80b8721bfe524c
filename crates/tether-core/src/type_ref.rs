//! Type references as they appear in the IR.
//!
//! [`TypeRef`] is a closed, recursively nestable union covering everything
//! the binding generator models: primitive numerics, strings, raw pointers,
//! object references with an ownership mode, optionals, results, homogeneous
//! collections, and asynchronous values.
//!
//! Object references carry their type as a textual signature; the reference
//! resolver rewrites short names to canonical ones in place before any
//! binding plan is computed.

use std::fmt;
use std::mem::size_of;

/// Primitive numeric and boolean types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Primitive {
    /// The host's natural representation size in bytes.
    pub fn natural_size(&self) -> usize {
        match self {
            Primitive::Bool | Primitive::I8 | Primitive::U8 => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }
}

/// How an object reference relates to the referenced native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    /// The holder owns the resource and is responsible for destroying it.
    #[default]
    Owned,
    /// A shared, read-only view; validity is derivative of the owner.
    Borrowed,
    /// An exclusive, mutable view; validity is derivative of the owner.
    MutBorrowed,
    /// Heap-indirected ownership transfer (the field stores a pointer).
    Boxed,
}

impl Ownership {
    /// Whether a field of this ownership stores a pointer rather than the
    /// value inline.
    pub fn is_indirect(&self) -> bool {
        !matches!(self, Ownership::Owned)
    }

    /// Whether passing an argument with this ownership consumes it.
    pub fn consumes(&self) -> bool {
        matches!(self, Ownership::Owned | Ownership::Boxed)
    }
}

/// Accessor family for fields that need dedicated foreign entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    String,
    Optional,
    Result,
}

impl AccessorKind {
    /// Suffix used in derived accessor symbol names.
    pub fn suffix(&self) -> &'static str {
        match self {
            AccessorKind::String => "string",
            AccessorKind::Optional => "optional",
            AccessorKind::Result => "result",
        }
    }
}

/// A reference to a type, as written in the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    Str,
    RawPtr,
    Object {
        /// Canonical signature after resolution; possibly a short name before.
        signature: String,
        ownership: Ownership,
    },
    Optional(Box<TypeRef>),
    ResultOf {
        ok: Box<TypeRef>,
        err: Box<TypeRef>,
    },
    List(Box<TypeRef>),
    Map {
        key: Box<TypeRef>,
        value: Box<TypeRef>,
    },
    Async(Box<TypeRef>),
}

impl TypeRef {
    pub fn object(signature: impl Into<String>, ownership: Ownership) -> Self {
        TypeRef::Object {
            signature: signature.into(),
            ownership,
        }
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn result_of(ok: TypeRef, err: TypeRef) -> Self {
        TypeRef::ResultOf {
            ok: Box::new(ok),
            err: Box::new(err),
        }
    }

    pub fn list(item: TypeRef) -> Self {
        TypeRef::List(Box::new(item))
    }

    pub fn asynchronous(inner: TypeRef) -> Self {
        TypeRef::Async(Box::new(inner))
    }

    /// The host's natural representation size in bytes, when known.
    ///
    /// Owned object fields live inline at foreign-determined size, so their
    /// natural size is unknown and the layout report is taken as-is.
    pub fn natural_size(&self) -> Option<usize> {
        match self {
            TypeRef::Primitive(p) => Some(p.natural_size()),
            TypeRef::Object {
                ownership: Ownership::Owned,
                ..
            } => None,
            // Strings, raw pointers, indirect objects, and container handles
            // all cross the boundary as a single pointer.
            TypeRef::Str
            | TypeRef::RawPtr
            | TypeRef::Object { .. }
            | TypeRef::Optional(_)
            | TypeRef::ResultOf { .. }
            | TypeRef::List(_)
            | TypeRef::Map { .. }
            | TypeRef::Async(_) => Some(size_of::<usize>()),
        }
    }

    /// Accessor family if this type needs dedicated get/set entry points.
    ///
    /// Plain scalar and object fields are accessed through the resolved
    /// layout directly and return `None`.
    pub fn accessor_kind(&self) -> Option<AccessorKind> {
        match self {
            TypeRef::Str => Some(AccessorKind::String),
            TypeRef::Optional(_) => Some(AccessorKind::Optional),
            TypeRef::ResultOf { .. } => Some(AccessorKind::Result),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<(&str, Ownership)> {
        match self {
            TypeRef::Object {
                signature,
                ownership,
            } => Some((signature.as_str(), *ownership)),
            _ => None,
        }
    }

    /// Visit every object signature in this reference, recursively, with
    /// mutable access. Used by the resolver to canonicalize names in place.
    pub fn for_each_object_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        match self {
            TypeRef::Object { signature, .. } => f(signature),
            TypeRef::Optional(inner) | TypeRef::List(inner) | TypeRef::Async(inner) => {
                inner.for_each_object_mut(f)
            }
            TypeRef::ResultOf { ok, err } => {
                ok.for_each_object_mut(f);
                err.for_each_object_mut(f);
            }
            TypeRef::Map { key, value } => {
                key.for_each_object_mut(f);
                value.for_each_object_mut(f);
            }
            TypeRef::Primitive(_) | TypeRef::Str | TypeRef::RawPtr => {}
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p.name()),
            TypeRef::Str => write!(f, "string"),
            TypeRef::RawPtr => write!(f, "rawptr"),
            TypeRef::Object {
                signature,
                ownership,
            } => match ownership {
                Ownership::Owned => write!(f, "{signature}"),
                Ownership::Borrowed => write!(f, "&{signature}"),
                Ownership::MutBorrowed => write!(f, "&mut {signature}"),
                Ownership::Boxed => write!(f, "box {signature}"),
            },
            TypeRef::Optional(inner) => write!(f, "optional<{inner}>"),
            TypeRef::ResultOf { ok, err } => write!(f, "result<{ok}, {err}>"),
            TypeRef::List(item) => write!(f, "list<{item}>"),
            TypeRef::Map { key, value } => write!(f, "map<{key}, {value}>"),
            TypeRef::Async(inner) => write!(f, "async<{inner}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_sizes() {
        assert_eq!(TypeRef::Primitive(Primitive::Bool).natural_size(), Some(1));
        assert_eq!(TypeRef::Primitive(Primitive::F64).natural_size(), Some(8));
        assert_eq!(TypeRef::Str.natural_size(), Some(size_of::<usize>()));
        assert_eq!(
            TypeRef::object("geo::Point", Ownership::Owned).natural_size(),
            None
        );
        assert_eq!(
            TypeRef::object("geo::Point", Ownership::Boxed).natural_size(),
            Some(size_of::<usize>())
        );
    }

    #[test]
    fn accessor_kinds() {
        assert_eq!(TypeRef::Str.accessor_kind(), Some(AccessorKind::String));
        assert_eq!(
            TypeRef::optional(TypeRef::Primitive(Primitive::I32)).accessor_kind(),
            Some(AccessorKind::Optional)
        );
        assert_eq!(TypeRef::Primitive(Primitive::I32).accessor_kind(), None);
        assert_eq!(
            TypeRef::object("geo::Point", Ownership::Owned).accessor_kind(),
            None
        );
    }

    #[test]
    fn recursive_object_walk() {
        let mut ty = TypeRef::result_of(
            TypeRef::list(TypeRef::object("Point", Ownership::Owned)),
            TypeRef::object("Error", Ownership::Boxed),
        );
        let mut seen = Vec::new();
        ty.for_each_object_mut(&mut |sig| {
            seen.push(sig.clone());
            sig.insert_str(0, "geo::");
        });
        assert_eq!(seen, vec!["Point".to_string(), "Error".to_string()]);
        let mut rewritten = Vec::new();
        ty.for_each_object_mut(&mut |sig| rewritten.push(sig.clone()));
        assert_eq!(
            rewritten,
            vec!["geo::Point".to_string(), "geo::Error".to_string()]
        );
    }

    #[test]
    fn display_forms() {
        let ty = TypeRef::optional(TypeRef::object("geo::Point", Ownership::Borrowed));
        assert_eq!(ty.to_string(), "optional<&geo::Point>");
    }
}
