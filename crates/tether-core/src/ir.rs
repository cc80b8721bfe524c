//! The IR data model: entity definitions as loaded from IR documents.
//!
//! Definitions are loaded once at generation/bind time and are immutable
//! thereafter (the single mutation pass is reference canonicalization, which
//! happens before anything else looks at them). Serialization and parsing of
//! the IR itself are out of scope; documents are constructed programmatically.

use crate::entity_hash::EntityHash;
use crate::signature::Signature;
use crate::type_ref::TypeRef;

/// What kind of foreign entity a definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Struct,
    Enum,
    OpaqueHandle,
    FreeFunction,
}

impl EntityKind {
    /// Concrete entities have instances, and therefore a lifecycle and a
    /// layout. Free functions have neither.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, EntityKind::FreeFunction)
    }
}

/// Declared thread-safety class of a field or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadSafety {
    /// The caller or the foreign side guarantees safety; no host lock.
    Unsafe,
    /// Per-instance read/write lock with optimistic reads.
    #[default]
    Locked,
    /// Hardware compare-and-swap retry loop on the single field cell.
    Atomic,
    /// Reads are lock-free; writes serialize behind a fairness-ordered lock.
    Immutable,
}

/// The locking move a single access requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDiscipline {
    /// No host-side lock.
    None,
    /// Compare-and-swap retry loop on the field cell.
    AtomicCas,
    /// Fairness-ordered exclusive lock (writers served in arrival order).
    FairWrite,
    /// Unsynchronized read validated against the write sequence, retried
    /// under the full read lock if a concurrent writer was detected.
    OptimisticRead,
    /// Read side of the per-instance read/write lock.
    ReadLock,
    /// Write side of the per-instance read/write lock.
    WriteLock,
}

impl ThreadSafety {
    /// Discipline applied to field reads of this class.
    pub fn read_discipline(&self) -> LockDiscipline {
        match self {
            ThreadSafety::Unsafe | ThreadSafety::Atomic | ThreadSafety::Immutable => {
                LockDiscipline::None
            }
            ThreadSafety::Locked => LockDiscipline::OptimisticRead,
        }
    }

    /// Discipline applied to field writes of this class.
    pub fn write_discipline(&self) -> LockDiscipline {
        match self {
            ThreadSafety::Unsafe => LockDiscipline::None,
            ThreadSafety::Atomic => LockDiscipline::AtomicCas,
            ThreadSafety::Immutable => LockDiscipline::FairWrite,
            ThreadSafety::Locked => LockDiscipline::WriteLock,
        }
    }

    /// Discipline applied when calling a method of this class on its receiver.
    pub fn method_discipline(&self, kind: MethodKind) -> LockDiscipline {
        if kind == MethodKind::Static {
            return LockDiscipline::None;
        }
        match self {
            ThreadSafety::Unsafe | ThreadSafety::Atomic => LockDiscipline::None,
            ThreadSafety::Immutable => match kind {
                MethodKind::ByConstRef => LockDiscipline::None,
                _ => LockDiscipline::FairWrite,
            },
            ThreadSafety::Locked => match kind {
                MethodKind::ByConstRef => LockDiscipline::ReadLock,
                _ => LockDiscipline::WriteLock,
            },
        }
    }
}

/// How a method takes its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Static,
    ByConstRef,
    ByMutRef,
    /// Consumes the receiver; the foreign side takes ownership.
    Consuming,
}

/// Calling-convention mode declared on a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallMode {
    #[default]
    Normal,
    /// Fast path that may skip runtime bookkeeping on the host side.
    Critical { allows_heap_access: bool },
    /// The foreign side wraps the return in an `{ok, value}` envelope so
    /// panics propagate as host errors.
    PanicPropagating,
}

/// A field (or argument) entry: name, declared type, thread-safety class.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub thread_safety: ThreadSafety,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            thread_safety: ThreadSafety::default(),
        }
    }

    pub fn with_safety(name: impl Into<String>, ty: TypeRef, thread_safety: ThreadSafety) -> Self {
        Self {
            name: name.into(),
            ty,
            thread_safety,
        }
    }
}

/// A method entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    /// Foreign symbol this method binds to.
    pub symbol: String,
    pub kind: MethodKind,
    pub call_mode: CallMode,
    pub is_constructor: bool,
    pub is_async: bool,
    /// Ordered arguments (argument entries reuse the field shape).
    pub args: Vec<Field>,
    /// Declared return type; `None` is void.
    pub ret: Option<TypeRef>,
    pub thread_safety: ThreadSafety,
}

impl Method {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            kind,
            call_mode: CallMode::default(),
            is_constructor: false,
            is_async: false,
            args: Vec::new(),
            ret: None,
            thread_safety: ThreadSafety::default(),
        }
    }
}

/// One variant of an enum entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    /// Payload fields; empty for C-like variants.
    pub fields: Vec<Field>,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// One entity definition from an IR document.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub kind: EntityKind,
    /// Canonical signature (`package::Name`).
    pub signature: Signature,
    /// Prefix of every derived foreign symbol for this entity.
    pub symbol_prefix: String,
    /// Declaring package name.
    pub package: String,
    /// Simple name.
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// Enum entities only.
    pub variants: Vec<Variant>,
    /// Value copy semantics (structs and enums).
    pub is_copy: bool,
    /// Opaque handles only: the foreign side exposes a duplicate entry point.
    pub is_clonable: bool,
    pub docs: Vec<String>,
}

impl TypeDefinition {
    pub fn new(
        kind: EntityKind,
        package: impl Into<String>,
        name: impl Into<String>,
        symbol_prefix: impl Into<String>,
    ) -> Self {
        let package = package.into();
        let name = name.into();
        let signature = if package.is_empty() {
            Signature::global(name.clone())
        } else {
            Signature::new(name.clone(), vec![package.clone()])
        };
        Self {
            kind,
            signature,
            symbol_prefix: symbol_prefix.into(),
            package,
            name,
            fields: Vec::new(),
            methods: Vec::new(),
            variants: Vec::new(),
            is_copy: false,
            is_clonable: false,
            docs: Vec::new(),
        }
    }

    pub fn entity_hash(&self) -> EntityHash {
        self.signature.entity_hash()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.is_constructor)
    }

    /// Whether any variant carries payload fields.
    pub fn has_payload_variants(&self) -> bool {
        self.variants.iter().any(|v| !v.fields.is_empty())
    }

    /// Whether the foreign side exposes a duplicate entry point.
    pub fn is_copyable(&self) -> bool {
        match self.kind {
            EntityKind::Struct | EntityKind::Enum => self.is_copy,
            EntityKind::OpaqueHandle => self.is_clonable,
            EntityKind::FreeFunction => false,
        }
    }
}

/// One IR document: the entities declared by a single package.
#[derive(Debug, Clone, Default)]
pub struct IrDocument {
    pub package: String,
    pub entities: Vec<TypeDefinition>,
}

impl IrDocument {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entities(package: impl Into<String>, entities: Vec<TypeDefinition>) -> Self {
        Self {
            package: package.into(),
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_ref::Primitive;

    #[test]
    fn signature_is_derived_from_package_and_name() {
        let def = TypeDefinition::new(EntityKind::Struct, "geo", "Point", "geo_point");
        assert_eq!(def.signature.to_string(), "geo::Point");
        assert!(def.kind.is_concrete());
    }

    #[test]
    fn default_thread_safety_is_locked() {
        let field = Field::new("x", TypeRef::Primitive(Primitive::F64));
        assert_eq!(field.thread_safety, ThreadSafety::Locked);
        assert_eq!(
            field.thread_safety.read_discipline(),
            LockDiscipline::OptimisticRead
        );
        assert_eq!(
            field.thread_safety.write_discipline(),
            LockDiscipline::WriteLock
        );
    }

    #[test]
    fn disciplines_per_class() {
        assert_eq!(
            ThreadSafety::Atomic.write_discipline(),
            LockDiscipline::AtomicCas
        );
        assert_eq!(ThreadSafety::Atomic.read_discipline(), LockDiscipline::None);
        assert_eq!(
            ThreadSafety::Immutable.write_discipline(),
            LockDiscipline::FairWrite
        );
        assert_eq!(
            ThreadSafety::Immutable.read_discipline(),
            LockDiscipline::None
        );
        assert_eq!(ThreadSafety::Unsafe.write_discipline(), LockDiscipline::None);
    }

    #[test]
    fn copyable_depends_on_kind() {
        let mut s = TypeDefinition::new(EntityKind::Struct, "geo", "Point", "geo_point");
        s.is_copy = true;
        assert!(s.is_copyable());

        let mut o = TypeDefinition::new(EntityKind::OpaqueHandle, "io", "File", "io_file");
        assert!(!o.is_copyable());
        o.is_clonable = true;
        assert!(o.is_copyable());
    }
}
