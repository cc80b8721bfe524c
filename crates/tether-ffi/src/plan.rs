//! Binding plans: the core's contract with the emitter.
//!
//! A [`BindingPlan`] is a plain-data snapshot of everything resolution
//! derived for one entity: the entry-point symbols it will bind, the call
//! signature of every method, and the lock discipline of every member.
//! Layout is deliberately absent: generated code probes it lazily at first
//! use, through the planned layout symbol.

use tether_core::{
    AccessorKind, EntityHash, EntityKind, LockDiscipline, Signature, TypeDefinition,
};

use crate::calls::CallSignature;
use crate::handle::{LifecycleOp, STRING_FREE_SYMBOL, lifecycle_symbol, property_symbol};

/// Planned lifecycle symbols of a concrete entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLifecycle {
    pub construct: String,
    pub destroy: String,
    pub duplicate: Option<String>,
    pub borrow: String,
    pub borrow_mut: String,
    pub layout_probe: String,
}

/// Planned accessor pair for a string/optional/result field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAccessor {
    pub field: String,
    pub kind: AccessorKind,
    pub get_symbol: String,
    pub set_symbol: String,
}

/// Planned entry point and derived signature for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMethod {
    pub name: String,
    pub symbol: String,
    pub signature: CallSignature,
    pub is_constructor: bool,
    pub is_async: bool,
    /// Receiver lock required at the call site.
    pub self_lock: LockDiscipline,
}

/// Lock disciplines of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLockPlan {
    pub member: String,
    pub read: LockDiscipline,
    pub write: LockDiscipline,
}

/// The fully resolved plan for one entity, ready for emission.
#[derive(Debug, Clone)]
pub struct BindingPlan {
    pub signature: Signature,
    pub hash: EntityHash,
    pub kind: EntityKind,
    pub symbol_prefix: String,
    pub string_free_symbol: String,
    pub lifecycle: Option<PlannedLifecycle>,
    pub accessors: Vec<PlannedAccessor>,
    pub methods: Vec<PlannedMethod>,
    pub locks: Vec<MemberLockPlan>,
}

impl BindingPlan {
    /// Compute the plan for an entity whose references are already canonical.
    pub fn for_entity(def: &TypeDefinition) -> Self {
        let prefix = def.symbol_prefix.as_str();

        let lifecycle = def.kind.is_concrete().then(|| PlannedLifecycle {
            construct: lifecycle_symbol(prefix, LifecycleOp::Construct),
            destroy: lifecycle_symbol(prefix, LifecycleOp::Destroy),
            duplicate: def
                .is_copyable()
                .then(|| lifecycle_symbol(prefix, LifecycleOp::Duplicate)),
            borrow: lifecycle_symbol(prefix, LifecycleOp::Borrow),
            borrow_mut: lifecycle_symbol(prefix, LifecycleOp::BorrowMut),
            layout_probe: lifecycle_symbol(prefix, LifecycleOp::Layout),
        });

        let accessors = def
            .fields
            .iter()
            .filter_map(|field| {
                field.ty.accessor_kind().map(|kind| PlannedAccessor {
                    field: field.name.clone(),
                    kind,
                    get_symbol: property_symbol(prefix, &field.name, kind, true),
                    set_symbol: property_symbol(prefix, &field.name, kind, false),
                })
            })
            .collect();

        let methods = def
            .methods
            .iter()
            .map(|m| PlannedMethod {
                name: m.name.clone(),
                symbol: m.symbol.clone(),
                signature: CallSignature::derive(m),
                is_constructor: m.is_constructor,
                is_async: m.is_async,
                self_lock: m.thread_safety.method_discipline(m.kind),
            })
            .collect();

        let locks = def
            .fields
            .iter()
            .map(|f| MemberLockPlan {
                member: f.name.clone(),
                read: f.thread_safety.read_discipline(),
                write: f.thread_safety.write_discipline(),
            })
            .collect();

        Self {
            signature: def.signature.clone(),
            hash: def.entity_hash(),
            kind: def.kind,
            symbol_prefix: def.symbol_prefix.clone(),
            string_free_symbol: STRING_FREE_SYMBOL.to_string(),
            lifecycle,
            accessors,
            methods,
            locks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{
        EntityKind, Field, Method, MethodKind, Primitive, ThreadSafety, TypeRef,
    };

    #[test]
    fn plan_covers_lifecycle_accessors_methods_and_locks() {
        let mut def = TypeDefinition::new(EntityKind::Struct, "geo", "Point", "geo_point");
        def.is_copy = true;
        def.fields = vec![
            Field::with_safety("x", TypeRef::Primitive(Primitive::F64), ThreadSafety::Atomic),
            Field::new("label", TypeRef::Str),
        ];
        let mut norm = Method::new("norm", "geo_point_norm", MethodKind::ByConstRef);
        norm.ret = Some(TypeRef::Primitive(Primitive::F64));
        def.methods = vec![norm];

        let plan = BindingPlan::for_entity(&def);
        let lifecycle = plan.lifecycle.as_ref().unwrap();
        assert_eq!(lifecycle.construct, "geo_point_new");
        assert_eq!(lifecycle.duplicate.as_deref(), Some("geo_point_clone"));

        assert_eq!(plan.accessors.len(), 1);
        assert_eq!(
            plan.accessors[0].get_symbol,
            "geo_point_property_label_string_get"
        );

        assert_eq!(plan.methods[0].self_lock, LockDiscipline::ReadLock);
        assert_eq!(plan.locks[0].write, LockDiscipline::AtomicCas);
        assert_eq!(plan.locks[1].read, LockDiscipline::OptimisticRead);
    }

    #[test]
    fn free_function_plan_has_no_lifecycle() {
        let mut def = TypeDefinition::new(EntityKind::FreeFunction, "geo", "version", "geo");
        def.methods = vec![Method::new("version", "geo_version", MethodKind::Static)];
        let plan = BindingPlan::for_entity(&def);
        assert!(plan.lifecycle.is_none());
        assert_eq!(plan.methods[0].self_lock, LockDiscipline::None);
    }
}
