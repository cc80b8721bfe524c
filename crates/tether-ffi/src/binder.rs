//! Per-entity handle binding.
//!
//! For every entity the binder computes the fixed set of callable foreign
//! entry points exactly once, under a single-initialization barrier that is
//! safe against concurrent first use. The result (or the resolution failure)
//! is cached for the process lifetime: resolution errors indicate a fixed
//! mismatch between the IR and the foreign library and are never retried.
//!
//! Layout resolution hangs off the same barrier mechanism but runs lazily,
//! the first time an instance of the entity is needed.

use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;

use tether_core::{
    AccessorKind, EntityHash, EntityLayout, FieldLayout, IrDocument, ResolveError, TypeDefinition,
};

use crate::calls::{CallConvention, CallSignature};
use crate::foreign::ForeignLibrary;
use crate::handle::{Handle, LifecycleOp, STRING_FREE_SYMBOL, lifecycle_symbol, property_symbol};
use crate::layout::probe_layout;

/// Bound lifecycle entry points of a concrete entity.
#[derive(Debug, Clone)]
pub struct LifecycleHandles {
    pub construct: Handle,
    pub destroy: Handle,
    /// Present only for copyable structs/enums and clonable opaque handles.
    pub duplicate: Option<Handle>,
    pub borrow: Handle,
    pub borrow_mut: Handle,
    /// The "describe layout" probe.
    pub layout_probe: Handle,
}

/// Bound get/set pair for a string/optional/result field.
#[derive(Debug, Clone)]
pub struct AccessorHandles {
    pub field: String,
    pub kind: AccessorKind,
    pub get: Handle,
    pub set: Handle,
}

/// Bound entry point plus derived call signature for one method.
#[derive(Debug, Clone)]
pub struct MethodHandles {
    pub name: String,
    pub handle: Handle,
    pub signature: CallSignature,
}

/// The complete entry-point set of one entity.
#[derive(Debug, Clone)]
pub struct EntityHandles {
    /// Process-wide string deallocator (resolved per entity, shared symbol).
    pub string_free: Handle,
    /// `None` for free-function entities.
    pub lifecycle: Option<LifecycleHandles>,
    pub accessors: Vec<AccessorHandles>,
    pub methods: Vec<MethodHandles>,
}

impl EntityHandles {
    pub fn method(&self, name: &str) -> Option<&MethodHandles> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn accessor(&self, field: &str) -> Option<&AccessorHandles> {
        self.accessors.iter().find(|a| a.field == field)
    }

    pub fn lifecycle(&self) -> Option<&LifecycleHandles> {
        self.lifecycle.as_ref()
    }
}

/// An entity definition plus its once-only bound state.
///
/// Both barriers cache failures: after the first failed resolution every
/// later caller observes the same [`ResolveError`] without re-probing.
pub struct BoundEntity {
    def: Arc<TypeDefinition>,
    hash: EntityHash,
    handles: OnceLock<Result<Arc<EntityHandles>, ResolveError>>,
    layout: OnceLock<Result<Arc<EntityLayout>, ResolveError>>,
}

impl BoundEntity {
    pub fn new(def: TypeDefinition) -> Self {
        let hash = def.entity_hash();
        Self {
            def: Arc::new(def),
            hash,
            handles: OnceLock::new(),
            layout: OnceLock::new(),
        }
    }

    pub fn definition(&self) -> &TypeDefinition {
        &self.def
    }

    pub fn hash(&self) -> EntityHash {
        self.hash
    }

    /// The entity's bound entry points, resolving them on first use.
    pub fn handles(&self, library: &dyn ForeignLibrary) -> Result<Arc<EntityHandles>, ResolveError> {
        self.handles
            .get_or_init(|| bind_handles(&self.def, library).map(Arc::new))
            .clone()
    }

    /// The entity's resolved layout, probing it on first use.
    ///
    /// No field or method access happens before this has succeeded once.
    pub fn layout(&self, library: &dyn ForeignLibrary) -> Result<Arc<EntityLayout>, ResolveError> {
        self.layout
            .get_or_init(|| {
                if !self.def.kind.is_concrete() {
                    return Ok(Arc::new(EntityLayout {
                        fields: FieldLayout::default(),
                        variants: Vec::new(),
                        total_size: 0,
                    }));
                }
                let handles = self.handles(library)?;
                let lifecycle =
                    handles
                        .lifecycle()
                        .ok_or_else(|| ResolveError::MalformedLayout {
                            entity: self.def.signature.to_string(),
                            detail: "concrete entity bound without lifecycle handles".to_string(),
                        })?;
                probe_layout(&self.def, &lifecycle.layout_probe, &handles.string_free)
                    .map(Arc::new)
            })
            .clone()
    }
}

fn resolve_entry(
    library: &dyn ForeignLibrary,
    symbol: String,
    entity: &str,
    convention: CallConvention,
) -> Result<Handle, ResolveError> {
    match library.entry_point(&symbol) {
        Some(imp) => Ok(Handle::new(symbol, convention, imp)),
        None => Err(ResolveError::MissingEntryPoint {
            symbol,
            entity: entity.to_string(),
        }),
    }
}

fn bind_handles(
    def: &TypeDefinition,
    library: &dyn ForeignLibrary,
) -> Result<EntityHandles, ResolveError> {
    let entity = def.signature.to_string();
    let prefix = def.symbol_prefix.as_str();
    tracing::debug!(entity = %entity, prefix, "binding foreign entry points");

    let none = CallConvention::empty();
    let string_free = resolve_entry(library, STRING_FREE_SYMBOL.to_string(), &entity, none)?;

    let lifecycle = if def.kind.is_concrete() {
        let duplicate = if def.is_copyable() {
            Some(resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::Duplicate),
                &entity,
                none,
            )?)
        } else {
            None
        };
        Some(LifecycleHandles {
            construct: resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::Construct),
                &entity,
                none,
            )?,
            destroy: resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::Destroy),
                &entity,
                none,
            )?,
            duplicate,
            borrow: resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::Borrow),
                &entity,
                none,
            )?,
            borrow_mut: resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::BorrowMut),
                &entity,
                none,
            )?,
            layout_probe: resolve_entry(
                library,
                lifecycle_symbol(prefix, LifecycleOp::Layout),
                &entity,
                none,
            )?,
        })
    } else {
        None
    };

    let mut accessors = Vec::new();
    for field in &def.fields {
        if let Some(kind) = field.ty.accessor_kind() {
            accessors.push(AccessorHandles {
                field: field.name.clone(),
                kind,
                get: resolve_entry(
                    library,
                    property_symbol(prefix, &field.name, kind, true),
                    &entity,
                    none,
                )?,
                set: resolve_entry(
                    library,
                    property_symbol(prefix, &field.name, kind, false),
                    &entity,
                    none,
                )?,
            });
        }
    }

    let mut methods = Vec::with_capacity(def.methods.len());
    for method in &def.methods {
        let signature = CallSignature::derive(method);
        methods.push(MethodHandles {
            name: method.name.clone(),
            handle: resolve_entry(
                library,
                method.symbol.clone(),
                &entity,
                signature.convention,
            )?,
            signature,
        });
    }

    Ok(EntityHandles {
        string_free,
        lifecycle,
        accessors,
        methods,
    })
}

/// Every bound entity of a resolved IR set, keyed by canonical signature.
///
/// Shared by the runtime so derived wrappers can find the [`BoundEntity`] of
/// their field's type.
#[derive(Default)]
pub struct EntityCatalog {
    entities: FxHashMap<String, Arc<BoundEntity>>,
}

impl EntityCatalog {
    pub fn new(documents: &[IrDocument]) -> Self {
        let mut entities = FxHashMap::default();
        for doc in documents {
            for def in &doc.entities {
                entities.insert(
                    def.signature.to_string(),
                    Arc::new(BoundEntity::new(def.clone())),
                );
            }
        }
        Self { entities }
    }

    pub fn get(&self, signature: &str) -> Option<Arc<BoundEntity>> {
        self.entities.get(signature).cloned()
    }

    /// Like [`get`](Self::get), but a missing entity is a resolution error.
    pub fn expect(&self, signature: &str, context: &str) -> Result<Arc<BoundEntity>, ResolveError> {
        self.get(signature).ok_or_else(|| ResolveError::UnresolvedType {
            name: signature.to_string(),
            context: context.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BoundEntity>> {
        self.entities.values()
    }
}
