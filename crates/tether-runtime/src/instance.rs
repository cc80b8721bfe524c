//! Native instances: the runtime core behind every generated wrapper.
//!
//! A [`NativeInstance`] ties together the pieces the ownership runtime
//! manages per instance: the entity's bound handles and resolved layout, the
//! backing [`MemoryRegionScope`], the [`OwnershipFlag`], and the
//! [`InstanceLocks`] kit. Generated bindings hold an `Arc<NativeInstance>`
//! and go through it for every foreign touch.
//!
//! Ownership rules:
//! - exactly one owned instance per independently destroyable resource;
//!   releasing it is atomic, first-caller-wins, and idempotent
//! - `Drop` is the finalization safety net, never the primary release path
//! - derived wrappers (field objects, borrow views) share the owner's flag
//!   as their parent link and never free native memory themselves

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use tether_core::{
    AccessError, BindResult, CallError, CallMode, EntityLayout, Field, ForeignError,
    LockDiscipline, Method, MethodKind, NativePtr, Ownership,
};
use tether_ffi::{
    BoundEntity, EntityCatalog, EntityHandles, EnvelopeTag, ForeignLibrary, RawValue, read_cstring,
};

use crate::bridge::ForeignTask;
use crate::flag::OwnershipFlag;
use crate::guard::{self, InstanceLocks, LockSet, SuspendLockSet, argument_discipline};
use crate::region::MemoryRegionScope;

/// One argument at a generated call site.
#[derive(Clone)]
pub enum CallArg {
    /// A plain raw slot (primitives, strings, pointers).
    Value(RawValue),
    /// A non-static entity; locked and, if its declared ownership consumes,
    /// invalidated by the call.
    Object(Arc<NativeInstance>),
}

/// The runtime state shared by all generated wrappers of one instance.
pub struct NativeInstance {
    entity: Arc<BoundEntity>,
    catalog: Arc<EntityCatalog>,
    library: Arc<dyn ForeignLibrary>,
    handles: Arc<EntityHandles>,
    layout: Arc<EntityLayout>,
    addr: NativePtr,
    flag: Arc<OwnershipFlag>,
    scope: Arc<MemoryRegionScope>,
    locks: Arc<InstanceLocks>,
    owned: bool,
    /// Weak cache of derived field wrappers, keyed by field name.
    children: Mutex<FxHashMap<String, Weak<NativeInstance>>>,
}

impl NativeInstance {
    /// Construct an owned instance through the entity's construct entry point.
    pub fn construct(
        entity: Arc<BoundEntity>,
        catalog: Arc<EntityCatalog>,
        library: Arc<dyn ForeignLibrary>,
        args: Vec<RawValue>,
    ) -> BindResult<Arc<Self>> {
        let handles = entity.handles(&*library)?;
        // Layout resolves before any member access can happen.
        let layout = entity.layout(&*library)?;
        let lifecycle = handles.lifecycle().ok_or_else(|| {
            CallError::Message(format!(
                "{} has no instances to construct",
                entity.definition().signature
            ))
        })?;
        let raw = lifecycle.construct.invoke(args)?;
        Self::adopt_owned(entity, catalog, library, handles.clone(), layout, raw)
    }

    /// Construct an owned instance through a named constructor method.
    ///
    /// Constructor arguments follow the same discipline as method arguments:
    /// objects handed to a constructor are write-locked for the call, and
    /// consumed ones are invalidated afterwards.
    pub fn construct_via(
        entity: Arc<BoundEntity>,
        catalog: Arc<EntityCatalog>,
        library: Arc<dyn ForeignLibrary>,
        constructor: &str,
        args: Vec<CallArg>,
    ) -> BindResult<Arc<Self>> {
        let handles = entity.handles(&*library)?;
        let layout = entity.layout(&*library)?;
        let method = entity
            .definition()
            .method(constructor)
            .filter(|m| m.is_constructor)
            .ok_or_else(|| {
                CallError::Message(format!(
                    "{} has no constructor '{constructor}'",
                    entity.definition().signature
                ))
            })?
            .clone();
        if method.kind != MethodKind::Static {
            return Err(CallError::Message(format!(
                "constructor '{constructor}' must be static"
            ))
            .into());
        }
        let bound = handles.method(&method.name).ok_or_else(|| {
            CallError::Message(format!("constructor '{constructor}' is not bound"))
        })?;
        let (entries, slots) = argument_setup(&method, &args)?;
        let raw = {
            let _held = LockSet::acquire(&entries);
            bound.handle.invoke(slots)?
        };
        consume_arguments(&method, &args);
        Self::adopt_owned(entity, catalog, library, handles.clone(), layout, raw)
    }

    fn adopt_owned(
        entity: Arc<BoundEntity>,
        catalog: Arc<EntityCatalog>,
        library: Arc<dyn ForeignLibrary>,
        handles: Arc<EntityHandles>,
        layout: Arc<EntityLayout>,
        raw: RawValue,
    ) -> BindResult<Arc<Self>> {
        let signature = entity.definition().signature.to_string();
        let addr = raw.ptr().ok_or(CallError::ReturnMismatch {
            expected: "ptr",
            found: raw.kind_name(),
        })?;
        if addr.is_null() {
            return Err(AccessError::NullPointer {
                what: format!("{signature} instance"),
            }
            .into());
        }
        let scope = Arc::new(MemoryRegionScope::adopt(
            signature.clone(),
            addr,
            layout.total_size,
        ));
        tracing::debug!(entity = %signature, addr = addr.addr(), "constructed owned instance");
        Ok(Arc::new(Self {
            entity,
            catalog,
            library,
            handles,
            layout,
            addr,
            flag: OwnershipFlag::root(),
            scope,
            locks: InstanceLocks::new(),
            owned: true,
            children: Mutex::new(FxHashMap::default()),
        }))
    }

    fn derived(self: &Arc<Self>, entity: Arc<BoundEntity>, addr: NativePtr) -> BindResult<Arc<Self>> {
        let handles = entity.handles(&*self.library)?;
        let layout = entity.layout(&*self.library)?;
        Ok(Arc::new(Self {
            entity,
            catalog: Arc::clone(&self.catalog),
            library: Arc::clone(&self.library),
            handles,
            layout,
            addr,
            flag: OwnershipFlag::derived(&self.flag),
            scope: Arc::clone(&self.scope),
            locks: InstanceLocks::new(),
            owned: false,
            children: Mutex::new(FxHashMap::default()),
        }))
    }

    pub fn entity(&self) -> &Arc<BoundEntity> {
        &self.entity
    }

    pub fn address(&self) -> NativePtr {
        self.addr
    }

    pub fn is_valid(&self) -> bool {
        self.flag.is_valid()
    }

    fn ensure_valid(&self) -> Result<(), AccessError> {
        if self.flag.is_valid() {
            Ok(())
        } else {
            Err(AccessError::InvalidHandle {
                entity: self.entity.definition().signature.to_string(),
            })
        }
    }

    /// Explicitly release this instance.
    ///
    /// For the owner, the first caller wins the flag transition, invokes the
    /// destroy entry point exactly once, and closes the region scope; every
    /// later (or concurrent) release observes invalid and no-ops. Releasing
    /// a derived wrapper only invalidates the wrapper itself.
    ///
    /// Releasing an owner does not cancel in-flight foreign tasks touching
    /// it; releasing while such a task's drop entry point has not yet run is
    /// undefined on the foreign side.
    ///
    /// Returns whether this call performed the foreign destroy.
    pub fn release(&self) -> BindResult<bool> {
        if !self.owned {
            self.flag.invalidate();
            return Ok(false);
        }
        if !self.flag.invalidate() {
            return Ok(false);
        }
        let Some(lifecycle) = self.handles.lifecycle() else {
            return Ok(false);
        };
        let result = lifecycle.destroy.invoke(vec![RawValue::Ptr(self.addr)]);
        self.scope.close();
        tracing::debug!(entity = %self.entity.definition().signature, "released instance");
        result?;
        Ok(true)
    }

    /// The foreign side took ownership (consuming method / consumed argument):
    /// invalidate without ever invoking destroy.
    fn consume(&self) {
        if self.flag.invalidate() && self.owned {
            self.scope.close();
        }
    }

    /// Duplicate a copyable instance into a fresh owned instance.
    pub fn duplicate(&self) -> BindResult<Arc<Self>> {
        self.ensure_valid()?;
        let lifecycle = self.handles.lifecycle().ok_or_else(|| {
            CallError::Message(format!(
                "{} has no lifecycle",
                self.entity.definition().signature
            ))
        })?;
        let duplicate = lifecycle.duplicate.as_ref().ok_or_else(|| {
            CallError::Message(format!(
                "{} is not copyable",
                self.entity.definition().signature
            ))
        })?;
        let raw = duplicate.invoke(vec![RawValue::Ptr(self.addr)])?;
        Self::adopt_owned(
            Arc::clone(&self.entity),
            Arc::clone(&self.catalog),
            Arc::clone(&self.library),
            self.handles.clone(),
            self.layout.clone(),
            raw,
        )
    }

    /// A borrowed view through the entity's borrow entry point.
    pub fn borrow_view(self: &Arc<Self>) -> BindResult<Arc<Self>> {
        self.view_through(false)
    }

    /// A mutably-borrowed view through the entity's mutable borrow entry point.
    pub fn borrow_mut_view(self: &Arc<Self>) -> BindResult<Arc<Self>> {
        self.view_through(true)
    }

    fn view_through(self: &Arc<Self>, mutable: bool) -> BindResult<Arc<Self>> {
        self.ensure_valid()?;
        let lifecycle = self.handles.lifecycle().ok_or_else(|| {
            CallError::Message(format!(
                "{} has no lifecycle",
                self.entity.definition().signature
            ))
        })?;
        let handle = if mutable {
            &lifecycle.borrow_mut
        } else {
            &lifecycle.borrow
        };
        let raw = handle.invoke(vec![RawValue::Ptr(self.addr)])?;
        let addr = raw.ptr().ok_or(CallError::ReturnMismatch {
            expected: "ptr",
            found: raw.kind_name(),
        })?;
        if addr.is_null() {
            return Err(AccessError::NullPointer {
                what: format!("borrow of {}", self.entity.definition().signature),
            }
            .into());
        }
        self.derived(Arc::clone(&self.entity), addr)
    }

    fn field_cell(&self, name: &str) -> BindResult<(NativePtr, &Field, usize)> {
        let def = self.entity.definition();
        let field = def.field(name).ok_or_else(|| {
            CallError::Message(format!("no field '{name}' on {}", def.signature))
        })?;
        let (offset, size) = self.layout.field(name).ok_or_else(|| {
            CallError::Message(format!(
                "field '{name}' of {} has no layout segment",
                def.signature
            ))
        })?;
        if !self.scope.is_open() {
            return Err(AccessError::InvalidHandle {
                entity: def.signature.to_string(),
            }
            .into());
        }
        Ok((self.addr.byte_add(offset), field, size))
    }

    /// Read a plain scalar field under its declared discipline.
    pub fn read_field<T: Copy>(&self, name: &str) -> BindResult<T> {
        self.ensure_valid()?;
        let (cell, field, size) = self.field_cell(name)?;
        if std::mem::size_of::<T>() > size {
            return Err(CallError::Message(format!(
                "field '{name}' is {size} bytes, read asks for {}",
                std::mem::size_of::<T>()
            ))
            .into());
        }
        let value = match field.thread_safety.read_discipline() {
            LockDiscipline::None => unsafe { cell.read::<T>() },
            LockDiscipline::OptimisticRead => self.locks.optimistic_read(|| unsafe { cell.read::<T>() }),
            _ => self.locks.read_locked(|| unsafe { cell.read::<T>() }),
        };
        Ok(value)
    }

    /// Write a plain scalar field under its declared discipline.
    pub fn write_field<T: Copy>(&self, name: &str, value: T) -> BindResult<()> {
        self.ensure_valid()?;
        let (cell, field, size) = self.field_cell(name)?;
        if std::mem::size_of::<T>() > size {
            return Err(CallError::Message(format!(
                "field '{name}' is {size} bytes, write brings {}",
                std::mem::size_of::<T>()
            ))
            .into());
        }
        match field.thread_safety.write_discipline() {
            LockDiscipline::None => unsafe { cell.write(value) },
            LockDiscipline::AtomicCas => {
                if std::mem::size_of::<T>() != 8 {
                    return Err(CallError::Message(format!(
                        "atomic field '{name}' requires an 8-byte value"
                    ))
                    .into());
                }
                let bits = unsafe { std::mem::transmute_copy::<T, u64>(&value) };
                guard::atomic_store(cell, bits)?;
            }
            LockDiscipline::FairWrite => self.locks.fair_write(|| unsafe { cell.write(value) }),
            _ => self.locks.write_serialized(|| unsafe { cell.write(value) }),
        }
        Ok(())
    }

    /// Atomic read of an `Atomic`-class field cell.
    pub fn read_atomic_field(&self, name: &str) -> BindResult<u64> {
        self.ensure_valid()?;
        let (cell, _, _) = self.field_cell(name)?;
        Ok(guard::atomic_load(cell)?)
    }

    /// Compare-and-swap update of an `Atomic`-class field cell.
    ///
    /// Concurrent updates serialize into some total order; none is lost.
    pub fn update_atomic_field(&self, name: &str, update: impl Fn(u64) -> u64) -> BindResult<u64> {
        self.ensure_valid()?;
        let (cell, field, _) = self.field_cell(name)?;
        if field.thread_safety.write_discipline() != LockDiscipline::AtomicCas {
            return Err(CallError::Message(format!(
                "field '{name}' is not declared Atomic"
            ))
            .into());
        }
        Ok(guard::atomic_fetch_update(cell, update)?)
    }

    /// Raw accessor get for a string/optional/result field.
    pub fn accessor_get(&self, name: &str) -> BindResult<RawValue> {
        self.ensure_valid()?;
        let accessor = self.handles.accessor(name).ok_or_else(|| {
            CallError::Message(format!(
                "field '{name}' of {} has no accessor pair",
                self.entity.definition().signature
            ))
        })?;
        let field = self
            .entity
            .definition()
            .field(name)
            .ok_or_else(|| CallError::Message(format!("no field '{name}'")))?;
        let args = vec![RawValue::Ptr(self.addr)];
        match field.thread_safety.read_discipline() {
            LockDiscipline::None => Ok(accessor.get.invoke(args)?),
            _ => Ok(self.locks.read_locked(|| accessor.get.invoke(args))?),
        }
    }

    /// Raw accessor set for a string/optional/result field.
    pub fn accessor_set(&self, name: &str, value: RawValue) -> BindResult<()> {
        self.ensure_valid()?;
        let accessor = self.handles.accessor(name).ok_or_else(|| {
            CallError::Message(format!(
                "field '{name}' of {} has no accessor pair",
                self.entity.definition().signature
            ))
        })?;
        let field = self
            .entity
            .definition()
            .field(name)
            .ok_or_else(|| CallError::Message(format!("no field '{name}'")))?;
        let args = vec![RawValue::Ptr(self.addr), value];
        match field.thread_safety.write_discipline() {
            LockDiscipline::None | LockDiscipline::AtomicCas => {
                accessor.set.invoke(args)?;
            }
            LockDiscipline::FairWrite => {
                self.locks.fair_write(|| accessor.set.invoke(args))?;
            }
            _ => {
                self.locks.write_serialized(|| accessor.set.invoke(args))?;
            }
        }
        Ok(())
    }

    /// Read a string field: copy the foreign buffer, then release it through
    /// the shared string-deallocation entry point.
    pub fn read_string_field(&self, name: &str) -> BindResult<String> {
        let raw = self.accessor_get(name)?;
        let ptr = raw.ptr().ok_or(CallError::ReturnMismatch {
            expected: "ptr",
            found: raw.kind_name(),
        })?;
        if ptr.is_null() {
            return Err(AccessError::NullPointer {
                what: format!("string field '{name}'"),
            }
            .into());
        }
        let text = read_cstring(ptr)?;
        if let Err(e) = self.handles.string_free.invoke(vec![RawValue::Ptr(ptr)]) {
            tracing::warn!(field = name, error = %e, "failed to free string buffer");
        }
        Ok(text)
    }

    /// Write a string field; the foreign setter copies out of the host buffer
    /// during the call.
    pub fn write_string_field(&self, name: &str, value: &str) -> BindResult<()> {
        let text = std::ffi::CString::new(value)
            .map_err(|e| CallError::Message(format!("string field '{name}': {e}")))?;
        self.accessor_set(name, RawValue::Ptr(NativePtr::from_const(text.as_ptr().cast())))
    }

    /// Derived wrapper for an object-typed field.
    ///
    /// Non-owned fields resolve by address-indirection (the cell stores a
    /// pointer); owned/inline fields resolve as a sub-range view of the
    /// parent's region. Either way the child's flag hangs off this
    /// instance's flag, and a weak cache avoids re-materializing a wrapper
    /// while the previous one is still alive and valid.
    pub fn field_object(self: &Arc<Self>, name: &str) -> BindResult<Arc<NativeInstance>> {
        self.ensure_valid()?;
        if let Some(existing) = self.children.lock().get(name).and_then(Weak::upgrade) {
            if existing.is_valid() {
                return Ok(existing);
            }
        }

        let def = self.entity.definition();
        let (cell, field, _) = self.field_cell(name)?;
        let (signature, ownership) = field.ty.as_object().ok_or_else(|| {
            CallError::Message(format!(
                "field '{name}' of {} is not object-typed",
                def.signature
            ))
        })?;
        let context = format!("field '{name}' of {}", def.signature);
        let child_entity = self.catalog.expect(signature, &context)?;
        let child_layout = child_entity.layout(&*self.library)?;

        let child_addr = if ownership.is_indirect() {
            let raw: *mut std::ffi::c_void = match field.thread_safety.read_discipline() {
                LockDiscipline::None => unsafe { cell.read() },
                LockDiscipline::OptimisticRead => self.locks.optimistic_read(|| unsafe { cell.read() }),
                _ => self.locks.read_locked(|| unsafe { cell.read() }),
            };
            let ptr = NativePtr::from_mut(raw);
            if ptr.is_null() {
                return Err(AccessError::NullPointer {
                    what: context.clone(),
                }
                .into());
            }
            ptr
        } else {
            let base = self.scope.base()?;
            let (offset, _) = self.layout.field(name).unwrap_or((0, 0));
            let relative = self.addr.addr() - base.addr() + offset;
            self.scope.slice(relative, child_layout.total_size)?
        };

        let child = self.derived(child_entity, child_addr)?;
        self.children
            .lock()
            .insert(name.to_string(), Arc::downgrade(&child));
        Ok(child)
    }

    fn method_record(&self, name: &str) -> BindResult<&Method> {
        self.entity.definition().method(name).ok_or_else(|| {
            CallError::Message(format!(
                "no method '{name}' on {}",
                self.entity.definition().signature
            ))
            .into()
        })
    }

    fn call_setup(
        &self,
        def: &Method,
        args: &[CallArg],
    ) -> BindResult<(Vec<(Arc<InstanceLocks>, LockDiscipline)>, Vec<RawValue>)> {
        if def.kind != MethodKind::Static {
            self.ensure_valid()?;
        }
        let (arg_entries, arg_slots) = argument_setup(def, args)?;

        // Lock order: self first, then arguments in declaration order.
        let mut entries = Vec::with_capacity(arg_entries.len() + 1);
        let mut slots = Vec::with_capacity(arg_slots.len() + 1);
        if def.kind != MethodKind::Static {
            entries.push((
                Arc::clone(&self.locks),
                def.thread_safety.method_discipline(def.kind),
            ));
            slots.push(RawValue::Ptr(self.addr));
        }
        entries.extend(arg_entries);
        slots.extend(arg_slots);
        Ok((entries, slots))
    }

    fn finish_consumption(&self, def: &Method, args: &[CallArg]) {
        if def.kind == MethodKind::Consuming {
            self.consume();
        }
        consume_arguments(def, args);
    }

    fn decode_return(&self, def: &Method, raw: RawValue) -> BindResult<RawValue> {
        decode_method_return(def, raw, &self.handles.string_free)
    }

    /// Synchronous method call under the full locking discipline.
    pub fn call(&self, method: &str, args: Vec<CallArg>) -> BindResult<RawValue> {
        let def = self.method_record(method)?.clone();
        if def.is_async {
            return Err(CallError::Message(format!(
                "method '{method}' is asynchronous; use call_async"
            ))
            .into());
        }
        let bound = self
            .handles
            .method(method)
            .ok_or_else(|| CallError::Message(format!("method '{method}' is not bound")))?;

        let (entries, slots) = self.call_setup(&def, &args)?;
        let raw = {
            let _held = LockSet::acquire(&entries);
            bound.handle.invoke(slots)?
        };
        self.finish_consumption(&def, &args);
        self.decode_return(&def, raw)
    }

    /// Asynchronous method call: acquire the suspension-aware locks, start
    /// the foreign task, and drive it to completion without blocking a
    /// worker thread. Locks stay held for the duration of the task.
    pub async fn call_async(
        &self,
        method: &str,
        args: Vec<CallArg>,
        poll_interval: Duration,
    ) -> BindResult<RawValue> {
        let def = self.method_record(method)?.clone();
        if !def.is_async {
            return Err(CallError::Message(format!(
                "method '{method}' is synchronous; use call"
            ))
            .into());
        }
        let bound = self
            .handles
            .method(method)
            .ok_or_else(|| CallError::Message(format!("method '{method}' is not bound")))?
            .clone();

        let (entries, slots) = self.call_setup(&def, &args)?;
        let held = SuspendLockSet::acquire(&entries).await;
        let raw = bound.handle.invoke(slots)?;
        let task = match raw {
            RawValue::Task(descriptor) => ForeignTask::new(descriptor),
            other => {
                return Err(CallError::ReturnMismatch {
                    expected: "task",
                    found: other.kind_name(),
                }
                .into());
            }
        };
        let payload = task.drive(poll_interval, &self.handles.string_free).await;
        drop(held);
        let payload = payload?;
        self.finish_consumption(&def, &args);
        Ok(RawValue::Ptr(payload))
    }
}

/// Lock entries and raw slots for a call's declared arguments.
fn argument_setup(
    def: &Method,
    args: &[CallArg],
) -> BindResult<(Vec<(Arc<InstanceLocks>, LockDiscipline)>, Vec<RawValue>)> {
    if args.len() != def.args.len() {
        return Err(CallError::Message(format!(
            "method '{}' takes {} arguments, got {}",
            def.name,
            def.args.len(),
            args.len()
        ))
        .into());
    }
    let mut entries = Vec::new();
    let mut slots = Vec::with_capacity(args.len());
    for (declared, arg) in def.args.iter().zip(args) {
        match arg {
            CallArg::Value(value) => slots.push(value.clone()),
            CallArg::Object(instance) => {
                instance.ensure_valid()?;
                let ownership = declared
                    .ty
                    .as_object()
                    .map(|(_, o)| o)
                    .unwrap_or(Ownership::Borrowed);
                entries.push((Arc::clone(&instance.locks), argument_discipline(ownership)));
                slots.push(RawValue::Ptr(instance.addr));
            }
        }
    }
    Ok((entries, slots))
}

/// Invalidate arguments whose declared ownership transfers them foreignward.
fn consume_arguments(def: &Method, args: &[CallArg]) {
    for (declared, arg) in def.args.iter().zip(args) {
        if let (CallArg::Object(instance), Some((_, ownership))) = (arg, declared.ty.as_object()) {
            if ownership.consumes() {
                instance.consume();
            }
        }
    }
}

fn decode_method_return(
    def: &Method,
    raw: RawValue,
    string_free: &tether_ffi::Handle,
) -> BindResult<RawValue> {
    if def.call_mode != CallMode::PanicPropagating {
        return Ok(raw);
    }
    match raw {
        RawValue::Envelope { tag, payload } => {
            let tag = EnvelopeTag::try_from(tag)
                .map_err(|_| CallError::Message(format!("unknown envelope tag {tag}")))?;
            match tag {
                EnvelopeTag::Ok => Ok(RawValue::Ptr(payload)),
                EnvelopeTag::Err => {
                    let message = if payload.is_null() {
                        format!("{} panicked", def.name)
                    } else {
                        let text = read_cstring(payload)
                            .unwrap_or_else(|_| format!("{} panicked", def.name));
                        if let Err(e) = string_free.invoke(vec![RawValue::Ptr(payload)]) {
                            tracing::warn!(error = %e, "failed to free panic message");
                        }
                        text
                    };
                    Err(ForeignError::new(message).into())
                }
            }
        }
        other => Err(CallError::ReturnMismatch {
            expected: "envelope",
            found: other.kind_name(),
        }
        .into()),
    }
}

/// Call a static method (free-function entities included) with no receiver.
///
/// Statics take no instance lock; panic envelopes still decode, after the
/// message buffer went back through the shared string deallocator.
pub fn call_free(
    entity: &Arc<BoundEntity>,
    library: &dyn ForeignLibrary,
    method: &str,
    args: Vec<RawValue>,
) -> BindResult<RawValue> {
    let def = entity.definition().method(method).ok_or_else(|| {
        CallError::Message(format!(
            "no method '{method}' on {}",
            entity.definition().signature
        ))
    })?;
    if def.kind != MethodKind::Static {
        return Err(CallError::Message(format!(
            "method '{method}' requires an instance"
        ))
        .into());
    }
    if def.is_async {
        return Err(CallError::Message(format!(
            "method '{method}' is asynchronous; use call_async"
        ))
        .into());
    }
    let handles = entity.handles(library)?;
    let bound = handles
        .method(method)
        .ok_or_else(|| CallError::Message(format!("method '{method}' is not bound")))?;
    let raw = bound.handle.invoke(args)?;
    decode_method_return(def, raw, &handles.string_free)
}

impl Drop for NativeInstance {
    fn drop(&mut self) {
        // Finalization safety net: leak prevention only, never the primary
        // release path. Explicit release has already flipped the flag.
        if !self.owned {
            return;
        }
        if self.flag.invalidate() {
            if let Some(lifecycle) = self.handles.lifecycle() {
                if let Err(e) = lifecycle.destroy.invoke(vec![RawValue::Ptr(self.addr)]) {
                    tracing::warn!(
                        entity = %self.entity.definition().signature,
                        error = %e,
                        "finalizer destroy failed"
                    );
                }
                self.scope.close();
                tracing::debug!(
                    entity = %self.entity.definition().signature,
                    "finalizer safety net released instance"
                );
            }
        }
    }
}
