//! Memory region scopes.
//!
//! A [`MemoryRegionScope`] is the allocation/lifetime context of one owned
//! instance's backing native memory. Exactly one scope owns that memory;
//! borrowed views hold an `Arc` to the owner's scope but never a scope of
//! their own. The actual bytes are freed by the foreign destroy entry point;
//! closing the scope records that this has happened and fails late accesses
//! deterministically instead of handing out dangling addresses.

use std::sync::atomic::{AtomicBool, Ordering};

use tether_core::{AccessError, NativePtr};

#[derive(Debug)]
pub struct MemoryRegionScope {
    base: NativePtr,
    len: usize,
    open: AtomicBool,
    entity: String,
}

impl MemoryRegionScope {
    /// Adopt a foreign allocation as this scope's backing memory.
    pub fn adopt(entity: impl Into<String>, base: NativePtr, len: usize) -> Self {
        Self {
            base,
            len,
            open: AtomicBool::new(true),
            entity: entity.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the scope; the first caller wins, later calls are no-ops.
    pub fn close(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    /// Base address, while the scope is open.
    pub fn base(&self) -> Result<NativePtr, AccessError> {
        if !self.is_open() {
            return Err(AccessError::InvalidHandle {
                entity: self.entity.clone(),
            });
        }
        Ok(self.base)
    }

    /// Bounds-checked address of a sub-range view.
    pub fn slice(&self, offset: usize, len: usize) -> Result<NativePtr, AccessError> {
        let base = self.base()?;
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(AccessError::OutOfRegion {
                entity: self.entity.clone(),
                offset,
                len,
                region_len: self.len,
            });
        }
        Ok(base.byte_add(offset))
    }
}
