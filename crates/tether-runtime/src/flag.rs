//! Ownership flags: per-instance validity tracking.
//!
//! An [`OwnershipFlag`] is the tri-state validity cell every wrapper checks
//! before touching native memory. Exactly one flag is the *owner* per
//! independently destroyable native resource; every borrowed or derived
//! wrapper gets a locally-valid flag whose parent link points at the owner's,
//! so invalidating the owner transitively invalidates the whole subtree
//! without a sweep.
//!
//! Parent links form a tree, never a cycle: the foreign side owns the actual
//! resource, the host side only tracks permission to use it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Validity cell with an optional parent link.
#[derive(Debug)]
pub struct OwnershipFlag {
    bit: AtomicBool,
    parent: Option<Arc<OwnershipFlag>>,
}

impl OwnershipFlag {
    /// A fresh owner flag, valid and parentless.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            bit: AtomicBool::new(true),
            parent: None,
        })
    }

    /// A derived flag, valid locally, sharing `parent` as its parent link.
    pub fn derived(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            bit: AtomicBool::new(true),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Whether this flag is the owner of its resource.
    pub fn is_owner(&self) -> bool {
        self.parent.is_none()
    }

    /// A flag is valid iff its own bit is set and every ancestor is valid.
    pub fn is_valid(&self) -> bool {
        if !self.bit.load(Ordering::Acquire) {
            return false;
        }
        let mut ancestor = self.parent.as_deref();
        while let Some(flag) = ancestor {
            if !flag.bit.load(Ordering::Acquire) {
                return false;
            }
            ancestor = flag.parent.as_deref();
        }
        true
    }

    /// Atomically transition valid -> invalid; the first caller wins.
    ///
    /// Returns `true` only for the winner. Racers observe `false` and treat
    /// the release as a no-op.
    pub fn invalidate(&self) -> bool {
        self.bit.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_starts_valid() {
        let flag = OwnershipFlag::root();
        assert!(flag.is_owner());
        assert!(flag.is_valid());
    }

    #[test]
    fn first_invalidation_wins() {
        let flag = OwnershipFlag::root();
        assert!(flag.invalidate());
        assert!(!flag.invalidate());
        assert!(!flag.is_valid());
    }

    #[test]
    fn invalidating_the_parent_transitively_invalidates_children() {
        let parent = OwnershipFlag::root();
        let child = OwnershipFlag::derived(&parent);
        let grandchild = OwnershipFlag::derived(&child);
        assert!(grandchild.is_valid());

        parent.invalidate();
        assert!(!child.is_valid());
        assert!(!grandchild.is_valid());
    }

    #[test]
    fn invalidating_a_child_leaves_the_parent_valid() {
        let parent = OwnershipFlag::root();
        let child = OwnershipFlag::derived(&parent);
        child.invalidate();
        assert!(!child.is_valid());
        assert!(parent.is_valid());
    }

    #[test]
    fn concurrent_invalidation_has_exactly_one_winner() {
        let flag = OwnershipFlag::root();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let flag = Arc::clone(&flag);
            handles.push(std::thread::spawn(move || flag.invalidate()));
        }
        let winners: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }
}
