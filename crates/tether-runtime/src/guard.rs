//! The concurrency guard: locking disciplines per thread-safety class.
//!
//! Every instance carries one [`InstanceLocks`] kit:
//!
//! - a read/write lock plus a write-sequence counter, backing the `Locked`
//!   class (optimistic read-then-validate, full lock for writers)
//! - a fairness-ordered mutex for `Immutable` writes (writers served in
//!   arrival order; reads take nothing)
//! - a suspension-aware read/write lock for suspending call paths, which
//!   yields the cooperative task instead of blocking its carrier thread
//!
//! `Unsafe` and `Atomic` members take no host-side lock at all; `Atomic`
//! updates go through the compare-and-swap helpers below.
//!
//! Multi-instance call sites acquire self first, then arguments in
//! declaration order, and release in reverse order, giving a total lock
//! order across any two calls touching overlapping instances.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{FairMutex, FairMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use tether_core::{AccessError, LockDiscipline, NativePtr, Ownership};

/// Unsynchronized read attempts before falling back to the read lock.
pub const OPTIMISTIC_ATTEMPTS: usize = 16;

/// Per-instance lock kit.
pub struct InstanceLocks {
    rw: RwLock<()>,
    fair: FairMutex<()>,
    /// Write sequence: odd while a writer is active, even otherwise.
    seq: AtomicU64,
    suspend: Arc<tokio::sync::RwLock<()>>,
}

impl Default for InstanceLocks {
    fn default() -> Self {
        Self {
            rw: RwLock::new(()),
            fair: FairMutex::new(()),
            seq: AtomicU64::new(0),
            suspend: Arc::new(tokio::sync::RwLock::new(())),
        }
    }
}

impl InstanceLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Optimistic read-then-validate.
    ///
    /// Attempts an unsynchronized read and validates it against the write
    /// sequence; if a concurrent writer was active, retries, and after
    /// [`OPTIMISTIC_ATTEMPTS`] failures reads under the full read lock.
    pub fn optimistic_read<T>(&self, read: impl Fn() -> T) -> T {
        for _ in 0..OPTIMISTIC_ATTEMPTS {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let value = read();
                if self.seq.load(Ordering::Acquire) == before {
                    return value;
                }
            }
            std::hint::spin_loop();
        }
        let _guard = self.rw.read();
        read()
    }

    /// Run `read` under the read side of the instance lock.
    pub fn read_locked<T>(&self, read: impl FnOnce() -> T) -> T {
        let _guard = self.rw.read();
        read()
    }

    /// Run `write` under the write lock, bumping the write sequence so
    /// optimistic readers detect it.
    pub fn write_serialized<T>(&self, write: impl FnOnce() -> T) -> T {
        let _guard = self.acquire(LockDiscipline::WriteLock);
        write()
    }

    /// Run `write` under the fairness-ordered lock (`Immutable` writes).
    pub fn fair_write<T>(&self, write: impl FnOnce() -> T) -> T {
        let _guard = self.fair.lock();
        write()
    }

    /// Acquire the guard a discipline calls for at a blocking call site.
    ///
    /// `OptimisticRead` maps to the read lock here: as an acquisition (rather
    /// than a field read) it only arises for const method calls.
    pub fn acquire(&self, discipline: LockDiscipline) -> MemberGuard<'_> {
        match discipline {
            LockDiscipline::None | LockDiscipline::AtomicCas => MemberGuard::None,
            LockDiscipline::ReadLock | LockDiscipline::OptimisticRead => {
                MemberGuard::Read(self.rw.read())
            }
            LockDiscipline::WriteLock => {
                let inner = self.rw.write();
                self.seq.fetch_add(1, Ordering::Release);
                MemberGuard::Write(SeqWriteGuard {
                    locks: self,
                    _inner: inner,
                })
            }
            LockDiscipline::FairWrite => MemberGuard::Fair(self.fair.lock()),
        }
    }

    /// Acquire the suspension-aware counterpart of a discipline.
    ///
    /// Waiting yields the cooperative task instead of blocking the carrier
    /// thread.
    pub async fn acquire_suspending(&self, discipline: LockDiscipline) -> SuspendGuard {
        match discipline {
            LockDiscipline::None | LockDiscipline::AtomicCas => SuspendGuard::None,
            LockDiscipline::ReadLock | LockDiscipline::OptimisticRead => {
                SuspendGuard::Read(Arc::clone(&self.suspend).read_owned().await)
            }
            LockDiscipline::WriteLock | LockDiscipline::FairWrite => {
                SuspendGuard::Write(Arc::clone(&self.suspend).write_owned().await)
            }
        }
    }

    /// Current write sequence, for tests and diagnostics.
    pub fn write_sequence(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }
}

/// Write guard that keeps the sequence odd for its lifetime.
pub struct SeqWriteGuard<'a> {
    locks: &'a InstanceLocks,
    _inner: RwLockWriteGuard<'a, ()>,
}

impl Drop for SeqWriteGuard<'_> {
    fn drop(&mut self) {
        // Even again before the write lock itself is released.
        self.locks.seq.fetch_add(1, Ordering::Release);
    }
}

/// Guard for one blocking acquisition.
pub enum MemberGuard<'a> {
    None,
    Read(RwLockReadGuard<'a, ()>),
    Write(SeqWriteGuard<'a>),
    Fair(FairMutexGuard<'a, ()>),
}

/// Guard for one suspending acquisition.
pub enum SuspendGuard {
    None,
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

/// Ordered blocking acquisition over several instances.
///
/// Guards are taken in slice order and released in reverse order.
pub struct LockSet<'a> {
    guards: Vec<MemberGuard<'a>>,
}

impl<'a> LockSet<'a> {
    pub fn acquire(entries: &'a [(Arc<InstanceLocks>, LockDiscipline)]) -> Self {
        let mut guards = Vec::with_capacity(entries.len());
        for (locks, discipline) in entries {
            guards.push(locks.acquire(*discipline));
        }
        Self { guards }
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Ordered suspending acquisition over several instances.
pub struct SuspendLockSet {
    guards: Vec<SuspendGuard>,
}

impl SuspendLockSet {
    pub async fn acquire(entries: &[(Arc<InstanceLocks>, LockDiscipline)]) -> Self {
        let mut guards = Vec::with_capacity(entries.len());
        for (locks, discipline) in entries {
            guards.push(locks.acquire_suspending(*discipline).await);
        }
        Self { guards }
    }
}

impl Drop for SuspendLockSet {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Discipline for a non-static entity passed as a method argument.
pub fn argument_discipline(ownership: Ownership) -> LockDiscipline {
    match ownership {
        Ownership::Borrowed => LockDiscipline::ReadLock,
        Ownership::MutBorrowed | Ownership::Owned | Ownership::Boxed => LockDiscipline::WriteLock,
    }
}

fn atomic_cell(cell: NativePtr) -> Result<&'static AtomicU64, AccessError> {
    if cell.is_null() {
        return Err(AccessError::NullPointer {
            what: "atomic field cell".to_string(),
        });
    }
    debug_assert_eq!(
        cell.addr() % std::mem::align_of::<AtomicU64>(),
        0,
        "atomic field cells must be 8-byte aligned"
    );
    Ok(unsafe { AtomicU64::from_ptr(cell.as_mut_ptr().cast::<u64>()) })
}

/// Compare-and-swap retry loop over an 8-byte field cell (`Atomic` class).
///
/// No update is lost: concurrent callers serialize into some total order.
pub fn atomic_fetch_update(
    cell: NativePtr,
    update: impl Fn(u64) -> u64,
) -> Result<u64, AccessError> {
    let atomic = atomic_cell(cell)?;
    let mut current = atomic.load(Ordering::Acquire);
    loop {
        let next = update(current);
        match atomic.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return Ok(next),
            Err(observed) => current = observed,
        }
    }
}

pub fn atomic_load(cell: NativePtr) -> Result<u64, AccessError> {
    Ok(atomic_cell(cell)?.load(Ordering::Acquire))
}

pub fn atomic_store(cell: NativePtr, value: u64) -> Result<(), AccessError> {
    atomic_cell(cell)?.store(value, Ordering::Release);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sequence_is_even_outside_writers() {
        let locks = InstanceLocks::new();
        assert_eq!(locks.write_sequence() % 2, 0);
        locks.write_serialized(|| {
            assert_eq!(locks.write_sequence() % 2, 1);
        });
        assert_eq!(locks.write_sequence() % 2, 0);
    }

    #[test]
    fn optimistic_read_sees_writes() {
        let locks = InstanceLocks::new();
        let cell = AtomicU64::new(1);
        locks.write_serialized(|| cell.store(2, Ordering::Relaxed));
        let value = locks.optimistic_read(|| cell.load(Ordering::Relaxed));
        assert_eq!(value, 2);
    }

    #[test]
    fn atomic_increments_lose_no_update() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1000;

        let cell = AtomicU64::new(0);
        let ptr = NativePtr::from_const((&cell as *const AtomicU64).cast());

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(move || {
                    for _ in 0..PER_THREAD {
                        atomic_fetch_update(ptr, |v| v + 1).unwrap();
                    }
                });
            }
        });

        assert_eq!(atomic_load(ptr).unwrap(), (THREADS * PER_THREAD) as u64);
    }

    #[test]
    fn atomic_access_rejects_null_cells() {
        assert!(matches!(
            atomic_fetch_update(NativePtr::null(), |v| v),
            Err(AccessError::NullPointer { .. })
        ));
    }

    #[test]
    fn fair_write_serializes() {
        let locks = InstanceLocks::new();
        let counter = AtomicU64::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        locks.fair_write(|| {
                            let v = counter.load(Ordering::Relaxed);
                            counter.store(v + 1, Ordering::Relaxed);
                        });
                    }
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 400);
    }

    #[test]
    fn lock_set_orders_and_releases() {
        let a = InstanceLocks::new();
        let b = InstanceLocks::new();
        let entries = vec![
            (Arc::clone(&a), LockDiscipline::WriteLock),
            (Arc::clone(&b), LockDiscipline::ReadLock),
        ];
        {
            let _set = LockSet::acquire(&entries);
            assert!(a.rw.try_read().is_none());
            assert!(b.rw.try_write().is_none());
            assert!(b.rw.try_read().is_some());
        }
        assert!(a.rw.try_write().is_some());
        assert!(b.rw.try_write().is_some());
    }

    #[tokio::test]
    async fn suspending_write_excludes_suspending_readers() {
        let locks = InstanceLocks::new();
        let guard = locks.acquire_suspending(LockDiscipline::WriteLock).await;
        assert!(locks.suspend.try_read().is_err());
        drop(guard);
        assert!(locks.suspend.try_read().is_ok());
    }
}
