//! Runtime bridging for tether-generated bindings.
//!
//! Everything a generated binding touches at run time lives here:
//!
//! - [`OwnershipFlag`]: per-instance validity with parent links, so
//!   invalidating an owner transitively invalidates every derived wrapper
//! - [`MemoryRegionScope`]: the allocation/lifetime context of an owned
//!   instance's backing native memory
//! - [`InstanceLocks`] and friends: the per-thread-safety-class locking
//!   disciplines, for blocking and suspending call sites alike
//! - [`NativeInstance`]: construction, release (idempotent, first caller
//!   wins), field access through resolved layouts, derived wrappers with
//!   weak caching, and method calls under the full lock plan
//! - [`ForeignTask`]: the poll-based bridge that turns a foreign async task
//!   into a host-awaitable result with exactly-once cleanup

mod bridge;
mod flag;
mod guard;
mod instance;
mod region;

pub use bridge::{DEFAULT_POLL_INTERVAL, ForeignTask, PollStatus};
pub use flag::OwnershipFlag;
pub use guard::{
    InstanceLocks, LockSet, MemberGuard, OPTIMISTIC_ATTEMPTS, SuspendGuard, SuspendLockSet,
    argument_discipline, atomic_fetch_update, atomic_load, atomic_store,
};
pub use instance::{CallArg, NativeInstance, call_free};
pub use region::MemoryRegionScope;
