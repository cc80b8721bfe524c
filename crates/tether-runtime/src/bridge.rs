//! The async bridge: driving foreign tasks to completion cooperatively.
//!
//! An asynchronous foreign method returns a three-pointer task descriptor
//! instead of its declared value. [`ForeignTask`] wraps that descriptor and
//! polls it until ready, suspending the cooperative task briefly between
//! polls rather than busy-spinning or parking a worker thread.
//!
//! The task's drop entry point runs exactly once on every exit path:
//! completion, failure, and cancellation alike. Cancellation is just the
//! host dropping the in-flight future, so the exactly-once latch lives in
//! `Drop`.
//!
//! The fixed poll interval is a pragmatic stand-in for a foreign-side wake
//! token; the foreign contract has no readiness notification to subscribe to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use tether_core::{BindResult, CallError, ForeignError, NativePtr};
use tether_ffi::{CallFrame, ForeignFn, Handle, RawValue, TaskDescriptor, read_cstring};

/// Default suspension between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tag byte of a poll envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PollStatus {
    Pending = 0,
    /// Payload is the declared success value.
    Ready = 1,
    /// Payload is the foreign-supplied error message.
    Failed = 2,
}

/// A foreign asynchronous task being driven by the host.
pub struct ForeignTask {
    handle: NativePtr,
    poll: ForeignFn,
    drop_fn: ForeignFn,
    disposed: AtomicBool,
}

impl ForeignTask {
    pub fn new(descriptor: TaskDescriptor) -> Self {
        Self {
            handle: descriptor.handle,
            poll: descriptor.poll,
            drop_fn: descriptor.drop_fn,
            disposed: AtomicBool::new(false),
        }
    }

    /// Invoke the poll entry point once.
    pub fn poll_once(&self) -> BindResult<(PollStatus, NativePtr)> {
        let mut frame = CallFrame::new(vec![RawValue::Ptr(self.handle)]);
        (self.poll.as_ref())(&mut frame)?;
        match frame.into_return() {
            RawValue::Envelope { tag, payload } => {
                let status = PollStatus::try_from(tag).map_err(|_| {
                    CallError::Message(format!("unknown poll status tag {tag}"))
                })?;
                Ok((status, payload))
            }
            other => Err(CallError::ReturnMismatch {
                expected: "envelope",
                found: other.kind_name(),
            }
            .into()),
        }
    }

    /// Run the drop entry point; the first caller wins, later calls no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut frame = CallFrame::new(vec![RawValue::Ptr(self.handle)]);
        if let Err(e) = (self.drop_fn.as_ref())(&mut frame) {
            tracing::warn!(error = %e, "foreign task drop entry point failed");
        }
    }

    /// Poll to completion, suspending between polls.
    ///
    /// On failure the drop entry point has already run before the error is
    /// surfaced; the message buffer is released through `string_free`.
    pub async fn drive(self, poll_interval: Duration, string_free: &Handle) -> BindResult<NativePtr> {
        loop {
            let (status, payload) = self.poll_once()?;
            match status {
                PollStatus::Pending => tokio::time::sleep(poll_interval).await,
                PollStatus::Ready => {
                    self.dispose();
                    return Ok(payload);
                }
                PollStatus::Failed => {
                    self.dispose();
                    let message = if payload.is_null() {
                        "foreign task failed".to_string()
                    } else {
                        let text = read_cstring(payload)
                            .unwrap_or_else(|_| "foreign task failed".to_string());
                        if let Err(e) = string_free.invoke(vec![RawValue::Ptr(payload)]) {
                            tracing::warn!(error = %e, "failed to free task error message");
                        }
                        text
                    };
                    return Err(ForeignError::new(message).into());
                }
            }
        }
    }
}

impl Drop for ForeignTask {
    fn drop(&mut self) {
        self.dispose();
    }
}
