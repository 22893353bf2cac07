//! Scheduler Module
//!
//! Advisory lock plus the queue of commands waiting for it.
//!
//! ## Responsibilities
//! - Hand out monotonically increasing holder ids
//! - Decide whether a command may run now, must wait, or is stale
//! - Force the lock back to idle once its deadline passes
//! - Release queued commands in FIFO order as they become eligible
//!
//! ## State Machine
//! ```text
//!            acquire(timeout)
//!   ┌──────┐ ───────────────▶ ┌───────────────────────┐
//!   │ Idle │                  │ Held(holder, deadline)│
//!   └──────┘ ◀─────────────── └───────────────────────┘
//!            release(holder) | deadline passed
//! ```

mod lock;
mod pending;

pub use lock::{LockId, LockState, NO_LOCK};
pub use pending::{Admission, Scheduler, Ticket};
