//! Pending-command queue
//!
//! Generic over the queued item so the engine can park whole requests
//! together with their reply address.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{MemdbError, Result};

use super::{LockId, LockState};

/// What the scheduler needs to know about a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub lock_id: LockId,

    /// The command is a lock acquisition
    pub acquires: bool,
}

/// Decision for a newly submitted command
#[derive(Debug)]
pub enum Admission<T> {
    /// Run now
    Run(T),

    /// Parked until the lock goes idle or its holder matches
    Queued,

    /// Refused without running
    Rejected(T, MemdbError),
}

struct Pending<T> {
    ticket: Ticket,
    item: T,
}

/// Lock state plus a FIFO of commands waiting on it
pub struct Scheduler<T> {
    lock: LockState,
    queue: VecDeque<Pending<T>>,
}

impl<T> Scheduler<T> {
    pub fn new(max_lock_timeout: Duration) -> Self {
        Self {
            lock: LockState::new(max_lock_timeout),
            queue: VecDeque::new(),
        }
    }

    /// Decide what happens to a new command
    pub fn admit(&mut self, ticket: Ticket, item: T) -> Admission<T> {
        if self.lock.is_stale(ticket.lock_id) {
            return Admission::Rejected(item, self.stale_error(ticket.lock_id));
        }

        if self.lock.admits(ticket.lock_id, ticket.acquires) {
            return Admission::Run(item);
        }

        self.queue.push_back(Pending { ticket, item });
        tracing::debug!(
            lock_id = ticket.lock_id,
            queued = self.queue.len(),
            "Command parked behind lock"
        );
        Admission::Queued
    }

    /// Pop the first queued command that may run now
    ///
    /// Scans from the head every call, so callers that execute one command
    /// and ask again always see the earliest eligible one. A queued command
    /// whose lock id went stale is returned with the error to reply with.
    pub fn next_ready(&mut self) -> Option<(T, Option<MemdbError>)> {
        let pos = self.queue.iter().position(|p| {
            self.lock.is_stale(p.ticket.lock_id)
                || self.lock.admits(p.ticket.lock_id, p.ticket.acquires)
        })?;

        let pending = self.queue.remove(pos)?;
        let error = self
            .lock
            .is_stale(pending.ticket.lock_id)
            .then(|| self.stale_error(pending.ticket.lock_id));

        Some((pending.item, error))
    }

    /// Take the lock (run by the lock command)
    pub fn acquire(&mut self, timeout: Duration, now: Instant) -> Result<LockId> {
        self.lock.acquire(timeout, now)
    }

    /// Release the lock (run by the unlock command)
    pub fn release(&mut self, id: LockId) -> Result<()> {
        self.lock.release(id)
    }

    /// Cooperative timer check
    pub fn expire(&mut self, now: Instant) -> Option<LockId> {
        self.lock.expire(now)
    }

    pub fn lock(&self) -> &LockState {
        &self.lock
    }

    /// Number of parked commands
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn stale_error(&self, id: LockId) -> MemdbError {
        MemdbError::LockTimeout(format!(
            "lock id {} expired (last issued {})",
            id,
            self.lock.last_issued()
        ))
    }
}
