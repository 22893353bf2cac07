//! Advisory lock token

use std::time::{Duration, Instant};

use crate::error::{MemdbError, Result};

/// Lock holder id; 0 means "no lock"
pub type LockId = u64;

/// The id carried by requests that do not use the lock
pub const NO_LOCK: LockId = 0;

#[derive(Debug, Clone, Copy)]
struct Holder {
    id: LockId,
    deadline: Instant,
}

/// Idle or Held(holder, deadline)
#[derive(Debug)]
pub struct LockState {
    holder: Option<Holder>,

    /// Most recently issued holder id
    last_issued: LockId,

    /// Ceiling for a single reservation
    max_timeout: Duration,
}

impl LockState {
    pub fn new(max_timeout: Duration) -> Self {
        Self {
            holder: None,
            last_issued: NO_LOCK,
            max_timeout,
        }
    }

    /// Take the lock for `timeout`, replacing any current holder
    pub fn acquire(&mut self, timeout: Duration, now: Instant) -> Result<LockId> {
        if timeout > self.max_timeout {
            return Err(MemdbError::InvalidParams(format!(
                "lock timeout {}us exceeds the {}us ceiling",
                timeout.as_micros(),
                self.max_timeout.as_micros()
            )));
        }

        self.last_issued += 1;
        let id = self.last_issued;
        self.holder = Some(Holder {
            id,
            deadline: now + timeout,
        });

        tracing::debug!(lock_id = id, timeout_us = timeout.as_micros() as u64, "Lock acquired");
        Ok(id)
    }

    /// Give the lock back; only the current holder may
    pub fn release(&mut self, id: LockId) -> Result<()> {
        match self.holder {
            Some(holder) if holder.id == id => {
                self.holder = None;
                tracing::debug!(lock_id = id, "Lock released");
                Ok(())
            }
            _ => Err(MemdbError::LockMismatch { given: id }),
        }
    }

    /// Drop the holder if its deadline has passed, returning its id
    pub fn expire(&mut self, now: Instant) -> Option<LockId> {
        match self.holder {
            Some(holder) if now >= holder.deadline => {
                self.holder = None;
                tracing::info!(lock_id = holder.id, "Lock deadline passed, forcing release");
                Some(holder.id)
            }
            _ => None,
        }
    }

    /// A non-zero id that can no longer refer to a live reservation
    ///
    /// Only judged while idle: older than the previous issue, or never
    /// issued at all.
    pub fn is_stale(&self, id: LockId) -> bool {
        if id == NO_LOCK || self.holder.is_some() {
            return false;
        }
        id.saturating_add(1) < self.last_issued || id > self.last_issued
    }

    /// Whether a command carrying `id` may run right now
    ///
    /// `acquires` marks the lock command itself, which waits for idle
    /// unless the caller already holds the lock.
    pub fn admits(&self, id: LockId, acquires: bool) -> bool {
        match self.holder {
            None => true,
            Some(holder) if id == holder.id => true,
            Some(_) => id == NO_LOCK && !acquires,
        }
    }

    pub fn holder(&self) -> Option<LockId> {
        self.holder.map(|h| h.id)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.holder.map(|h| h.deadline)
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn last_issued(&self) -> LockId {
        self.last_issued
    }
}
