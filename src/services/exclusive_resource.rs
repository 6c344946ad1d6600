//! Process-wide exclusive resource shared by dispatches.
//!
//! Only one holder at a time. Waiters give up after the wait timeout, and a
//! holder that keeps the resource past its lease is force-released so a
//! crashed or stuck dispatch cannot wedge the mission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};

#[derive(Debug)]
struct Holder {
    owner: String,
    token: u64,
    acquired_at: Instant,
}

/// Binary semaphore with wait timeout and lease-based forced release.
#[derive(Debug)]
pub struct ExclusiveResource {
    name: String,
    holder: Mutex<Option<Holder>>,
    released: Notify,
    next_token: AtomicU64,
    wait: Duration,
    lease: Duration,
}

/// Held resource; released when dropped.
#[derive(Debug)]
pub struct ExclusiveGuard {
    resource: Arc<ExclusiveResource>,
    token: u64,
}

impl ExclusiveGuard {
    /// Whether this guard still holds the resource (it may have been
    /// force-released after the lease expired).
    pub fn is_held(&self) -> bool {
        self.resource.held_by_token(self.token)
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        self.resource.release(self.token);
    }
}

impl ExclusiveResource {
    pub fn new(name: impl Into<String>, wait: Duration, lease: Duration) -> Self {
        Self {
            name: name.into(),
            holder: Mutex::new(None),
            released: Notify::new(),
            next_token: AtomicU64::new(1),
            wait,
            lease,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<String> {
        self.holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.owner.clone())
    }

    fn held_by_token(&self, token: u64) -> bool {
        self.holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| h.token == token)
    }

    /// Take the resource if free or stale; otherwise report when the
    /// current lease expires.
    fn try_take(&self, owner: &str) -> Result<u64, Instant> {
        let mut slot = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = slot.as_ref() {
            let expires = current.acquired_at + self.lease;
            if Instant::now() < expires {
                return Err(expires);
            }
            warn!(
                resource = %self.name,
                holder = %current.owner,
                lease_secs = self.lease.as_secs_f64(),
                "forcing release of stale holder"
            );
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Holder {
            owner: owner.to_string(),
            token,
            acquired_at: Instant::now(),
        });
        Ok(token)
    }

    /// Wait for the resource on behalf of `owner`.
    pub async fn acquire(self: &Arc<Self>, owner: &str) -> DomainResult<ExclusiveGuard> {
        let started = Instant::now();
        let deadline = started + self.wait;
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_take(owner) {
                Ok(token) => {
                    debug!(
                        resource = %self.name,
                        holder = owner,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "exclusive resource acquired"
                    );
                    return Ok(ExclusiveGuard {
                        resource: Arc::clone(self),
                        token,
                    });
                }
                Err(lease_expires) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DomainError::ResourceTimeout {
                            resource: self.name.clone(),
                            holder: owner.to_string(),
                            waited_secs: self.wait.as_secs(),
                        });
                    }
                    let wake_at = deadline.min(lease_expires);
                    let _ = tokio::time::timeout_at(wake_at, notified).await;
                }
            }
        }
    }

    fn release(&self, token: u64) {
        let mut slot = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| h.token == token) {
            if let Some(holder) = slot.take() {
                debug!(resource = %self.name, holder = %holder.owner, "exclusive resource released");
            }
            drop(slot);
            self.released.notify_waiters();
        }
    }
}
