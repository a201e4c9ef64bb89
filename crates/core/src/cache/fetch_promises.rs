//! In-flight request cache used for request deduplication.
//!
//! An entry exists only while its request is pending. On settlement the entry
//! is reset to an explicit absent marker, so the next lookup for the key is a
//! guaranteed miss and triggers a fresh request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifies one claim of a key, so a settling request only clears its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

struct Slot<H> {
    ticket: Ticket,
    handle: H,
}

/// Outcome of [`FetchPromisesCache::join_or_claim`].
pub enum InFlight<H> {
    /// A request for the key was already pending; its handle is returned.
    Joined(H),
    /// No request was pending; the new handle is now registered under the key.
    Claimed(H),
}

/// Map of cache key to the handle of the request currently pending for it.
pub struct FetchPromisesCache<H> {
    entries: Mutex<HashMap<String, Option<Slot<H>>>>,
    next_ticket: AtomicU64,
}

impl<H: Clone> FetchPromisesCache<H> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()), next_ticket: AtomicU64::new(1) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Slot<H>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_ticket(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    /// True while a request for `key` is pending.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.lock().get(key), Some(Some(_)))
    }

    pub fn get(&self, key: &str) -> Option<H> {
        self.lock().get(key).and_then(|slot| slot.as_ref().map(|s| s.handle.clone()))
    }

    /// Register `handle` under `key`, or reset the entry to absent with `None`.
    pub fn set(&self, key: impl Into<String>, handle: Option<H>) -> Option<Ticket> {
        let slot = handle.map(|handle| Slot { ticket: self.issue_ticket(), handle });
        let ticket = slot.as_ref().map(|s| s.ticket);
        self.lock().insert(key.into(), slot);
        ticket
    }

    /// Return the pending handle for `key`, or register a new one built by `claim`.
    ///
    /// The lookup and the registration happen under one lock, so two callers can
    /// never both claim the same key. When `claim` returns `Err`, nothing is
    /// registered and the error value is handed back to the caller.
    pub fn join_or_claim<R>(
        &self, key: &str, claim: impl FnOnce(Ticket) -> Result<H, R>,
    ) -> Result<InFlight<H>, R> {
        let mut entries = self.lock();
        if let Some(Some(slot)) = entries.get(key) {
            return Ok(InFlight::Joined(slot.handle.clone()));
        }

        let ticket = self.issue_ticket();
        let handle = claim(ticket)?;
        entries.insert(key.to_string(), Some(Slot { ticket, handle: handle.clone() }));
        Ok(InFlight::Claimed(handle))
    }

    /// Reset `key` to absent if it is still held by `ticket`.
    ///
    /// Returns false when the entry was invalidated or re-claimed in the meantime.
    pub fn release(&self, key: &str, ticket: Ticket) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(slot) if slot.as_ref().is_some_and(|s| s.ticket == ticket) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Run `store` and reset `key` to absent, both only if `ticket` still holds the key.
    ///
    /// A request that was invalidated or re-claimed while pending must not
    /// overwrite what a newer request stored. Returns whether `store` ran.
    pub fn settle(&self, key: &str, ticket: Ticket, store: impl FnOnce()) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(slot) if slot.as_ref().is_some_and(|s| s.ticket == ticket) => {
                store();
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.lock().retain(|key, _| !key.starts_with(prefix));
    }

    /// Number of requests currently pending.
    pub fn pending(&self) -> usize {
        self.lock().values().filter(|slot| slot.is_some()).count()
    }
}

impl<H: Clone> Default for FetchPromisesCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
