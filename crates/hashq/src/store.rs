//! Authoritative id -> entry mapping and the id allocator.
//!
//! The [`RecordStore`] guards its whole state behind a single
//! [`parking_lot::RwLock`]: the next-id counter and the entry map change
//! together, readers share the lock, and writers (allocation, insertion,
//! completion) are exclusive. Entries are never evicted.

use crate::{Error, Result};
use core::time::Duration;
use parking_lot::RwLock;
use std::collections::HashMap;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Identifier issued to a submitted value. The first id is `1`.
pub type Id = u64;

/// Lifecycle state of one stored entry.
///
/// An entry moves from [`EntryState::Pending`] to [`EntryState::Completed`]
/// exactly once and never back.
#[derive(Clone, PartialEq, Eq)]
pub enum EntryState {
    /// The raw value is held until the deferred digest replaces it.
    Pending { value: String },
    /// The digest of the submitted value.
    Completed { digest: String },
}

impl core::fmt::Debug for EntryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Never print the raw secret.
        match self {
            Self::Pending { .. } => f.write_str("Pending"),
            Self::Completed { digest } => f.debug_struct("Completed").field("digest", digest).finish(),
        }
    }
}

/// One submitted value and the time it was admitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub submitted_at: Duration,
    pub state: EntryState,
}

/// Read-only snapshot of an entry, as returned by [`RecordStore::lookup`].
///
/// Unlike [`EntryState`], a view never exposes the raw value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryView {
    Pending { submitted_at: Duration },
    Completed { submitted_at: Duration, digest: String },
}

impl EntryView {
    /// Returns the time at which the entry was admitted.
    pub const fn submitted_at(&self) -> Duration {
        match self {
            Self::Pending { submitted_at } | Self::Completed { submitted_at, .. } => *submitted_at,
        }
    }
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        match &entry.state {
            EntryState::Pending { .. } => Self::Pending {
                submitted_at: entry.submitted_at,
            },
            EntryState::Completed { digest } => Self::Completed {
                submitted_at: entry.submitted_at,
                digest: digest.clone(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    /// Last id handed out; `0` means none yet.
    head: Id,
    entries: HashMap<Id, Entry>,
}

impl StoreState {
    fn allocate(&mut self) -> Id {
        self.head += 1;
        self.head
    }

    fn insert_pending(&mut self, id: Id, value: String, submitted_at: Duration) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateId { id });
        }
        self.entries.insert(
            id,
            Entry {
                submitted_at,
                state: EntryState::Pending { value },
            },
        );
        Ok(())
    }
}

/// Thread-safe store of submitted entries plus the monotonic id allocator.
///
/// Ids start at `1`, increase by one per allocation in lock-acquisition
/// order, and are never reused for the lifetime of the store.
#[derive(Debug, Default)]
pub struct RecordStore {
    state: RwLock<StoreState>,
}

impl RecordStore {
    /// Creates an empty store. The first allocated id will be `1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused id.
    ///
    /// No two callers ever observe the same id.
    pub fn allocate(&self) -> Id {
        self.state.write().allocate()
    }

    /// Stores a new pending entry under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if an entry already exists for `id`.
    pub fn insert_pending(&self, id: Id, value: String, submitted_at: Duration) -> Result<()> {
        self.state.write().insert_pending(id, value, submitted_at)
    }

    /// Allocates an id and records its pending entry inside one critical
    /// section, so a reader can never observe an allocated id without its
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the allocator handed out an id that
    /// already has an entry. This only happens if ids were inserted manually
    /// through [`Self::insert_pending`] ahead of the allocator.
    pub fn admit(&self, value: String, submitted_at: Duration) -> Result<Id> {
        self.admit_with(value, submitted_at, |_| ()).map(|(id, ())| id)
    }

    /// Like [`Self::admit`], but runs `on_admit` with the new id before the
    /// lock is released. Work done in `on_admit` is therefore ordered exactly
    /// like id allocation.
    ///
    /// `on_admit` must not call back into this store.
    ///
    /// # Errors
    ///
    /// See [`Self::admit`]. `on_admit` is not run on error.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn admit_with<R>(
        &self,
        value: String,
        submitted_at: Duration,
        on_admit: impl FnOnce(Id) -> R,
    ) -> Result<(Id, R)> {
        let mut state = self.state.write();
        let id = state.allocate();
        state.insert_pending(id, value, submitted_at)?;
        Ok((id, on_admit(id)))
    }

    /// Replaces the pending value of `id` with its digest.
    ///
    /// Completing an entry that is already completed leaves the first digest
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownId`] if `id` has no entry.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, digest)))]
    pub fn complete(&self, id: Id, digest: String) -> Result<()> {
        let mut state = self.state.write();
        let entry = state.entries.get_mut(&id).ok_or(Error::UnknownId { id })?;
        if let EntryState::Pending { .. } = entry.state {
            entry.state = EntryState::Completed { digest };
        }
        Ok(())
    }

    /// Returns a snapshot of the entry stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` has no entry.
    pub fn lookup(&self, id: Id) -> Result<EntryView> {
        self.state
            .read()
            .entries
            .get(&id)
            .map(EntryView::from)
            .ok_or(Error::NotFound { id })
    }

    /// Returns the most recently allocated id, or `0` if none.
    pub fn head(&self) -> Id {
        self.state.read().head
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns `true` if no entry has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
