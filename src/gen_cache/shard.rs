//! One lock-striped partition of a [`GenCache`](super::GenCache).
//!
//! A shard owns an arena of entries, an id → slot map, and two intrusive
//! lists threaded through the same entries: the LRU list (recency, tail is
//! the eviction candidate) and the SCAN list (insertion order, walked by
//! iteration). Everything inside [`ShardInner`] is guarded by the shard's
//! `RwLock`; the few fields outside it are lock-free hints.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::{IntrusiveList, Linked, Links, ListKind};
use crate::ds::slot_arena::{SlotArena, SlotId};

/// Tail stamp published for a shard with an empty LRU list.
pub(crate) const NO_TAIL: u64 = u64::MAX;

pub(crate) struct Entry<T> {
    pub(crate) id: Arc<str>,
    pub(crate) value: Arc<T>,
    /// MRU sequence number of the last insertion or promotion.
    pub(crate) last_mru: u64,
    /// Iterator pins. Changed under the shared lock, hence atomic.
    refs: AtomicU32,
    /// Logically removed but still pinned; only the SCAN link remains.
    pub(crate) deleted: bool,
    links: [Links; ListKind::COUNT],
}

impl<T> Entry<T> {
    fn new(id: Arc<str>, value: Arc<T>, last_mru: u64) -> Self {
        Self {
            id,
            value,
            last_mru,
            refs: AtomicU32::new(0),
            deleted: false,
            links: Default::default(),
        }
    }

    pub(crate) fn refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }
}

impl<T> Linked for Entry<T> {
    fn links(&self, kind: ListKind) -> &Links {
        &self.links[kind.index()]
    }

    fn links_mut(&mut self, kind: ListKind) -> &mut Links {
        &mut self.links[kind.index()]
    }
}

/// What happened to an entry taken out of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unlinked {
    /// Removed from both lists and freed.
    Freed,
    /// Pinned by an iterator; left on the SCAN list as a tombstone.
    Tombstoned,
}

pub(crate) struct ShardInner<T> {
    pub(crate) map: FxHashMap<Arc<str>, SlotId>,
    pub(crate) entries: SlotArena<Entry<T>>,
    pub(crate) lru: IntrusiveList,
    pub(crate) scan: IntrusiveList,
}

impl<T> ShardInner<T> {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            entries: SlotArena::new(),
            lru: IntrusiveList::new(ListKind::Lru),
            scan: IntrusiveList::new(ListKind::Scan),
        }
    }

    #[inline]
    pub(crate) fn slot_of(&self, id: &str) -> Option<SlotId> {
        self.map.get(id).copied()
    }

    #[inline]
    pub(crate) fn entry(&self, slot: SlotId) -> Option<&Entry<T>> {
        self.entries.get(slot)
    }

    /// Live entry for `id`, if any.
    #[inline]
    pub(crate) fn lookup(&self, id: &str) -> Option<&Entry<T>> {
        self.slot_of(id).and_then(|slot| self.entries.get(slot))
    }

    /// Links a fresh entry at the head of both lists.
    ///
    /// The caller guarantees `id` is absent. Should it be present anyway the
    /// existing entry keeps its place and only the contents are swapped, so the
    /// map never points at an orphaned slot.
    pub(crate) fn insert(&mut self, id: Arc<str>, value: Arc<T>, stamp: u64) -> SlotId {
        debug_assert!(self.slot_of(&id).is_none(), "insert of existing id {id:?}");
        if let Some(slot) = self.slot_of(&id) {
            self.replace(slot, value);
            return slot;
        }
        let slot = self.entries.insert(Entry::new(Arc::clone(&id), value, stamp));
        self.lru.push_front(&mut self.entries, slot);
        self.scan.push_front(&mut self.entries, slot);
        self.map.insert(id, slot);
        slot
    }

    pub(crate) fn replace(&mut self, slot: SlotId, value: Arc<T>) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.value = value;
        }
    }

    /// Stamps `slot` and relinks it at the LRU head. The SCAN position is
    /// left alone.
    pub(crate) fn promote(&mut self, slot: SlotId, stamp: u64) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.last_mru = stamp;
            self.lru.move_to_front(&mut self.entries, slot);
        }
    }

    /// Takes a live entry out of the map and LRU list. The SCAN unlink is
    /// deferred while an iterator holds a pin.
    pub(crate) fn remove(&mut self, slot: SlotId) -> Option<(Arc<str>, Unlinked)> {
        let entry = self.entries.get_mut(slot)?;
        if entry.deleted {
            return None;
        }
        let id = Arc::clone(&entry.id);
        let pinned = entry.refs() > 0;
        if pinned {
            entry.deleted = true;
        }
        self.map.remove(&id);
        self.lru.detach(&mut self.entries, slot);
        if pinned {
            return Some((id, Unlinked::Tombstoned));
        }
        self.scan.detach(&mut self.entries, slot);
        self.entries.remove(slot);
        Some((id, Unlinked::Freed))
    }

    /// Removes the LRU tail, if any.
    pub(crate) fn evict_lru(&mut self) -> Option<(Arc<str>, Unlinked)> {
        let slot = self.lru.back_id()?;
        self.remove(slot)
    }

    /// MRU stamp of the LRU tail, or [`NO_TAIL`].
    pub(crate) fn tail_stamp(&self) -> u64 {
        self.lru
            .back_id()
            .and_then(|slot| self.entries.get(slot))
            .map(|entry| entry.last_mru)
            .unwrap_or(NO_TAIL)
    }

    /// Adds an iterator pin. Legal under the shared lock.
    pub(crate) fn pin(&self, slot: SlotId) {
        if let Some(entry) = self.entries.get(slot) {
            entry.refs.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Drops a pin under the shared lock.
    ///
    /// Returns `false` without touching the count when the entry is a
    /// tombstone and this is its last pin: the caller must retry under the
    /// exclusive lock via [`release`](Self::release), which unlinks it.
    pub(crate) fn try_unpin_shared(&self, slot: SlotId) -> bool {
        let Some(entry) = self.entries.get(slot) else {
            return true;
        };
        if !entry.deleted {
            entry.refs.fetch_sub(1, Ordering::AcqRel);
            return true;
        }
        entry
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| {
                (refs > 1).then(|| refs - 1)
            })
            .is_ok()
    }

    /// Drops a pin under the exclusive lock. Returns `true` if this was the
    /// last pin on a tombstone and the entry was freed.
    pub(crate) fn release(&mut self, slot: SlotId) -> bool {
        let Some(entry) = self.entries.get(slot) else {
            return false;
        };
        let before = entry.refs.fetch_sub(1, Ordering::AcqRel);
        if before != 1 || !entry.deleted {
            return false;
        }
        self.scan.detach(&mut self.entries, slot);
        self.entries.remove(slot);
        true
    }

    /// Checks map/list agreement. Returns a description of the first
    /// violation found.
    pub(crate) fn validate(&self) -> Result<(), String> {
        self.lru.validate(&self.entries)?;
        self.scan.validate(&self.entries)?;

        if self.lru.len() != self.map.len() {
            return Err(format!(
                "lru len {} != map len {}",
                self.lru.len(),
                self.map.len()
            ));
        }
        for (id, &slot) in &self.map {
            let Some(entry) = self.entries.get(slot) else {
                return Err(format!("id {id:?} maps to a free slot"));
            };
            if entry.deleted || entry.id != *id {
                return Err(format!("id {id:?} maps to a foreign or deleted entry"));
            }
            if !self.scan.contains(&self.entries, slot) {
                return Err(format!("id {id:?} missing from scan list"));
            }
        }
        let mut tombstones = 0usize;
        for slot in self.scan.iter_ids(&self.entries) {
            let Some(entry) = self.entries.get(slot) else {
                continue;
            };
            if entry.deleted {
                if entry.refs() == 0 {
                    return Err(format!("unpinned tombstone {:?} left on scan list", entry.id));
                }
                tombstones += 1;
            }
        }
        if self.scan.len() != self.map.len() + tombstones {
            return Err(format!(
                "scan len {} != map len {} + tombstones {tombstones}",
                self.scan.len(),
                self.map.len()
            ));
        }
        if self.entries.len() != self.scan.len() {
            return Err(format!(
                "arena holds {} entries, scan list {}",
                self.entries.len(),
                self.scan.len()
            ));
        }
        Ok(())
    }
}

pub(crate) struct Shard<T> {
    inner: RwLock<ShardInner<T>>,
    /// Threads parked waiting for the exclusive lock.
    lockers: AtomicUsize,
    /// Map length as of the last exclusive section.
    len_hint: AtomicUsize,
    /// LRU tail stamp as of the last exclusive section.
    tail_hint: AtomicU64,
}

impl<T> Shard<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(ShardInner::new()),
            lockers: AtomicUsize::new(0),
            len_hint: AtomicUsize::new(0),
            tail_hint: AtomicU64::new(NO_TAIL),
        }
    }

    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ShardInner<T>> {
        self.inner.read()
    }

    /// Takes the exclusive lock, advertising the wait to iterators that may
    /// be holding the shared lock across entries.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ShardInner<T>> {
        if let Some(guard) = self.inner.try_write() {
            return guard;
        }
        self.lockers.fetch_add(1, Ordering::AcqRel);
        let guard = self.inner.write();
        self.lockers.fetch_sub(1, Ordering::AcqRel);
        guard
    }

    #[inline]
    pub(crate) fn has_waiting_writers(&self) -> bool {
        self.lockers.load(Ordering::Acquire) > 0
    }

    /// Refreshes the lock-free hints. Call before releasing the exclusive
    /// lock whenever the map or LRU tail may have changed.
    pub(crate) fn publish(&self, inner: &ShardInner<T>) {
        self.len_hint.store(inner.map.len(), Ordering::Relaxed);
        self.tail_hint.store(inner.tail_stamp(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn len_hint(&self) -> usize {
        self.len_hint.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn tail_hint(&self) -> u64 {
        self.tail_hint.load(Ordering::Relaxed)
    }
}
