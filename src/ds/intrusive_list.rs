//! Intrusive doubly linked lists threaded through `SlotArena` nodes.
//!
//! Unlike a conventional list, [`IntrusiveList`] owns no storage: it is only a
//! head/tail descriptor. The nodes live in a [`SlotArena`] owned by the caller
//! and carry one [`Links`] pair per list kind, so the same node can sit in
//! several lists at once and be moved in one without touching the others.
//!
//! ## Architecture
//!
//! ```text
//!   arena (SlotArena<N: Linked>)
//!   ┌────────┬──────────────────────────────────────────────────────────┐
//!   │ SlotId │ node { .., links: [Lru{prev,next}, Scan{prev,next}] }    │
//!   ├────────┼──────────────────────────────────────────────────────────┤
//!   │ id_1   │ Lru { None,    id_3 }   Scan { None,    id_2 }           │
//!   │ id_2   │ Lru { id_3,    None }   Scan { id_1,    id_3 }           │
//!   │ id_3   │ Lru { id_1,    id_2 }   Scan { id_2,    None }           │
//!   └────────┴──────────────────────────────────────────────────────────┘
//!
//!   Lru:  head ─► [id_1] ◄──► [id_3] ◄──► [id_2] ◄── tail
//!   Scan: head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//! ```
//!
//! `head` is the most recently linked end, `tail` the oldest. `next` points
//! from head toward tail; `prev` points back toward head.
//!
//! ## Performance
//! - `push_front` / `detach` / `move_to_front`: O(1)
//! - `iter_ids`: O(n)

use crate::ds::slot_arena::{SlotArena, SlotId};

/// Which of a node's link pairs a list threads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Recency order; tail is the eviction candidate.
    Lru,
    /// Insertion-stable order used for iteration.
    Scan,
}

impl ListKind {
    pub const COUNT: usize = 2;

    #[inline]
    pub fn index(self) -> usize {
        match self {
            ListKind::Lru => 0,
            ListKind::Scan => 1,
        }
    }
}

/// One prev/next pair embedded in a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
    linked: bool,
}

/// A node that can be threaded through one list per [`ListKind`].
pub trait Linked {
    fn links(&self, kind: ListKind) -> &Links;
    fn links_mut(&mut self, kind: ListKind) -> &mut Links;
}

/// Head/tail descriptor of a list whose nodes live in an external arena.
#[derive(Debug)]
pub struct IntrusiveList {
    kind: ListKind,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl IntrusiveList {
    /// Creates an empty list threading through the `kind` link pair.
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently linked node.
    pub fn front_id(&self) -> Option<SlotId> {
        self.head
    }

    /// Oldest node.
    pub fn back_id(&self) -> Option<SlotId> {
        self.tail
    }

    /// Returns `true` if `id` is linked into this list.
    pub fn contains<N: Linked>(&self, arena: &SlotArena<N>, id: SlotId) -> bool {
        arena
            .get(id)
            .map(|node| node.links(self.kind).linked)
            .unwrap_or(false)
    }

    /// Neighbour of `id` one step toward the tail.
    #[cfg(test)]
    pub fn next_of<N: Linked>(&self, arena: &SlotArena<N>, id: SlotId) -> Option<SlotId> {
        arena.get(id).and_then(|node| node.links(self.kind).next)
    }

    /// Neighbour of `id` one step toward the head.
    pub fn prev_of<N: Linked>(&self, arena: &SlotArena<N>, id: SlotId) -> Option<SlotId> {
        arena.get(id).and_then(|node| node.links(self.kind).prev)
    }

    /// Links `id` at the head. Returns `false` if the node is missing or
    /// already linked.
    pub fn push_front<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        let kind = self.kind;
        let old_head = self.head;
        match arena.get_mut(id) {
            Some(node) if !node.links(kind).linked => {
                *node.links_mut(kind) = Links {
                    prev: None,
                    next: old_head,
                    linked: true,
                };
            },
            _ => return false,
        }
        if let Some(old_head) = old_head {
            if let Some(head_node) = arena.get_mut(old_head) {
                head_node.links_mut(kind).prev = Some(id);
            }
        } else {
            self.tail = Some(id);
        }
        self.head = Some(id);
        self.len += 1;
        true
    }

    /// Unlinks `id`, leaving the node in the arena. Returns `false` if it was
    /// not linked.
    pub fn detach<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        let kind = self.kind;
        let (prev, next) = match arena.get(id) {
            Some(node) if node.links(kind).linked => {
                let links = node.links(kind);
                (links.prev, links.next)
            },
            _ => return false,
        };

        if let Some(prev_id) = prev {
            if let Some(prev_node) = arena.get_mut(prev_id) {
                prev_node.links_mut(kind).next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_id) = next {
            if let Some(next_node) = arena.get_mut(next_id) {
                next_node.links_mut(kind).prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(node) = arena.get_mut(id) {
            *node.links_mut(kind) = Links::default();
        }
        self.len -= 1;
        true
    }

    /// Moves a linked node to the head; returns `false` if `id` is not linked.
    pub fn move_to_front<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        if Some(id) == self.head {
            return self.contains(arena, id);
        }
        if !self.detach(arena, id) {
            return false;
        }
        self.push_front(arena, id)
    }

    /// Unlinks and returns the tail node id.
    #[cfg(test)]
    pub fn pop_back<N: Linked>(&mut self, arena: &mut SlotArena<N>) -> Option<SlotId> {
        let id = self.tail?;
        self.detach(arena, id);
        Some(id)
    }

    /// Iterates node ids from head to tail.
    pub fn iter_ids<'a, N: Linked>(&self, arena: &'a SlotArena<N>) -> IntrusiveListIdIter<'a, N> {
        IntrusiveListIdIter {
            arena,
            kind: self.kind,
            current: self.head,
        }
    }

    #[cfg(test)]
    /// Returns the list order as SlotIds from head to tail.
    pub fn debug_snapshot_ids<N: Linked>(&self, arena: &SlotArena<N>) -> Vec<SlotId> {
        self.iter_ids(arena).collect()
    }

    #[cfg(test)]
    pub fn debug_validate_invariants<N: Linked>(&self, arena: &SlotArena<N>) {
        if let Err(msg) = self.validate(arena) {
            panic!("{msg}");
        }
    }

    /// Walks the list checking link symmetry, head/tail and length.
    pub(crate) fn validate<N: Linked>(&self, arena: &SlotArena<N>) -> Result<(), String> {
        if self.head.is_none() || self.tail.is_none() {
            if self.head.is_some() || self.tail.is_some() || self.len != 0 {
                return Err(format!("{:?} list: head/tail disagree on emptiness", self.kind));
            }
            return Ok(());
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut current = self.head;
        let mut prev = None;

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(format!("{:?} list: cycle at slot {}", self.kind, id.index()));
            }
            let Some(node) = arena.get(id) else {
                return Err(format!("{:?} list: dangling slot {}", self.kind, id.index()));
            };
            let links = node.links(self.kind);
            if !links.linked || links.prev != prev {
                return Err(format!("{:?} list: broken back link at slot {}", self.kind, id.index()));
            }
            if links.next.is_none() && self.tail != Some(id) {
                return Err(format!("{:?} list: tail mismatch", self.kind));
            }

            prev = Some(id);
            current = links.next;
            count += 1;
            if count > self.len {
                return Err(format!("{:?} list: longer than recorded len {}", self.kind, self.len));
            }
        }

        if count != self.len {
            return Err(format!(
                "{:?} list: walked {count} nodes, recorded len {}",
                self.kind, self.len
            ));
        }
        Ok(())
    }
}

/// Iterator over SlotIds from head to tail.
pub struct IntrusiveListIdIter<'a, N> {
    arena: &'a SlotArena<N>,
    kind: ListKind,
    current: Option<SlotId>,
}

impl<'a, N: Linked> Iterator for IntrusiveListIdIter<'a, N> {
    type Item = SlotId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.arena.get(id)?;
        self.current = node.links(self.kind).next;
        Some(id)
    }
}
