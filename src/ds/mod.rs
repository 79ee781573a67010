//! Building blocks for the sharded cache: a stable-index arena, intrusive
//! lists that thread through its nodes, and string-id shard selection.

pub mod intrusive_list;
pub mod shard;
pub mod slot_arena;

pub use intrusive_list::{IntrusiveList, Linked, Links, ListKind};
pub use shard::{ShardSelector, default_shard_count, fnv1a_32};
pub use slot_arena::{SlotArena, SlotId};
