//! Domain logic that spans more than one table.
//!
//! Every function here is generic over the `db::*Ext` traits it touches, so
//! handlers pass the real `DBClient` and tests pass `memory::MemoryStore`.

pub mod comment_tree;
pub mod likes;
pub mod reconcile;
pub mod tags;

#[cfg(test)]
pub mod memory;
