//! Project item data model.
//!
//! # Responsibility
//! - Define handles, item records and the snapshot record shape.
//! - Keep item data free of tree structure; the tree owns all relations.
//!
//! # Invariants
//! - Every item is identified by a stable `Handle`.
//! - Parent and root references are handle lookups, never ownership.

pub mod handle;
pub mod item;
