//! Declaration nodes: named, reusable blocks referenced by identity.
//!
//! A [`DeclarationNode`] never evaluates to a value. It publishes a stable
//! node ID and the current declaration body so that dependents can
//! instantiate copies of it. The [`DeclarationIndex`] keeps one node per ID
//! across reloads and swaps bodies in place when their source text changes.

mod index;
mod node;


pub use self::index::{DeclarationIndex, SyncReport};
pub use self::node::{Declaration, DeclarationNode};
