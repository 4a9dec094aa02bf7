//! Commit graph for Arbor.
//!
//! [`CommitGraph`] is loaded from the object store by walking parent links
//! from a set of tips. It answers the history questions the merge
//! orchestrators need: the best common ancestor of two commits, whether
//! one commit is reachable from another, and which commits a rebase must
//! replay in which order.

pub mod dag;
pub mod error;
pub mod node;

pub use dag::CommitGraph;
pub use error::{DagError, DagResult};
pub use node::CommitNode;
