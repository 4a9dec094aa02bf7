//! Three-way structural merge for Arbor.
//!
//! [`MergeComparer`] combines two one-sided change sets taken against a
//! common ancestor into a conflict-aware [`MergeChangeSet`]. The
//! [`Merge`], [`Rebase`] and [`CherryPick`] orchestrators locate the
//! ancestor, drive the comparison step by step, expose conflicts for
//! [`Resolution`] and commit the accepted result.
//!
//! # Key Types
//!
//! - [`MergeComparer`] -- Classifies paths touched by either side
//! - [`MergeChangeSet`] / [`MergeChange`] / [`Conflict`] -- Merge result and its conflicts
//! - [`Merge`] -- Merge another commit into a branch
//! - [`Rebase`] -- Replay a branch onto another commit, one commit at a time
//! - [`CherryPick`] -- Apply one commit's change to a branch

pub mod change;
pub mod cherry_pick;
pub mod comparer;
mod engine;
pub mod error;
pub mod merge;
pub mod rebase;

#[cfg(test)]
mod fixtures;

pub use change::{
    Conflict, ItemMergeStatus, MergeChange, MergeChangeSet, Origin, Resolution,
};
pub use cherry_pick::{CherryPick, CherryPickStatus};
pub use comparer::MergeComparer;
pub use error::{MergeError, MergeResult};
pub use merge::{Merge, MergeStatus};
pub use rebase::{Rebase, RebaseStatus};
