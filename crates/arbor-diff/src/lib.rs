//! Structural diff engine for Arbor.
//!
//! Compares two tree snapshots property by property and produces a
//! [`ChangeCollection`] of added, deleted and modified items.
//!
//! # Key Types
//!
//! - [`Comparer`] -- Synchronized walk of two snapshots
//! - [`ChangeCollection`] / [`Change`] / [`PropertyChange`] -- One-sided change set

pub mod change;
pub mod comparer;
pub mod error;

pub use change::{
    content_bytes, content_value, Change, ChangeCollection, ChangeKind, PropertyChange,
    RESOURCE_CONTENT,
};
pub use comparer::Comparer;
pub use error::{DiffError, DiffResult};
