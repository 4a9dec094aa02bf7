//! Named references into the Arbor commit history.
//!
//! - **Branches** are mutable pointers to a commit. Merge, rebase and
//!   cherry-pick advance them with [`RefStore::compare_and_swap`], which
//!   refuses the update if somebody else moved the branch in the meantime.
//! - **Tags** are immutable pointers to a commit.
//! - **HEAD** names the current branch or a detached commit.

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use memory::InMemoryRefStore;
pub use names::{validate_branch_name, validate_tag_name};
pub use traits::RefStore;
pub use types::{branch_ref_name, tag_ref_name, Head, Ref};
