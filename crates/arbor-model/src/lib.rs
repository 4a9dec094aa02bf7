//! Typed node trees on top of the Arbor object store.
//!
//! A [`Schema`] registers every node type once: its tree folder, ordered
//! modifiable properties and allowed children. Nodes are stored as blobs
//! at `{parentFolder}/{TypeFolder}/{id}/{id}.json`; resources attached to a
//! node live under its `Resources` folder.
//!
//! Snapshots are read through the [`TreeSource`] trait, implemented by the
//! lazy [`StoreSnapshot`] (one commit's tree) and the in-memory arena
//! [`Snapshot`]. Changes go the other way as [`Transform`]s applied to a
//! [`TreeDefinition`] by [`Repository::commit`].

pub mod config;
pub mod error;
pub mod node;
pub mod policy;
pub mod repository;
pub mod schema;
pub mod serializer;
pub mod snapshot;
pub mod source;
pub mod store_snapshot;
pub mod transform;
pub mod tree_def;

pub use config::{Identity, RepositoryConfig};
pub use error::{ModelError, ModelResult};
pub use node::{Link, Node, Resource, TreeItem};
pub use policy::ComparisonPolicy;
pub use repository::{BranchUpdate, CommitRequest, Repository};
pub use schema::{PropertyDescriptor, PropertyKind, Schema, SchemaBuilder, TypeDescriptor};
pub use serializer::{JsonNodeSerializer, NodeSerializer};
pub use snapshot::Snapshot;
pub use source::{ChildEntry, SiblingKey, TreeSource};
pub use store_snapshot::StoreSnapshot;
pub use transform::Transform;
pub use tree_def::{ApplyContext, TreeDefinition};
