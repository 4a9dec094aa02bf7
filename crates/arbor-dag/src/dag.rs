//! Commit graph structure and traversal algorithms.
//!
//! # Invariants
//!
//! - Every parent of a node in the graph is also in the graph.
//! - Commit ids are unique.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use arbor_store::ObjectStore;
use arbor_types::ObjectId;
use tracing::debug;

use crate::error::{DagError, DagResult};
use crate::node::CommitNode;

/// The commit history reachable from a set of tips.
#[derive(Clone, Debug, Default)]
pub struct CommitGraph {
    nodes: HashMap<ObjectId, CommitNode>,
    /// Forward-edge index: parent -> children.
    children: HashMap<ObjectId, Vec<ObjectId>>,
}

impl CommitGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every commit reachable from `tips`.
    pub fn load(store: &dyn ObjectStore, tips: &[ObjectId]) -> DagResult<Self> {
        let mut graph = Self::new();
        graph.extend(store, tips)?;
        Ok(graph)
    }

    /// Load any commits reachable from `tips` that are not yet in the graph.
    pub fn extend(&mut self, store: &dyn ObjectStore, tips: &[ObjectId]) -> DagResult<()> {
        let mut queue: VecDeque<ObjectId> = tips.iter().copied().collect();
        let mut loaded = Vec::new();
        while let Some(id) = queue.pop_front() {
            if self.nodes.contains_key(&id) {
                continue;
            }
            let object = store.read(&id)?.ok_or(DagError::CommitNotFound(id))?;
            let commit = arbor_store::CommitObject::from_stored_object(&id, object)?;
            let node = CommitNode::from_commit(id, &commit);
            queue.extend(node.parents.iter().copied());
            self.nodes.insert(id, node);
            loaded.push(id);
        }
        for id in &loaded {
            for parent in &self.nodes[id].parents {
                self.children.entry(*parent).or_default().push(*id);
            }
        }
        debug!(loaded = loaded.len(), total = self.nodes.len(), "commit graph extended");
        Ok(())
    }

    /// Add a single commit whose parents are already present.
    pub fn add_node(&mut self, node: CommitNode) -> DagResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(DagError::DuplicateNode(node.id));
        }
        if let Some(parent) = node.parents.iter().find(|p| !self.nodes.contains_key(p)) {
            return Err(DagError::DanglingParent {
                node: node.id,
                parent: *parent,
            });
        }
        for parent in &node.parents {
            self.children.entry(*parent).or_default().push(node.id);
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Look up a loaded commit.
    pub fn get(&self, id: &ObjectId) -> Option<&CommitNode> {
        self.nodes.get(id)
    }

    /// Returns `true` if the commit was loaded into the graph.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of commits in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no commit was loaded.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: &ObjectId) -> DagResult<&CommitNode> {
        self.nodes.get(id).ok_or(DagError::CommitNotFound(*id))
    }

    /// `id` and everything reachable through its parents.
    pub fn ancestors_inclusive(&self, id: &ObjectId) -> DagResult<HashSet<ObjectId>> {
        self.node(id)?;
        Ok(self.reachable_from([*id]))
    }

    fn reachable_from(&self, start: impl IntoIterator<Item = ObjectId>) -> HashSet<ObjectId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ObjectId> = start.into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.parents.iter().copied());
            }
        }
        visited
    }

    /// Returns `true` if `ancestor` is `descendant` or reachable from it.
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> DagResult<bool> {
        self.node(ancestor)?;
        Ok(self.ancestors_inclusive(descendant)?.contains(ancestor))
    }

    /// Best common ancestor of `a` and `b`.
    ///
    /// Candidates are the common ancestors that are not themselves ancestors
    /// of another common ancestor. With several candidates (criss-cross
    /// history) the most recently committed wins, then the greatest id.
    /// `None` means the histories are unrelated.
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> DagResult<Option<ObjectId>> {
        let ancestors_a = self.ancestors_inclusive(a)?;
        let ancestors_b = self.ancestors_inclusive(b)?;
        let common: Vec<&CommitNode> = ancestors_a
            .intersection(&ancestors_b)
            .filter_map(|id| self.nodes.get(id))
            .collect();

        let dominated =
            self.reachable_from(common.iter().flat_map(|n| n.parents.iter().copied()));
        let base = common
            .into_iter()
            .filter(|n| !dominated.contains(&n.id))
            .max_by_key(|n| n.age_key())
            .map(|n| n.id);

        debug!(a = %a.short_hex(), b = %b.short_hex(), base = ?base, "merge base");
        Ok(base)
    }

    /// Commits reachable from `tip` but not from `base`, parents before
    /// children, oldest first among commits that are ready at the same time.
    pub fn commits_to_replay(
        &self,
        tip: &ObjectId,
        base: Option<&ObjectId>,
    ) -> DagResult<Vec<ObjectId>> {
        let mut pending = self.ancestors_inclusive(tip)?;
        if let Some(base) = base {
            for id in self.ancestors_inclusive(base)? {
                pending.remove(&id);
            }
        }

        let mut in_degree: HashMap<ObjectId, usize> = pending
            .iter()
            .map(|id| {
                let parents = &self.nodes[id].parents;
                (*id, parents.iter().filter(|p| pending.contains(p)).count())
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<_>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| Reverse(self.nodes[id].age_key()))
            .collect();

        let mut order = Vec::with_capacity(pending.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            for child in self.children.get(&id).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(self.nodes[child].age_key()));
                    }
                }
            }
        }
        Ok(order)
    }
}
