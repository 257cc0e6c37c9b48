//! The branch tree: a forest of forked branches over the disk chain.
//!
//! Branches live in an arena keyed by [`BranchId`]; a branch's parent is an
//! index, never a pointer, so promotion and re-parenting are index updates.
//! Every non-root branch's tail sits exactly on a knot (height + hash) of
//! its parent chain; the root of the forest is the persisted disk chain
//! behind the [`DiskRoot`] trait.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::PoolError;
use trellis_ledger::{AccountBlock, SnapshotBlock, VmAccountBlock};
use trellis_types::Hash;

/// The height/hash/prev view the tree needs of a block.
pub trait PoolBlock: Clone + Send + Sync {
    fn height(&self) -> u64;
    fn hash(&self) -> Hash;
    fn prev_hash(&self) -> Hash;
}

impl PoolBlock for AccountBlock {
    fn height(&self) -> u64 {
        self.height
    }

    fn hash(&self) -> Hash {
        self.hash
    }

    fn prev_hash(&self) -> Hash {
        self.prev_hash
    }
}

impl PoolBlock for SnapshotBlock {
    fn height(&self) -> u64 {
        self.height
    }

    fn hash(&self) -> Hash {
        self.hash
    }

    fn prev_hash(&self) -> Hash {
        self.prev_hash
    }
}

impl PoolBlock for VmAccountBlock {
    fn height(&self) -> u64 {
        self.block.height
    }

    fn hash(&self) -> Hash {
        self.block.hash
    }

    fn prev_hash(&self) -> Hash {
        self.block.prev_hash
    }
}

/// The persisted chain at the root of the forest.
pub trait DiskRoot<B: PoolBlock>: Send + Sync {
    /// Height and hash of the persisted head.
    fn head_hh(&self) -> Result<(u64, Hash), PoolError>;

    /// The persisted block at `height`, if any.
    fn knot(&self, height: u64) -> Result<Option<B>, PoolError>;

    /// Append promoted blocks. Implementations commit the whole slice in a
    /// single store batch.
    fn append(&self, blocks: Vec<B>) -> Result<(), PoolError>;
}

/// Index of a branch in the tree's arena.
pub type BranchId = usize;

pub(crate) struct BranchNode<B> {
    id: String,
    /// `None` means anchored directly on the disk root.
    parent: Option<BranchId>,
    tail_height: u64,
    tail_hash: Hash,
    head_height: u64,
    head_hash: Hash,
    /// Blocks owned by this branch, heights in `(tail, head]`.
    blocks: BTreeMap<u64, B>,
}

/// A forest of branches; exactly one branch (*main*) is the candidate for
/// promotion to the disk chain.
pub struct BranchTree<B: PoolBlock> {
    pool_id: String,
    disk: Arc<dyn DiskRoot<B>>,
    branches: Vec<Option<BranchNode<B>>>,
    main: BranchId,
    id_seq: u32,
}

impl<B: PoolBlock> BranchTree<B> {
    /// Create the tree with an empty main branch anchored at the disk head.
    pub fn new(pool_id: impl Into<String>, disk: Arc<dyn DiskRoot<B>>) -> Result<Self, PoolError> {
        let pool_id = pool_id.into();
        let (head_height, head_hash) = disk.head_hh()?;
        let main_node = BranchNode {
            id: format!("{pool_id}-0"),
            parent: None,
            tail_height: head_height,
            tail_hash: head_hash,
            head_height,
            head_hash,
            blocks: BTreeMap::new(),
        };
        Ok(Self {
            pool_id,
            disk,
            branches: vec![Some(main_node)],
            main: 0,
            id_seq: 1,
        })
    }

    pub fn disk(&self) -> &Arc<dyn DiskRoot<B>> {
        &self.disk
    }

    pub fn main(&self) -> BranchId {
        self.main
    }

    /// Live branch ids, main first.
    pub fn branches(&self) -> Vec<BranchId> {
        let mut ids = vec![self.main];
        ids.extend(
            self.branches
                .iter()
                .enumerate()
                .filter(|(id, node)| node.is_some() && *id != self.main)
                .map(|(id, _)| id),
        );
        ids
    }

    pub fn branch_name(&self, branch: BranchId) -> Result<&str, PoolError> {
        Ok(&self.node(branch)?.id)
    }

    pub fn head_hh(&self, branch: BranchId) -> Result<(u64, Hash), PoolError> {
        let node = self.node(branch)?;
        Ok((node.head_height, node.head_hash))
    }

    pub fn tail_hh(&self, branch: BranchId) -> Result<(u64, Hash), PoolError> {
        let node = self.node(branch)?;
        Ok((node.tail_height, node.tail_hash))
    }

    pub fn parent(&self, branch: BranchId) -> Result<Option<BranchId>, PoolError> {
        Ok(self.node(branch)?.parent)
    }

    /// The branch with the greatest head height (ties favour main) — the
    /// candidate under the longest-branch rule.
    pub fn longest(&self) -> BranchId {
        let mut best = self.main;
        let mut best_height = self
            .node(self.main)
            .map(|n| n.head_height)
            .unwrap_or_default();
        for (id, node) in self.branches.iter().enumerate() {
            if let Some(node) = node {
                if node.head_height > best_height {
                    best = id;
                    best_height = node.head_height;
                }
            }
        }
        best
    }

    // ── Growth ──────────────────────────────────────────────────────────

    /// Append a block to a branch head. The block must chain directly:
    /// `prev_hash` equal to the head hash, height one above it.
    pub fn add_head(&mut self, branch: BranchId, block: B) -> Result<(), PoolError> {
        let node = self.node_mut(branch)?;
        if block.prev_hash() != node.head_hash || block.height() != node.head_height + 1 {
            return Err(PoolError::HeadMismatch(format!(
                "branch {} head is ({}, {}), block is ({}, prev {})",
                node.id,
                node.head_height,
                node.head_hash,
                block.height(),
                block.prev_hash()
            )));
        }
        node.head_height = block.height();
        node.head_hash = block.hash();
        node.blocks.insert(block.height(), block);
        Ok(())
    }

    /// Remove and return the head block. `None` when the branch is empty.
    pub fn remove_head(&mut self, branch: BranchId) -> Result<Option<B>, PoolError> {
        let node = self.node_mut(branch)?;
        if node.head_height == node.tail_height {
            return Ok(None);
        }
        let block = node.blocks.remove(&node.head_height).ok_or_else(|| {
            PoolError::Inconsistent(format!("branch {} missing its head block", node.id))
        })?;
        node.head_height -= 1;
        node.head_hash = if node.head_height == node.tail_height {
            node.tail_hash
        } else {
            match node.blocks.get(&node.head_height) {
                Some(b) => b.hash(),
                None => {
                    return Err(PoolError::Inconsistent(format!(
                        "branch {} has a gap below its head",
                        node.id
                    )))
                }
            }
        };
        Ok(Some(block))
    }

    /// The block at `height`, looked up on the branch itself or — with
    /// `include_parent` — by walking parent pointers down to the disk root.
    pub fn get_knot(
        &self,
        branch: BranchId,
        height: u64,
        include_parent: bool,
    ) -> Result<Option<B>, PoolError> {
        let mut visited = HashSet::new();
        let mut current = branch;
        loop {
            let node = self.node(current)?;
            if height > node.tail_height {
                return Ok(node.blocks.get(&height).cloned());
            }
            if !include_parent {
                return Ok(None);
            }
            if !visited.insert(current) {
                return Err(PoolError::Inconsistent(
                    "cycle while walking branch parents".into(),
                ));
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return self.disk.knot(height),
            }
        }
    }

    /// Spawn a new branch anchored at a knot reachable from `parent`.
    pub fn fork_branch(
        &mut self,
        parent: BranchId,
        tail_height: u64,
        tail_hash: Hash,
    ) -> Result<BranchId, PoolError> {
        let anchored = match self.get_knot(parent, tail_height, true)? {
            Some(block) => block.hash() == tail_hash,
            None => self.tail_hh(parent)? == (tail_height, tail_hash),
        };
        if !anchored {
            return Err(PoolError::InvalidBranch(format!(
                "fork anchor ({tail_height}, {tail_hash}) not reachable from branch {parent}"
            )));
        }

        let id = self.id_seq;
        self.id_seq += 1;
        let node = BranchNode {
            id: format!("{}-{}", self.pool_id, id),
            parent: Some(parent),
            tail_height,
            tail_hash,
            head_height: tail_height,
            head_hash: tail_hash,
            blocks: BTreeMap::new(),
        };
        self.branches.push(Some(node));
        Ok(self.branches.len() - 1)
    }

    /// Drop an empty, childless branch from the arena.
    pub fn remove_branch(&mut self, branch: BranchId) -> Result<(), PoolError> {
        if branch == self.main {
            return Err(PoolError::InvalidBranch("cannot remove main".into()));
        }
        let has_children = self.branches.iter().flatten().any(|n| n.parent == Some(branch));
        if has_children {
            return Err(PoolError::InvalidBranch(
                "cannot remove a branch with children".into(),
            ));
        }
        let node = self.node(branch)?;
        if node.head_height != node.tail_height {
            return Err(PoolError::InvalidBranch(
                "cannot remove a non-empty branch".into(),
            ));
        }
        self.branches[branch] = None;
        Ok(())
    }

    // ── Promotion support ───────────────────────────────────────────────

    /// Detach the blocks `(tail, to_height]` from a root-anchored branch
    /// and advance its tail to `to_height`. The caller persists them.
    pub(crate) fn detach_tail_segment(
        &mut self,
        branch: BranchId,
        to_height: u64,
    ) -> Result<Vec<B>, PoolError> {
        let node = self.node_mut(branch)?;
        if node.parent.is_some() {
            return Err(PoolError::InvalidBranch(
                "only a root-anchored branch can be promoted".into(),
            ));
        }
        if to_height <= node.tail_height || to_height > node.head_height {
            return Err(PoolError::InvalidBranch(format!(
                "promotion height {} outside ({}, {}]",
                to_height, node.tail_height, node.head_height
            )));
        }
        let heights: Vec<u64> = node
            .blocks
            .range(node.tail_height + 1..=to_height)
            .map(|(h, _)| *h)
            .collect();
        let mut moved = Vec::with_capacity(heights.len());
        for height in heights {
            if let Some(block) = node.blocks.remove(&height) {
                moved.push(block);
            }
        }
        let new_tail_hash = moved
            .last()
            .map(|b| b.hash())
            .ok_or_else(|| PoolError::Inconsistent("promotion moved no blocks".into()))?;
        node.tail_height = to_height;
        node.tail_hash = new_tail_hash;
        Ok(moved)
    }

    /// Lower a root-anchored branch's tail to `(height, hash)` after the
    /// disk chain rolled back beneath it.
    pub(crate) fn lower_tail(
        &mut self,
        branch: BranchId,
        height: u64,
        hash: Hash,
    ) -> Result<(), PoolError> {
        let node = self.node_mut(branch)?;
        if height > node.tail_height {
            return Err(PoolError::Inconsistent(
                "tail can only move downward".into(),
            ));
        }
        if !node.blocks.is_empty() {
            // A suffix reaching below the tail covers every in-tree block.
            return Err(PoolError::Inconsistent(
                "cannot lower the tail under pending blocks".into(),
            ));
        }
        node.tail_height = height;
        node.tail_hash = hash;
        node.head_height = height;
        node.head_hash = hash;
        Ok(())
    }

    // ── Re-rooting ──────────────────────────────────────────────────────

    /// Make `target` the main branch.
    ///
    /// Walks the parent path `main ← … ← target` and reverses it edge by
    /// edge: at each step the child absorbs the parent's blocks below the
    /// child's anchor, the parent re-anchors on the child, and siblings
    /// whose knots moved are re-parented. Cycle detection guards the walk.
    pub fn switch_main_to(&mut self, target: BranchId) -> Result<(), PoolError> {
        if target == self.main {
            return Ok(());
        }
        self.node(target)?;

        // Collect the parent path target → … → root-anchored branch.
        let mut path = vec![target];
        let mut visited: HashSet<BranchId> = path.iter().copied().collect();
        let mut current = target;
        while let Some(parent) = self.node(current)?.parent {
            if !visited.insert(parent) {
                return Err(PoolError::Inconsistent(
                    "cycle while walking branch parents".into(),
                ));
            }
            path.push(parent);
            current = parent;
        }
        if current != self.main {
            return Err(PoolError::Inconsistent(format!(
                "branch {target} does not descend from main"
            )));
        }

        // Reverse each edge from the main end outward.
        path.reverse();
        for pair in path.windows(2) {
            self.modify_refer(pair[0], pair[1])?;
        }
        self.main = target;
        tracing::debug!(main = %self.node(target)?.id, "switched main branch");
        Ok(())
    }

    /// Reverse one parent/child edge: `to` (child of `from`) takes over
    /// `from`'s blocks below `to`'s anchor and `from`'s own anchor; `from`
    /// becomes a child of `to` at `to`'s old anchor.
    fn modify_refer(&mut self, from: BranchId, to: BranchId) -> Result<(), PoolError> {
        let (mut from_node, mut to_node) = self.take_pair(from, to)?;
        if to_node.parent != Some(from) {
            self.put_pair(from, from_node, to, to_node);
            return Err(PoolError::Inconsistent(
                "modify_refer on a non-adjacent pair".into(),
            ));
        }

        let to_old_tail = (to_node.tail_height, to_node.tail_hash);

        // The child absorbs (from.tail, to.tail].
        let moved: Vec<u64> = from_node
            .blocks
            .range(from_node.tail_height + 1..=to_old_tail.0)
            .map(|(h, _)| *h)
            .collect();
        for height in moved {
            if let Some(block) = from_node.blocks.remove(&height) {
                to_node.blocks.insert(height, block);
            }
        }

        to_node.tail_height = from_node.tail_height;
        to_node.tail_hash = from_node.tail_hash;
        to_node.parent = from_node.parent;

        from_node.tail_height = to_old_tail.0;
        from_node.tail_hash = to_old_tail.1;
        from_node.parent = Some(to);
        if from_node.blocks.is_empty() {
            from_node.head_height = from_node.tail_height;
            from_node.head_hash = from_node.tail_hash;
        }

        self.put_pair(from, from_node, to, to_node);

        // Siblings anchored on knots that moved follow them to `to`. (`to`
        // itself now points at `from`'s old parent and `from` at `to`, so
        // only true siblings still carry `Some(from)`.)
        for node in self.branches.iter_mut().flatten() {
            if node.parent == Some(from) && node.tail_height <= to_old_tail.0 {
                node.parent = Some(to);
            }
        }
        Ok(())
    }

    // ── Consistency ─────────────────────────────────────────────────────

    /// Verify the forest invariants: main is root-anchored, every branch
    /// reaches main by parent pointers without cycles, and every tail
    /// anchors on a real knot.
    pub fn check(&self) -> Result<(), PoolError> {
        let main_node = self.node(self.main)?;
        if main_node.parent.is_some() {
            return Err(PoolError::Inconsistent("main has a parent".into()));
        }

        for (id, node) in self.branches.iter().enumerate() {
            let Some(node) = node else { continue };

            if node.head_height < node.tail_height {
                return Err(PoolError::Inconsistent(format!(
                    "branch {} head below tail",
                    node.id
                )));
            }

            match node.parent {
                None => {
                    if id != self.main {
                        return Err(PoolError::Inconsistent(format!(
                            "branch {} is root-anchored but not main",
                            node.id
                        )));
                    }
                    match self.disk.knot(node.tail_height)? {
                        Some(block) => {
                            if block.hash() != node.tail_hash {
                                return Err(PoolError::Inconsistent(format!(
                                    "branch {} tail does not match the disk chain",
                                    node.id
                                )));
                            }
                        }
                        None => {
                            if self.disk.head_hh()? != (node.tail_height, node.tail_hash) {
                                return Err(PoolError::Inconsistent(format!(
                                    "branch {} tail anchors on no disk knot",
                                    node.id
                                )));
                            }
                        }
                    }
                }
                Some(parent) => {
                    let anchored = match self.get_knot(parent, node.tail_height, true)? {
                        Some(block) => block.hash() == node.tail_hash,
                        None => self.tail_hh(parent)? == (node.tail_height, node.tail_hash),
                    };
                    if !anchored {
                        return Err(PoolError::Inconsistent(format!(
                            "branch {} tail anchors on no knot of its parent",
                            node.id
                        )));
                    }
                }
            }

            // Reachability: parent pointers must lead to main, acyclically.
            let mut visited = HashSet::new();
            let mut current = id;
            loop {
                if !visited.insert(current) {
                    return Err(PoolError::Inconsistent(format!(
                        "cycle through branch {}",
                        node.id
                    )));
                }
                match self.node(current)?.parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            if current != self.main {
                return Err(PoolError::Inconsistent(format!(
                    "branch {} does not reach main",
                    node.id
                )));
            }
        }
        Ok(())
    }

    // ── Arena plumbing ──────────────────────────────────────────────────

    fn node(&self, branch: BranchId) -> Result<&BranchNode<B>, PoolError> {
        self.branches
            .get(branch)
            .and_then(|n| n.as_ref())
            .ok_or_else(|| PoolError::InvalidBranch(format!("branch {branch} is not live")))
    }

    fn node_mut(&mut self, branch: BranchId) -> Result<&mut BranchNode<B>, PoolError> {
        self.branches
            .get_mut(branch)
            .and_then(|n| n.as_mut())
            .ok_or_else(|| PoolError::InvalidBranch(format!("branch {branch} is not live")))
    }

    fn take_pair(
        &mut self,
        a: BranchId,
        b: BranchId,
    ) -> Result<(BranchNode<B>, BranchNode<B>), PoolError> {
        if a == b {
            return Err(PoolError::Inconsistent("branch paired with itself".into()));
        }
        let node_a = self
            .branches
            .get_mut(a)
            .and_then(Option::take)
            .ok_or_else(|| PoolError::InvalidBranch(format!("branch {a} is not live")))?;
        let node_b = match self.branches.get_mut(b).and_then(Option::take) {
            Some(node) => node,
            None => {
                self.branches[a] = Some(node_a);
                return Err(PoolError::InvalidBranch(format!("branch {b} is not live")));
            }
        };
        Ok((node_a, node_b))
    }

    fn put_pair(&mut self, a: BranchId, node_a: BranchNode<B>, b: BranchId, node_b: BranchNode<B>) {
        self.branches[a] = Some(node_a);
        self.branches[b] = Some(node_b);
    }
}
