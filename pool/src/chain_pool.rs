//! The chain pool: snippet ingestion, promotion and rollback over a
//! [`BranchTree`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PoolError;
use crate::snippet::Snippet;
use crate::tree::{BranchId, BranchTree, DiskRoot, PoolBlock};

/// How `fork2` classified a snippet against the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fork2 {
    /// A matching knot was found but the snippet does not extend the
    /// branch head — a child branch must be spawned.
    pub forky: bool,
    /// The snippet chains directly onto the branch head.
    pub insertable: bool,
    /// The branch the snippet anchors on.
    pub branch: BranchId,
}

/// Outcome of ingesting one snippet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ingest {
    /// Appended onto an existing branch head.
    Appended(BranchId),
    /// Spawned a new branch off the matched knot.
    Forked(BranchId),
    /// Anchors on nothing known yet; kept for retry.
    Deferred,
}

/// Owns a branch tree, ingests snippets, selects the current branch and
/// hands promotion segments to the disk root.
pub struct ChainPool<B: PoolBlock> {
    pool_id: String,
    tree: BranchTree<B>,
    /// Snippets whose anchor is not known yet, by snippet id.
    snippets: HashMap<String, Snippet<B>>,
}

impl<B: PoolBlock> ChainPool<B> {
    pub fn new(pool_id: impl Into<String>, disk: Arc<dyn DiskRoot<B>>) -> Result<Self, PoolError> {
        let pool_id = pool_id.into();
        let tree = BranchTree::new(pool_id.clone(), disk)?;
        Ok(Self {
            pool_id,
            tree,
            snippets: HashMap::new(),
        })
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn tree(&self) -> &BranchTree<B> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut BranchTree<B> {
        &mut self.tree
    }

    /// Pending snippets that have not linked yet.
    pub fn deferred_count(&self) -> usize {
        self.snippets.len()
    }

    // ── Classification ──────────────────────────────────────────────────

    /// Classify how a snippet relates to the existing tree.
    ///
    /// Walks main first, then every other branch, looking for the knot the
    /// snippet's tail points at (`tail.height`, matching hash). The snippet
    /// is `insertable` when that knot is the branch head itself; `forky`
    /// when the knot sits below the head. With no match anywhere — the disk
    /// root included, via the parent walk — the result is
    /// [`PoolError::NotFound`].
    pub fn fork2(&self, snippet: &Snippet<B>) -> Result<Fork2, PoolError> {
        let (tail_height, tail_hash) = snippet.tail_hh();

        for branch in self.tree.branches() {
            if self.tree.head_hh(branch)? == (tail_height, tail_hash) {
                return Ok(Fork2 {
                    forky: false,
                    insertable: true,
                    branch,
                });
            }
            let matched = match self.tree.get_knot(branch, tail_height, true)? {
                Some(block) => block.hash() == tail_hash,
                None => false,
            };
            if matched {
                return Ok(Fork2 {
                    forky: true,
                    insertable: false,
                    branch,
                });
            }
        }
        Err(PoolError::NotFound)
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Integrate a snippet: append it, fork a new branch for it, or defer
    /// it until its anchor arrives.
    pub fn add_snippet(&mut self, snippet: Snippet<B>) -> Result<Ingest, PoolError> {
        match self.fork2(&snippet) {
            Ok(fork) if fork.insertable => {
                for block in snippet.into_blocks() {
                    self.tree.add_head(fork.branch, block)?;
                }
                Ok(Ingest::Appended(fork.branch))
            }
            Ok(fork) => {
                let (tail_height, tail_hash) = snippet.tail_hh();
                let new_branch = self.tree.fork_branch(fork.branch, tail_height, tail_hash)?;
                for block in snippet.into_blocks() {
                    self.tree.add_head(new_branch, block)?;
                }
                tracing::debug!(
                    pool = %self.pool_id,
                    branch = new_branch,
                    "forked new branch for snippet"
                );
                Ok(Ingest::Forked(new_branch))
            }
            Err(PoolError::NotFound) => {
                tracing::debug!(pool = %self.pool_id, id = snippet.id(), "snippet deferred");
                self.snippets.insert(snippet.id().to_string(), snippet);
                Ok(Ingest::Deferred)
            }
            Err(err) => Err(err),
        }
    }

    /// Retry deferred snippets until a pass links none of them.
    pub fn retry_deferred(&mut self) -> Result<Vec<(String, Ingest)>, PoolError> {
        let mut outcomes = Vec::new();
        loop {
            let mut progressed = false;
            let ids: Vec<String> = self.snippets.keys().cloned().collect();
            for id in ids {
                let Some(snippet) = self.snippets.remove(&id) else {
                    continue;
                };
                match self.add_snippet(snippet)? {
                    Ingest::Deferred => {}
                    outcome => {
                        progressed = true;
                        outcomes.push((id, outcome));
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        Ok(outcomes)
    }

    // ── Promotion ───────────────────────────────────────────────────────

    /// Move `(branch.tail, to_height]` from a root-anchored branch onto the
    /// disk chain. The disk root commits the segment in a single store
    /// batch; only then does the branch tail advance.
    pub fn write_to_chain(&mut self, branch: BranchId, to_height: u64) -> Result<(), PoolError> {
        let blocks = self.tree.detach_tail_segment(branch, to_height)?;
        let count = blocks.len();
        if let Err(err) = self.tree.disk().append(blocks) {
            // The tree segment is already detached; surface the failure
            // rather than guessing at a re-attach.
            return Err(PoolError::Inconsistent(format!(
                "disk append failed after detaching {count} blocks: {err}"
            )));
        }
        tracing::debug!(pool = %self.pool_id, branch, to_height, count, "promoted to disk");
        Ok(())
    }

    /// Re-root main so that `target` becomes the candidate branch.
    pub fn current_modify_to_chain(&mut self, target: BranchId) -> Result<(), PoolError> {
        self.tree.switch_main_to(target)?;
        self.tree.check()
    }

    /// The branch the longest-branch rule selects.
    pub fn longest(&self) -> BranchId {
        self.tree.longest()
    }

    // ── Rollback ────────────────────────────────────────────────────────

    /// Remove `blocks` — which must form a suffix of main's view, ascending
    /// by height and ending at main's head — from the tree. Blocks below
    /// main's tail were already persisted; the caller reverts their store
    /// state. Returns [`PoolError::Reorg`] when the suffix does not match.
    pub fn rollback_current(&mut self, blocks: &[B]) -> Result<(), PoolError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };
        let main = self.tree.main();
        let (head_height, head_hash) = self.tree.head_hh(main)?;
        if last.height() != head_height || last.hash() != head_hash {
            return Err(PoolError::Reorg(format!(
                "suffix ends at ({}, {}), main head is ({}, {})",
                last.height(),
                last.hash(),
                head_height,
                head_hash
            )));
        }
        for pair in blocks.windows(2) {
            if pair[1].prev_hash() != pair[0].hash() || pair[1].height() != pair[0].height() + 1 {
                return Err(PoolError::Reorg("suffix is not hash-chained".into()));
            }
        }

        let (tail_height, _) = self.tree.tail_hh(main)?;
        let first = &blocks[0];

        // Drop the in-tree part of the suffix from the head down.
        let in_tree = blocks.iter().filter(|b| b.height() > tail_height).count();
        for _ in 0..in_tree {
            self.tree.remove_head(main)?;
        }

        // The persisted part moves the anchor down with the disk rollback.
        if first.height() <= tail_height {
            self.tree
                .lower_tail(main, first.height() - 1, first.prev_hash())?;
        }
        Ok(())
    }

    /// Verify the tree invariants.
    pub fn check(&self) -> Result<(), PoolError> {
        self.tree.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_chain, mock_hash, MockBlock, MockRoot};
    use trellis_types::Hash;

    fn snippet_of(id: &str, blocks: Vec<MockBlock>) -> Snippet<MockBlock> {
        Snippet::from_blocks(id, blocks).unwrap()
    }

    #[test]
    fn straight_insert_at_empty_root() {
        // Empty tree: main tail = head = 0, anchored at (0, zero).
        let pool = ChainPool::new("p", MockRoot::new()).unwrap();
        let snippet = snippet_of("s1", mock_chain(b's', 1, 3, Hash::ZERO));

        let fork = pool.fork2(&snippet).unwrap();
        assert!(!fork.forky);
        assert!(fork.insertable);
        assert_eq!(fork.branch, pool.tree().main());
    }

    #[test]
    fn forkable_snippet_at_mid_knot() {
        // Main runs 0..11: disk 1..=5, in-tree 6..=11.
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let main = pool.tree().main();
        for block in mock_chain(b'm', 6, 11, mock_hash(b'r', 5)) {
            pool.tree_mut().add_head(main, block).unwrap();
        }

        // Snippet anchored at the knot at height 5.
        let snippet = snippet_of("s1", mock_chain(b's', 6, 8, mock_hash(b'r', 5)));
        let fork = pool.fork2(&snippet).unwrap();
        assert!(fork.forky);
        assert!(!fork.insertable);
        assert_eq!(fork.branch, main);
    }

    #[test]
    fn unknown_anchor_is_not_found() {
        let pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let snippet = snippet_of("s1", mock_chain(b's', 9, 10, mock_hash(b'z', 8)));
        assert!(matches!(pool.fork2(&snippet), Err(PoolError::NotFound)));
    }

    #[test]
    fn add_snippet_appends_and_forks() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let main = pool.tree().main();

        // Extend main directly.
        let extend = snippet_of("s1", mock_chain(b'm', 6, 9, mock_hash(b'r', 5)));
        assert_eq!(pool.add_snippet(extend).unwrap(), Ingest::Appended(main));
        assert_eq!(
            pool.tree().head_hh(main).unwrap(),
            (9, mock_hash(b'm', 9))
        );

        // A competing run off the knot at 7 forks.
        let compete = snippet_of("s2", mock_chain(b'c', 8, 12, mock_hash(b'm', 7)));
        let outcome = pool.add_snippet(compete).unwrap();
        let Ingest::Forked(forked) = outcome else {
            panic!("expected fork, got {outcome:?}");
        };
        assert_eq!(pool.tree().tail_hh(forked).unwrap(), (7, mock_hash(b'm', 7)));
        assert_eq!(
            pool.tree().head_hh(forked).unwrap(),
            (12, mock_hash(b'c', 12))
        );
        pool.check().unwrap();
        assert_eq!(pool.longest(), forked);
    }

    #[test]
    fn deferred_snippet_links_after_gap_fills() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let main = pool.tree().main();

        // 8..10 cannot link yet: the anchor (7) is unknown.
        let late = snippet_of("late", mock_chain(b'm', 8, 10, mock_hash(b'm', 7)));
        assert_eq!(pool.add_snippet(late).unwrap(), Ingest::Deferred);
        assert_eq!(pool.deferred_count(), 1);

        // The gap 6..7 arrives.
        let early = snippet_of("early", mock_chain(b'm', 6, 7, mock_hash(b'r', 5)));
        assert_eq!(pool.add_snippet(early).unwrap(), Ingest::Appended(main));

        let outcomes = pool.retry_deferred().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0], ("late".to_string(), Ingest::Appended(main)));
        assert_eq!(pool.deferred_count(), 0);
        assert_eq!(
            pool.tree().head_hh(main).unwrap(),
            (10, mock_hash(b'm', 10))
        );
    }

    #[test]
    fn write_to_chain_moves_segment_to_disk() {
        let root = MockRoot::new();
        let mut pool = ChainPool::new("p", root.clone()).unwrap();
        let main = pool.tree().main();
        for block in mock_chain(b'm', 1, 5, Hash::ZERO) {
            pool.tree_mut().add_head(main, block).unwrap();
        }

        pool.write_to_chain(main, 3).unwrap();

        use crate::tree::DiskRoot;
        assert_eq!(root.head_hh().unwrap(), (3, mock_hash(b'm', 3)));
        assert_eq!(pool.tree().tail_hh(main).unwrap(), (3, mock_hash(b'm', 3)));
        assert_eq!(pool.tree().head_hh(main).unwrap(), (5, mock_hash(b'm', 5)));
        // The promoted knot is still reachable through the root.
        let knot = pool.tree().get_knot(main, 2, true).unwrap().unwrap();
        assert_eq!(knot.hash, mock_hash(b'm', 2));
        pool.check().unwrap();
    }

    #[test]
    fn write_to_chain_rejects_forked_branch() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let main = pool.tree().main();
        for block in mock_chain(b'm', 6, 9, mock_hash(b'r', 5)) {
            pool.tree_mut().add_head(main, block).unwrap();
        }
        let fork = pool
            .tree_mut()
            .fork_branch(main, 7, mock_hash(b'm', 7))
            .unwrap();
        for block in mock_chain(b'f', 8, 10, mock_hash(b'm', 7)) {
            pool.tree_mut().add_head(fork, block).unwrap();
        }

        assert!(pool.write_to_chain(fork, 9).is_err());
    }

    #[test]
    fn reorg_to_longer_fork() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 5)).unwrap();
        let main = pool.tree().main();
        for block in mock_chain(b'm', 6, 10, mock_hash(b'r', 5)) {
            pool.tree_mut().add_head(main, block).unwrap();
        }
        let fork = pool
            .tree_mut()
            .fork_branch(main, 8, mock_hash(b'm', 8))
            .unwrap();
        for block in mock_chain(b'f', 9, 15, mock_hash(b'm', 8)) {
            pool.tree_mut().add_head(fork, block).unwrap();
        }

        assert_eq!(pool.longest(), fork);
        pool.current_modify_to_chain(fork).unwrap();
        assert_eq!(pool.tree().main(), fork);
        pool.check().unwrap();
    }

    #[test]
    fn rollback_suffix_from_head() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 2)).unwrap();
        let main = pool.tree().main();
        let blocks = mock_chain(b'm', 3, 6, mock_hash(b'r', 2));
        for block in blocks.clone() {
            pool.tree_mut().add_head(main, block).unwrap();
        }

        pool.rollback_current(&blocks[2..]).unwrap();
        assert_eq!(pool.tree().head_hh(main).unwrap(), (4, mock_hash(b'm', 4)));
        pool.check().unwrap();
    }

    #[test]
    fn rollback_through_promoted_tail() {
        let root = MockRoot::new();
        let mut pool = ChainPool::new("p", root).unwrap();
        let main = pool.tree().main();
        let blocks = mock_chain(b'm', 1, 5, Hash::ZERO);
        for block in blocks.clone() {
            pool.tree_mut().add_head(main, block).unwrap();
        }
        pool.write_to_chain(main, 3).unwrap();

        // Revert 2..=5: two in-tree blocks plus two persisted ones.
        pool.rollback_current(&blocks[1..]).unwrap();
        assert_eq!(pool.tree().tail_hh(main).unwrap(), (1, mock_hash(b'm', 1)));
        assert_eq!(pool.tree().head_hh(main).unwrap(), (1, mock_hash(b'm', 1)));
    }

    #[test]
    fn rollback_rejects_non_suffix() {
        let mut pool = ChainPool::new("p", MockRoot::with_chain(b'r', 2)).unwrap();
        let main = pool.tree().main();
        let blocks = mock_chain(b'm', 3, 6, mock_hash(b'r', 2));
        for block in blocks.clone() {
            pool.tree_mut().add_head(main, block).unwrap();
        }

        // 3..=4 is a prefix of the pending range, not a suffix.
        assert!(matches!(
            pool.rollback_current(&blocks[..2]),
            Err(PoolError::Reorg(_))
        ));
        // A disconnected run is rejected too.
        let stray = mock_chain(b'z', 5, 6, mock_hash(b'z', 4));
        assert!(matches!(
            pool.rollback_current(&stray),
            Err(PoolError::Reorg(_))
        ));
    }
}
