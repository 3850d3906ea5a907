//! The trie itself: `get`/`put`/`checkout_at`/`garbage_collect` over a
//! [`Database`].

use std::collections::HashSet;
use std::sync::Arc;

use tessera_crypto::Hash;

use crate::database::{Database, StoredNode};
use crate::node::{bit_at, first_diff_bit, Node};

#[derive(Debug, thiserror::Error)]
pub enum TrieError {
    #[error("trie node {0} referenced but missing from the backend")]
    MissingNode(Hash),
    #[error("malformed trie node encoding: {0}")]
    Malformed(#[from] tessera_codec::CodecError),
}

type Result<T> = std::result::Result<T, TrieError>;

/// An immutable view over one root of a [`Database`]-backed trie. Cloning
/// is cheap — it copies only the `Arc<D>` and the 32-byte root (/// "Pollers hold references to snapshots by value ... not pointers into
/// the writer's working set").
pub struct MerkleTrie<D: Database> {
    db: Arc<D>,
    root: Hash,
}

impl<D: Database> Clone for MerkleTrie<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            root: self.root,
        }
    }
}

impl<D: Database> MerkleTrie<D> {
    /// A fresh, empty trie over `db` ("An all-zero root denotes
    /// the empty trie").
    pub fn new(db: Arc<D>) -> Self {
        Self { db, root: Hash::zero() }
    }

    /// Opens a view at a previously observed root.
    pub fn checkout_at(db: Arc<D>, root: Hash) -> Self {
        Self { db, root }
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    fn load(&self, hash: &Hash) -> Result<Node> {
        let stored = self.db.get(hash).ok_or(TrieError::MissingNode(*hash))?;
        Ok(Node::decode(&stored.bytes)?)
    }

    pub fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>> {
        if self.root.is_zero() {
            return Ok(None);
        }
        let mut current = self.root;
        loop {
            match self.load(&current)? {
                Node::Leaf { key: leaf_key, value } => {
                    return Ok(if &leaf_key == key { Some(value) } else { None });
                }
                Node::Branch { bit_index, left, right, .. } => {
                    current = if bit_at(key, bit_index) { right } else { left };
                }
            }
        }
    }

    fn store(&self, node: Node, commit: u64) -> Hash {
        let hash = node.content_hash();
        self.db.put(hash, StoredNode { commit, bytes: node.encode() });
        hash
    }

    /// Inserts or overwrites `key`, returning a new trie view with a fresh
    /// root ("`put(key, value) → new trie view with a fresh
    /// root`"). Existing nodes are left untouched — only the path from the
    /// root to the insertion point is rewritten, all tagged with `commit`.
    pub fn put(&self, key: Hash, value: Vec<u8>, commit: u64) -> Result<Self> {
        let new_root = if self.root.is_zero() {
            self.store(Node::Leaf { key, value }, commit)
        } else {
            self.put_rec(self.root, key, value, commit)?
        };
        Ok(Self {
            db: self.db.clone(),
            root: new_root,
        })
    }

    fn put_rec(&self, node_hash: Hash, key: Hash, value: Vec<u8>, commit: u64) -> Result<Hash> {
        match self.load(&node_hash)? {
            Node::Leaf { key: leaf_key, .. } if leaf_key == key => {
                Ok(self.store(Node::Leaf { key, value }, commit))
            }
            Node::Leaf { key: leaf_key, .. } => {
                // `first_diff_bit` cannot be `None` here: the keys differ.
                let diff_bit = first_diff_bit(&leaf_key, &key).expect("distinct leaf keys must differ");
                let new_leaf = self.store(Node::Leaf { key, value }, commit);
                let (left, right) = if bit_at(&key, diff_bit) {
                    (node_hash, new_leaf)
                } else {
                    (new_leaf, node_hash)
                };
                Ok(self.store(
                    Node::Branch {
                        bit_index: diff_bit,
                        sample_key: key,
                        left,
                        right,
                    },
                    commit,
                ))
            }
            Node::Branch {
                bit_index,
                sample_key,
                left,
                right,
            } => {
                let diff_bit = first_diff_bit(&sample_key, &key);
                match diff_bit {
                    Some(diff) if diff < bit_index => {
                        // The new key diverges from this subtree before the
                        // subtree's own branching point: insert a new branch
                        // above, splitting between the new leaf and the
                        // entire (unchanged) existing subtree.
                        let new_leaf = self.store(Node::Leaf { key, value }, commit);
                        let (new_left, new_right) = if bit_at(&key, diff) {
                            (node_hash, new_leaf)
                        } else {
                            (new_leaf, node_hash)
                        };
                        Ok(self.store(
                            Node::Branch {
                                bit_index: diff,
                                sample_key: key,
                                left: new_left,
                                right: new_right,
                            },
                            commit,
                        ))
                    }
                    _ => {
                        // Either the new key agrees with the sample through
                        // `bit_index` (diff is deeper, or the keys coincide
                        // up to here and diverge exactly at `bit_index`):
                        // descend via the ordinary branch decision.
                        let (new_left, new_right) = if bit_at(&key, bit_index) {
                            (left, self.put_rec(right, key, value, commit)?)
                        } else {
                            (self.put_rec(left, key, value, commit)?, right)
                        };
                        Ok(self.store(
                            Node::Branch {
                                bit_index,
                                sample_key,
                                left: new_left,
                                right: new_right,
                            },
                            commit,
                        ))
                    }
                }
            }
        }
    }

    /// Removes every node whose last-touch commit is `stale_commit` and
    /// that is unreachable from any of `retained_roots`.
    /// Returns the number of nodes removed.
    pub fn garbage_collect(&self, retained_roots: &[Hash], stale_commit: u64) -> Result<usize> {
        let candidates = self.db.keys_with_commit(stale_commit);
        if candidates.is_empty() {
            return Ok(0);
        }
        let mut reachable = HashSet::new();
        for root in retained_roots {
            self.mark_reachable(*root, &mut reachable)?;
        }
        let mut removed = 0;
        for candidate in candidates {
            if !reachable.contains(&candidate) {
                self.db.remove(&candidate);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn mark_reachable(&self, hash: Hash, visited: &mut HashSet<Hash>) -> Result<()> {
        if hash.is_zero() || !visited.insert(hash) {
            return Ok(());
        }
        if let Node::Branch { left, right, .. } = self.load(&hash)? {
            self.mark_reachable(left, visited)?;
            self.mark_reachable(right, visited)?;
        }
        Ok(())
    }
}
