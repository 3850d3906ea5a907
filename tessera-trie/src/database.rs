//! The transactional key/value backend the trie is built over (//! "a generic key→value trie over a transactional key/value backend").
//! This crate treats the backend as opaque storage for content-addressed
//! node bytes tagged with the commit number that last wrote them — the
//! minimum contract `garbage_collect` needs ("Each trie
//! node records the commit number that last touched it").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_crypto::Hash;

/// A node's serialized bytes plus the commit number that wrote them.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StoredNode {
    pub commit: u64,
    pub bytes: Vec<u8>,
}

/// The storage contract the trie is generic over. Implementations need not
/// be in-process; no particular underlying key/value database engine is
/// assumed.
pub trait Database: Send + Sync {
    fn get(&self, hash: &Hash) -> Option<StoredNode>;
    fn put(&self, hash: Hash, node: StoredNode);
    fn remove(&self, hash: &Hash);
    /// All node hashes whose stored commit number equals `commit` — the
    /// candidate set `garbage_collect` inspects for reachability.
    fn keys_with_commit(&self, commit: u64) -> Vec<Hash>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory `Database`, grounded on the teacher's in-process
/// `TemporaryDB` — a reference backend for tests and for nodes that do not
/// need cross-restart persistence.
#[derive(Default)]
pub struct MemoryDatabase {
    nodes: RwLock<HashMap<Hash, StoredNode>>,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Database for MemoryDatabase {
    fn get(&self, hash: &Hash) -> Option<StoredNode> {
        self.nodes.read().get(hash).cloned()
    }

    fn put(&self, hash: Hash, node: StoredNode) {
        self.nodes.write().insert(hash, node);
    }

    fn remove(&self, hash: &Hash) {
        self.nodes.write().remove(hash);
    }

    fn keys_with_commit(&self, commit: u64) -> Vec<Hash> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, node)| node.commit == commit)
            .map(|(hash, _)| *hash)
            .collect()
    }

    fn len(&self) -> usize {
        self.nodes.read().len()
    }
}
