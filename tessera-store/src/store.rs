//! The store: persists committed responses, object histories,
//! delivery-time rejection causes, and node-wide info, behind a single
//! observable [`StoreRoot`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use tessera_codec::{CodecError, Reader, Writer};
use tessera_crypto::{hash, Hash};
use tessera_trie::{Database, MerkleTrie, TrieError};
use tessera_types::{Response, StorageReference, TransactionReference, Update};

use crate::root::StoreRoot;
use crate::transaction::StoreTransaction;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn history_key(object: StorageReference) -> Hash {
    let mut bytes = Vec::with_capacity(40);
    bytes.extend_from_slice(object.transaction.as_bytes());
    bytes.extend_from_slice(&object.progressive.to_be_bytes());
    hash(&bytes)
}

pub(crate) fn tr_key(tr: TransactionReference) -> Hash {
    hash(tr.as_bytes())
}

const MANIFEST_KEY_SEED: &[u8] = b"tessera-store:manifest";
const COMMIT_NUMBER_KEY_SEED: &[u8] = b"tessera-store:commit-number";

pub(crate) fn manifest_key() -> Hash {
    hash(MANIFEST_KEY_SEED)
}

pub(crate) fn commit_number_key() -> Hash {
    hash(COMMIT_NUMBER_KEY_SEED)
}

/// Replaces a jar-store response's inline jar bytes with their content hash
/// before persisting, so identical jars across transactions share one
/// side-object ("extracts the instrumented-jar bytes ... into
/// a content-addressed side object ... deduplicating across transactions").
pub(crate) fn strip_jar_for_storage(response: Response) -> (Response, Option<(Hash, Vec<u8>)>) {
    match response {
        Response::JarStoreInitial { instrumented_jar, dependencies } => {
            let digest = hash(&instrumented_jar);
            (
                Response::JarStoreInitial {
                    instrumented_jar: digest.as_bytes().to_vec(),
                    dependencies,
                },
                Some((digest, instrumented_jar)),
            )
        }
        Response::JarStoreSuccessful {
            updates,
            gas_consumed,
            instrumented_jar,
            dependencies,
        } => {
            let digest = hash(&instrumented_jar);
            (
                Response::JarStoreSuccessful {
                    updates,
                    gas_consumed,
                    instrumented_jar: digest.as_bytes().to_vec(),
                    dependencies,
                },
                Some((digest, instrumented_jar)),
            )
        }
        other => (other, None),
    }
}

/// The inverse of [`strip_jar_for_storage`]: rehydrates a response read
/// back from the trie by resolving its jar-hash stand-in through the
/// content-addressed side store.
fn rehydrate_jar<D: Database>(response: Response, jars: &D) -> Response {
    let resolve = |digest_bytes: Vec<u8>| -> Vec<u8> {
        if digest_bytes.len() != 32 {
            return digest_bytes;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest_bytes);
        jars.get(&Hash::new(arr)).map(|n| n.bytes).unwrap_or(digest_bytes)
    };
    match response {
        Response::JarStoreInitial { instrumented_jar, dependencies } => Response::JarStoreInitial {
            instrumented_jar: resolve(instrumented_jar),
            dependencies,
        },
        Response::JarStoreSuccessful {
            updates,
            gas_consumed,
            instrumented_jar,
            dependencies,
        } => Response::JarStoreSuccessful {
            updates,
            gas_consumed,
            instrumented_jar: resolve(instrumented_jar),
            dependencies,
        },
        other => other,
    }
}

pub(crate) fn encode_history(history: &[TransactionReference]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_array(history, |w, tr| tr.encode_shared(w));
    w.into_bytes()
}

fn decode_history(bytes: &[u8]) -> Result<Vec<TransactionReference>> {
    let mut r = Reader::new(bytes);
    Ok(r.read_array(TransactionReference::decode_shared)?)
}

/// A read-only view of the store at one [`StoreRoot`] (/// "readers use snapshots"). Cheap to clone; holds only `Arc`s and a
/// 32-byte-quadruple root.
pub struct StoreView<D: Database> {
    pub(crate) jars: Arc<D>,
    pub(crate) responses: MerkleTrie<D>,
    pub(crate) info: MerkleTrie<D>,
    pub(crate) history: MerkleTrie<D>,
    pub(crate) errors: MerkleTrie<D>,
}

impl<D: Database> Clone for StoreView<D> {
    fn clone(&self) -> Self {
        Self {
            jars: self.jars.clone(),
            responses: self.responses.clone(),
            info: self.info.clone(),
            history: self.history.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<D: Database> StoreView<D> {
    pub fn root(&self) -> StoreRoot {
        StoreRoot {
            responses: self.responses.root(),
            info: self.info.root(),
            history: self.history.root(),
            errors: self.errors.root(),
        }
    }

    pub fn get_response(&self, tr: TransactionReference) -> Result<Option<Response>> {
        match self.responses.get(&tr_key(tr))? {
            Some(bytes) => {
                let mut r = Reader::new(&bytes);
                let response = Response::decode(&mut r)?;
                Ok(Some(rehydrate_jar(response, &*self.jars)))
            }
            None => Ok(None),
        }
    }

    pub fn get_error(&self, tr: TransactionReference) -> Result<Option<String>> {
        match self.errors.get(&tr_key(tr))? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    /// The stored history sequence for `object`, with the defining
    /// transaction appended ("the history never stores the
    /// final TR ... so `get_history(o)` returns the stored sequence with
    /// `o.transaction` appended").
    pub fn get_history(&self, object: StorageReference) -> Result<Vec<TransactionReference>> {
        let mut sequence = match self.history.get(&history_key(object))? {
            Some(bytes) => decode_history(&bytes)?,
            None => Vec::new(),
        };
        sequence.push(object.transaction);
        Ok(sequence)
    }

    /// Only the stored prefix, with no TR appended — used internally to
    /// build the next staged sequence from the current one.
    pub(crate) fn get_stored_history_prefix(&self, object: StorageReference) -> Result<Vec<TransactionReference>> {
        match self.history.get(&history_key(object))? {
            Some(bytes) => decode_history(&bytes),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_manifest(&self) -> Result<Option<StorageReference>> {
        match self.info.get(&manifest_key())? {
            Some(bytes) if bytes.len() == 40 => {
                let mut tr_bytes = [0u8; 32];
                tr_bytes.copy_from_slice(&bytes[0..32]);
                let mut progressive_bytes = [0u8; 8];
                progressive_bytes.copy_from_slice(&bytes[32..40]);
                Ok(Some(StorageReference::new(
                    TransactionReference::new(Hash::new(tr_bytes)),
                    u64::from_be_bytes(progressive_bytes),
                )))
            }
            _ => Ok(None),
        }
    }

    pub fn get_commit_number(&self) -> Result<u64> {
        match self.info.get(&commit_number_key())? {
            Some(bytes) if bytes.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(arr))
            }
            _ => Ok(0),
        }
    }

    /// Coalesces `object`'s full update history into one stream, newest
    /// update per `(field, kind)` wins ("`get_state(object)`
    /// walks `get_history(object)`, accumulating updates by property,
    /// newest-first wins ... returning the coalesced stream").
    ///
    /// The stored prefix accumulates new updates by appending, oldest
    /// after creation first, so the newest update is its last entry; the
    /// creating transaction itself is never stored there, only recovered
    /// as `object.transaction`. Walking newest-first therefore
    /// means the stored prefix in reverse, with the creating transaction
    /// visited last — not a plain reversal of `get_history`'s output,
    /// which places the creating transaction first.
    pub fn get_state(&self, object: StorageReference) -> Result<Vec<Update>> {
        let stored_prefix = self.get_stored_history_prefix(object)?;
        let mut order: Vec<TransactionReference> = stored_prefix.into_iter().rev().collect();
        order.push(object.transaction);

        let mut seen_fields = HashSet::new();
        let mut seen_class_tag = false;
        let mut coalesced = Vec::new();

        for tr in order {
            let Some(response) = self.get_response(tr)? else { continue };
            for update in response.updates() {
                if update.object() != object {
                    continue;
                }
                match update {
                    Update::ClassTag { .. } => {
                        if seen_class_tag {
                            continue;
                        }
                        seen_class_tag = true;
                    }
                    Update::Field { field, .. } => {
                        if !seen_fields.insert(field.clone()) {
                            continue;
                        }
                    }
                }
                coalesced.push(update.clone());
            }
        }

        coalesced.sort();
        Ok(coalesced)
    }
}

/// Retention policy for trie garbage collection ("`0` enables
/// immediate collection on each new commit; a positive `k` retains the
/// last `k` committed roots; `-1` disables GC entirely").
#[derive(Clone, Copy, Debug)]
pub enum CheckableDepth {
    Immediate,
    Retain(usize),
    Disabled,
}

impl CheckableDepth {
    pub fn from_i64(value: i64) -> Self {
        match value {
            i if i < 0 => Self::Disabled,
            0 => Self::Immediate,
            k => Self::Retain(k as usize),
        }
    }
}

/// The store: one writer serialized by `write_lock`, many lock-free
/// readers snapshotting `current` ("No reader is ever blocked
/// by a writer").
pub struct Store<D: Database> {
    pub(crate) db: Arc<D>,
    pub(crate) jars: Arc<D>,
    current: RwLock<StoreRoot>,
    write_lock: parking_lot::Mutex<()>,
    retained: RwLock<VecDeque<StoreRoot>>,
    checkable_depth: CheckableDepth,
}

impl<D: Database> Store<D> {
    pub fn new(db: Arc<D>, jars: Arc<D>, checkable_depth: CheckableDepth) -> Self {
        Self {
            db,
            jars,
            current: RwLock::new(StoreRoot::zero()),
            write_lock: parking_lot::Mutex::new(()),
            retained: RwLock::new(VecDeque::new()),
            checkable_depth,
        }
    }

    fn view_at(&self, root: StoreRoot) -> StoreView<D> {
        StoreView {
            jars: self.jars.clone(),
            responses: MerkleTrie::checkout_at(self.db.clone(), root.responses),
            info: MerkleTrie::checkout_at(self.db.clone(), root.info),
            history: MerkleTrie::checkout_at(self.db.clone(), root.history),
            errors: MerkleTrie::checkout_at(self.db.clone(), root.errors),
        }
    }

    /// A snapshot of the last committed state.
    pub fn view(&self) -> StoreView<D> {
        self.view_at(*self.current.read())
    }

    pub fn root(&self) -> StoreRoot {
        *self.current.read()
    }

    /// Opens a view at a specific previously observed root.
    pub fn checkout(&self, root: StoreRoot) -> StoreView<D> {
        self.view_at(root)
    }

    /// Opens a staging transaction over the last committed state.
    pub fn begin_transaction(&self, now: i64) -> StoreTransaction<D> {
        StoreTransaction::new(self.view(), now)
    }

    /// Commits a staging transaction built by `begin_transaction`, sealing
    /// its writes into this store. The public entry point a node-level
    /// caller uses to close out a delivery or a block; `abort()`ing the
    /// transaction instead discards it with no call here at all.
    pub fn commit_transaction(&self, txn: StoreTransaction<D>) -> Result<StoreRoot> {
        self.commit(txn.into_view())
    }

    /// Atomically commits a transaction's staged writes, advancing
    /// `current` and running GC per the retention policy (/// "`commit()` atomically produces a new store whose roots reflect
    /// all writes"). Crate-internal: external callers go through
    /// `commit_transaction`, which also consumes the `StoreTransaction`
    /// wrapper itself rather than a bare view.
    pub(crate) fn commit(&self, view: StoreView<D>) -> Result<StoreRoot> {
        let _guard = self.write_lock.lock();
        let new_root = view.root();
        // `StoreTransaction::new` stages the next commit number into the
        // info trie before any other write, so by the time a view reaches
        // here it already carries its own commit number.
        let commit_number = view.get_commit_number()?;

        *self.current.write() = new_root;
        log::info!("committed commit {commit_number} (root {new_root:?})");

        match self.checkable_depth {
            CheckableDepth::Disabled => {}
            CheckableDepth::Immediate => {
                if commit_number > 0 {
                    self.run_gc(&[new_root], commit_number - 1, &view)?;
                }
            }
            CheckableDepth::Retain(k) => {
                let mut retained = self.retained.write();
                retained.push_back(new_root);
                while retained.len() > k + 1 {
                    retained.pop_front();
                }
                let roots: Vec<StoreRoot> = retained.iter().copied().collect();
                drop(retained);
                if commit_number > k as u64 {
                    let stale = commit_number - k as u64 - 1;
                    self.run_gc(&roots, stale, &view)?;
                }
            }
        }

        Ok(new_root)
    }

    fn run_gc(&self, retained_roots: &[StoreRoot], stale_commit: u64, view: &StoreView<D>) -> Result<()> {
        log::debug!("running gc for stale commit {stale_commit}, retaining {} roots", retained_roots.len());
        let responses_roots: Vec<Hash> = retained_roots.iter().map(|r| r.responses).collect();
        let info_roots: Vec<Hash> = retained_roots.iter().map(|r| r.info).collect();
        let history_roots: Vec<Hash> = retained_roots.iter().map(|r| r.history).collect();
        let errors_roots: Vec<Hash> = retained_roots.iter().map(|r| r.errors).collect();

        view.responses.garbage_collect(&responses_roots, stale_commit)?;
        view.info.garbage_collect(&info_roots, stale_commit)?;
        view.history.garbage_collect(&history_roots, stale_commit)?;
        view.errors.garbage_collect(&errors_roots, stale_commit)?;
        Ok(())
    }
}

impl<D: Database> Clone for Store<D> {
    fn clone(&self) -> Self {
        // Only ever used to share a handle across threads; the lock state
        // itself is never copied, each clone gets its own uncontended
        // locks over the same underlying tries.
        Self {
            db: self.db.clone(),
            jars: self.jars.clone(),
            current: RwLock::new(*self.current.read()),
            write_lock: parking_lot::Mutex::new(()),
            retained: RwLock::new(self.retained.read().clone()),
            checkable_depth: self.checkable_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use tessera_trie::MemoryDatabase;
    use tessera_types::{Cause, GasConsumed};

    fn tr(byte: u8) -> TransactionReference {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TransactionReference::new(Hash::new(bytes))
    }

    fn sr(byte: u8, progressive: u64) -> StorageReference {
        StorageReference::new(tr(byte), progressive)
    }

    fn store() -> Store<MemoryDatabase> {
        Store::new(MemoryDatabase::new(), MemoryDatabase::new(), CheckableDepth::Disabled)
    }

    #[test]
    fn fresh_store_has_zero_root_and_no_manifest() {
        let store = store();
        assert_eq!(store.root(), StoreRoot::zero());
        assert_eq!(store.view().get_manifest().unwrap(), None);
        assert_eq!(store.view().get_commit_number().unwrap(), 0);
    }

    #[test]
    fn jar_store_response_dedups_through_the_side_store() {
        let store = store();
        let mut txn = store.begin_transaction(0);
        let response = Response::JarStoreInitial {
            instrumented_jar: vec![0xDE, 0xAD, 0xBE, 0xEF],
            dependencies: vec![],
        };
        txn.set_response(tr(1), response.clone()).unwrap();
        let root = store.commit(txn.into_view()).unwrap();
        let view = store.checkout(root);

        let reread = view.get_response(tr(1)).unwrap().unwrap();
        assert_eq!(reread, response);
        // the jar bytes live in the side store, not inline in the trie.
        let digest = hash(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(store.jars.get(&digest).is_some());
    }

    #[test]
    fn history_appends_the_defining_transaction() {
        let store = store();
        let object = sr(1, 0);
        let mut txn = store.begin_transaction(0);
        txn.set_history(object, vec![]).unwrap();
        let root = store.commit(txn.into_view()).unwrap();
        let view = store.checkout(root);
        assert_eq!(view.get_history(object).unwrap(), vec![tr(1)]);
    }

    #[test]
    fn get_state_coalesces_newest_update_per_field() {
        let store = store();
        let object = sr(1, 0);
        let field = crate::ledger::balance_field();

        let mut txn1 = store.begin_transaction(0);
        txn1.set_response(
            tr(1),
            Response::ConstructorCallSuccessful {
                updates: vec![
                    Update::class_tag(object, "io.tessera.Account", tr(1)),
                    Update::field(object, field.clone(), tessera_types::FieldValue::BigInteger(BigInt::from(100))),
                ],
                events: vec![],
                gas_consumed: GasConsumed::new(BigInt::from(0), BigInt::from(0), BigInt::from(0)),
                new_object: object,
                self_charged: false,
            },
        )
        .unwrap();
        txn1.set_history(object, vec![]).unwrap();
        let root1 = store.commit(txn1.into_view()).unwrap();

        let store_view_after_first = store.checkout(root1);
        let mut txn2 = store.begin_transaction(0);
        // simulate a second transaction updating the same object.
        txn2.set_response(
            tr(2),
            Response::VoidMethodCallSuccessful {
                updates: vec![Update::field(
                    object,
                    field.clone(),
                    tessera_types::FieldValue::BigInteger(BigInt::from(40)),
                )],
                events: vec![],
                gas_consumed: GasConsumed::new(BigInt::from(0), BigInt::from(0), BigInt::from(0)),
                self_charged: false,
            },
        )
        .unwrap();
        let prior_history = store_view_after_first.get_stored_history_prefix(object).unwrap();
        let mut new_history = prior_history;
        new_history.push(tr(2));
        txn2.set_history(object, new_history).unwrap();
        let root2 = store.commit(txn2.into_view()).unwrap();

        let view = store.checkout(root2);
        let state = view.get_state(object).unwrap();
        let balance = crate::ledger::big_integer_field(&state, &field);
        assert_eq!(balance, BigInt::from(40));
        // the class-tag from the first transaction is still present.
        assert!(state.iter().any(|u| matches!(u, Update::ClassTag { .. })));
    }

    #[test]
    fn error_cache_round_trips_a_rejection_message() {
        let store = store();
        let mut txn = store.begin_transaction(0);
        txn.set_error(tr(1), "bad signature").unwrap();
        let root = store.commit(txn.into_view()).unwrap();
        let view = store.checkout(root);
        assert_eq!(view.get_error(tr(1)).unwrap(), Some("bad signature".to_string()));
    }

    #[test]
    fn unrelated_cause_roundtrips_through_decode() {
        let cause = Cause::new("java.lang.Exception", "boom", "");
        assert_eq!(cause.message_of_cause, "boom");
    }
}
