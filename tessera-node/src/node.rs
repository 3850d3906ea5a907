//! The node: the outward face of the engine (§4.H). Submits requests,
//! hashes them to their transaction reference, coordinates semaphore-gated
//! polling, runs the mempool callback protocol (`check` → `deliver` →
//! `commit_block`), and republishes events to subscribers once a block
//! commits.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use num_bigint::BigInt;
use parking_lot::Mutex;

use tessera_crypto::SignatureAlgorithm;
use tessera_engine::{Engine, EngineError, Sandbox};
use tessera_store::{DeliveryContext, DeliveryOutcome, RejectionReason, Store, StoreError, StoreTransaction, StoreView};
use tessera_trie::Database;
use tessera_types::{Request, Response, StorageReference, TransactionReference};

use crate::config::NodeConfig;
use crate::events::{EventHandler, EventRegistry, SubscriptionId};
use crate::mempool::{Mempool, MempoolError};
use crate::semaphore::SemaphoreRegistry;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("no response or error is recorded for this transaction reference")]
    UnknownReference,
    #[error("the node has not yet been initialized (no manifest installed)")]
    Uninitialized,
    #[error("timed out waiting for a polled response")]
    Timeout,
    #[error("interrupted while waiting for a polled response")]
    Interrupted,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Derives the event creator convention documented on
/// [`crate::events::EventRegistry`] from the request/response pair that
/// produced the events.
fn event_creator(request: &Request, response: &Response) -> Option<StorageReference> {
    match response {
        Response::ConstructorCallSuccessful { new_object, .. } => Some(*new_object),
        _ => match request {
            Request::InstanceMethodCall { receiver, .. } => Some(*receiver),
            _ => None,
        },
    }
}

/// One request's outcome staged within the currently open block, waiting
/// for `commit_block` to make it observable.
enum PendingOutcome {
    Delivered {
        tr: TransactionReference,
        creator: Option<StorageReference>,
        response: Response,
    },
    Rejected {
        tr: TransactionReference,
    },
}

/// The staging transaction backing the block currently being delivered,
/// plus the outcomes accumulated so far within it.
struct InProgressBlock<D: Database> {
    txn: StoreTransaction<D>,
    pending: Vec<PendingOutcome>,
}

/// Node-wide parameters that do not change once the node starts
/// ("the node's chain-id", gas-price floor, per-transaction gas cap).
pub struct NodeParameters {
    pub chain_id: String,
    pub current_gas_price: BigInt,
    pub gas_limit_cap: BigInt,
}

/// The public node API (§4.H, §6). Generic over the trie backend, the
/// sandbox implementation, and the mempool collaborator, so a host can
/// plug in its own persistence, bytecode runtime, and consensus source
/// without this crate depending on any of them concretely.
pub struct Node<D: Database, S: Sandbox, M: Mempool> {
    store: Store<D>,
    sandbox: S,
    mempool: M,
    signature_algorithm: Box<dyn SignatureAlgorithm>,
    config: NodeConfig,
    parameters: NodeParameters,
    semaphores: SemaphoreRegistry,
    events: EventRegistry,
    recently_rejected: Mutex<lru::LruCache<TransactionReference, String>>,
    in_progress: Mutex<Option<InProgressBlock<D>>>,
}

impl<D: Database, S: Sandbox, M: Mempool> Node<D, S, M> {
    pub fn new(
        db: Arc<D>,
        jars: Arc<D>,
        sandbox: S,
        mempool: M,
        signature_algorithm: Box<dyn SignatureAlgorithm>,
        config: NodeConfig,
        parameters: NodeParameters,
    ) -> Self {
        let checkable_depth = config.checkable_depth();
        let response_cache_size = config.response_cache_size.max(1);
        Self {
            store: Store::new(db, jars, checkable_depth),
            sandbox,
            mempool,
            signature_algorithm,
            config,
            parameters,
            semaphores: SemaphoreRegistry::new(),
            events: EventRegistry::new(),
            recently_rejected: Mutex::new(lru::LruCache::new(response_cache_size)),
            in_progress: Mutex::new(None),
        }
    }

    fn delivery_context(&self) -> DeliveryContext<'_> {
        DeliveryContext {
            chain_id: &self.parameters.chain_id,
            current_gas_price: &self.parameters.current_gas_price,
            gas_limit_cap: &self.parameters.gas_limit_cap,
            signature_algorithm: self.signature_algorithm.as_ref(),
        }
    }

    // -- submission -------------------------------------------------

    /// Hashes `request`, registers a semaphore for its transaction
    /// reference, posts it to the mempool, and returns the reference
    /// immediately ("returns TR immediately to the caller").
    pub fn submit_request(&self, request: Request) -> Result<TransactionReference, NodeError> {
        let tr = request.transaction_reference();
        self.semaphores.register(tr);
        self.mempool.post(request)?;
        Ok(tr)
    }

    // -- mempool callback protocol ------------------------------------

    /// Dry-runs `request`'s full delivery against a throwaway staging
    /// transaction that is aborted regardless of outcome
    /// ("a dry-run of the signature/nonce/gas-price prelude
    /// against an aborted staging transaction"). A rejection's message is
    /// cached in the bounded recently-rejected map so pollers see a
    /// deterministic rejection without waiting. An engine-level error
    /// (e.g. the sandbox refusing to load a classpath) is surfaced as-is;
    /// it is not a `RejectionReason`, since the prelude itself passed.
    pub fn check_request(&self, request: &Request) -> Result<(), NodeError> {
        let mut txn = self.store.begin_transaction(now_millis());
        let engine = Engine::new(&self.sandbox);
        let outcome = txn.deliver(request, &self.delivery_context(), &engine);
        txn.abort();

        match outcome? {
            DeliveryOutcome::Delivered(_) => Ok(()),
            DeliveryOutcome::Rejected(reason) => {
                let tr = request.transaction_reference();
                self.recently_rejected.lock().put(tr, reason.to_string());
                Err(NodeError::Rejected(reason.to_string()))
            }
        }
    }

    /// Runs the full six-step delivery protocol for `request` against the
    /// block currently being assembled, opening one if none is in
    /// progress yet. Rejections are staged into the error cache so
    /// `get_response`/`get_polled_response` can observe them once the
    /// block commits ("the cause for requests accepted into
    /// delivery but failing with a rejection message that must be
    /// observable to pollers").
    pub fn deliver_request(&self, request: &Request) -> Result<DeliveryOutcome, NodeError> {
        let tr = request.transaction_reference();
        let mut guard = self.in_progress.lock();
        let block = guard.get_or_insert_with(|| InProgressBlock {
            txn: self.store.begin_transaction(now_millis()),
            pending: Vec::new(),
        });

        let engine = Engine::new(&self.sandbox);
        let outcome = block.txn.deliver(request, &self.delivery_context(), &engine)?;

        match &outcome {
            DeliveryOutcome::Rejected(reason) => {
                block.txn.set_error(tr, reason.to_string())?;
                block.pending.push(PendingOutcome::Rejected { tr });
            }
            DeliveryOutcome::Delivered(response) => {
                let creator = event_creator(request, response);
                block.pending.push(PendingOutcome::Delivered {
                    tr,
                    creator,
                    response: response.clone(),
                });
            }
        }

        Ok(outcome)
    }

    /// Seals the block currently being assembled into the store and
    /// releases every request delivered within it: semaphores are
    /// signaled and events published in delivery order. A block with no
    /// requests in it is a no-op ("implementations may choose to
    /// skip empty commits").
    pub fn commit_block(&self) -> Result<(), NodeError> {
        let block = {
            let mut guard = self.in_progress.lock();
            guard.take()
        };
        let Some(block) = block else { return Ok(()) };

        self.store.commit_transaction(block.txn)?;

        for outcome in block.pending {
            match outcome {
                PendingOutcome::Rejected { tr } => {
                    self.semaphores.signal_and_remove(tr);
                }
                PendingOutcome::Delivered { tr, creator, response } => {
                    self.semaphores.signal_and_remove(tr);
                    for event in response.events() {
                        self.events.publish(creator, *event);
                    }
                }
            }
        }
        Ok(())
    }

    // -- queries --------------------------------------------------------

    fn view(&self) -> StoreView<D> {
        self.store.view()
    }

    /// Returns the stored response for `tr`, or raises rejection /
    /// unknown-reference per §7: "`get_response` returns the
    /// stored response; if the store has a recorded error for that TR it
    /// raises rejection; otherwise raises unknown-reference."
    pub fn get_response(&self, tr: TransactionReference) -> Result<Response, NodeError> {
        let view = self.view();
        if let Some(response) = view.get_response(tr)? {
            return Ok(response);
        }
        if let Some(message) = view.get_error(tr)? {
            return Err(NodeError::Rejected(message));
        }
        if let Some(message) = self.recently_rejected.lock().get(&tr) {
            return Err(NodeError::Rejected(message.clone()));
        }
        Err(NodeError::UnknownReference)
    }

    /// Blocks on `tr`'s semaphore, then polls the store with a capped
    /// retry count and `1.10`x exponential back-off (§4.H, §9). A TR
    /// rejected outright by `check_request` never reaches a block and so
    /// never signals a semaphore; its cached rejection is returned here
    /// immediately rather than blocking on a signal that will never come.
    pub fn get_polled_response(&self, tr: TransactionReference) -> Result<Response, NodeError> {
        match self.get_response(tr) {
            Ok(response) => return Ok(response),
            Err(NodeError::Rejected(message)) => return Err(NodeError::Rejected(message)),
            Err(_) => {}
        }

        if !self.semaphores.wait(tr) {
            return Err(NodeError::Interrupted);
        }

        let mut delay_millis = self.config.polling_delay_millis as f64;
        for _ in 0..self.config.max_polling_attempts {
            match self.get_response(tr) {
                Ok(response) => return Ok(response),
                Err(NodeError::Rejected(message)) => return Err(NodeError::Rejected(message)),
                Err(_) => {}
            }
            std::thread::sleep(std::time::Duration::from_millis(delay_millis as u64));
            delay_millis *= crate::config::POLLING_DELAY_MULTIPLIER;
        }
        Err(NodeError::Timeout)
    }

    pub fn get_history(&self, object: StorageReference) -> Result<Vec<TransactionReference>, NodeError> {
        Ok(self.view().get_history(object)?)
    }

    /// Coalesces `object`'s history into the newest update per field
    /// (§4.H: "`get_state(object)` walks `get_history(object)`,
    /// accumulating updates by property, newest-first wins").
    pub fn get_state(&self, object: StorageReference) -> Result<Vec<tessera_types::Update>, NodeError> {
        Ok(self.view().get_state(object)?)
    }

    pub fn get_manifest(&self) -> Result<StorageReference, NodeError> {
        self.view().get_manifest()?.ok_or(NodeError::Uninitialized)
    }

    // -- event subscriptions ----------------------------------------

    pub fn subscribe_events(&self, creator: Option<StorageReference>, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.events.subscribe(creator, handler)
    }

    pub fn unsubscribe_events(&self, id: SubscriptionId) {
        self.events.unsubscribe(id)
    }

    /// Releases every thread blocked in `get_polled_response` with an
    /// `Interrupted` outcome. Installing this as a process shutdown hook
    /// is left to the host (§9 Open Question: "host-managed
    /// lifecycles are equally valid").
    pub fn close(&self) {
        self.semaphores.close_all();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tessera_crypto::{EmptyAlgorithm, Hash, PublicKey, Signature};
    use tessera_engine::sandbox::{CallEffects, ConstructorOutcome, MethodOutcome, SandboxError};
    use tessera_engine::GasMeter;
    use tessera_trie::MemoryDatabase;
    use tessera_types::{Caller, CodeSignature, StorageType, StorageValue};

    use super::*;
    use crate::mempool::ImmediateMempool;

    fn tr(byte: u8) -> TransactionReference {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TransactionReference::new(Hash::new(bytes))
    }

    fn sr(byte: u8, progressive: u64) -> StorageReference {
        StorageReference::new(tr(byte), progressive)
    }

    struct StubSandbox;

    impl Sandbox for StubSandbox {
        fn verify_and_instrument_jar(
            &self,
            _gas: &mut GasMeter,
            jar: &[u8],
            _dependencies: &[TransactionReference],
        ) -> std::result::Result<Vec<u8>, SandboxError> {
            Ok(jar.to_vec())
        }

        fn enum_class_has_instance_fields(&self, _class_name: &str) -> bool {
            false
        }

        fn load_class(&self, _classpath: TransactionReference, _class_name: &str) -> std::result::Result<(), SandboxError> {
            Ok(())
        }

        fn resolve_method_or_constructor(&self, _signature: &CodeSignature) -> std::result::Result<(), SandboxError> {
            Ok(())
        }

        fn run_constructor(
            &self,
            gas: &mut GasMeter,
            _classpath: TransactionReference,
            _constructor: &CodeSignature,
            _actuals: &[StorageValue],
        ) -> std::result::Result<ConstructorOutcome, SandboxError> {
            gas.charge_gas_for_cpu(&BigInt::from(10)).unwrap();
            let new_object = sr(2, 0);
            let event = sr(3, 0);
            Ok(ConstructorOutcome {
                new_object,
                effects: CallEffects {
                    objects: HashMap::new(),
                    seeds: vec![new_object, event],
                    events: vec![event],
                    self_charged: false,
                },
                declared_exception: None,
            })
        }

        fn run_instance_method(
            &self,
            _gas: &mut GasMeter,
            _classpath: TransactionReference,
            _method: &CodeSignature,
            _receiver: StorageReference,
            _actuals: &[StorageValue],
        ) -> std::result::Result<MethodOutcome, SandboxError> {
            unimplemented!("not exercised in these tests")
        }

        fn run_static_method(
            &self,
            _gas: &mut GasMeter,
            _classpath: TransactionReference,
            _method: &CodeSignature,
            _actuals: &[StorageValue],
        ) -> std::result::Result<MethodOutcome, SandboxError> {
            unimplemented!("not exercised in these tests")
        }

        fn run_gamete_creation(
            &self,
            _classpath: TransactionReference,
            _initial_amounts: &[BigInt],
            _public_key: &[u8],
        ) -> std::result::Result<(StorageReference, CallEffects), SandboxError> {
            unimplemented!("not exercised in these tests")
        }

        fn run_initialization(
            &self,
            _classpath: TransactionReference,
            _manifest: StorageReference,
        ) -> std::result::Result<CallEffects, SandboxError> {
            unimplemented!("not exercised in these tests")
        }
    }

    fn node() -> Node<MemoryDatabase, StubSandbox, ImmediateMempool> {
        Node::new(
            MemoryDatabase::new(),
            MemoryDatabase::new(),
            StubSandbox,
            ImmediateMempool,
            Box::new(EmptyAlgorithm),
            NodeConfig {
                max_polling_attempts: 5,
                polling_delay_millis: 1,
                ..NodeConfig::default()
            },
            NodeParameters {
                chain_id: "test".into(),
                current_gas_price: BigInt::from(1),
                gas_limit_cap: BigInt::from(1_000_000),
            },
        )
    }

    fn jar_store_initial() -> Request {
        Request::JarStoreInitial { jar: vec![1, 2, 3], dependencies: vec![] }
    }

    #[test]
    fn a_delivered_request_is_polled_successfully_after_commit() {
        let node = node();
        let tr = node.submit_request(jar_store_initial()).unwrap();

        let request = jar_store_initial();
        node.check_request(&request).unwrap();
        let outcome = node.deliver_request(&request).unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Delivered(_)));
        node.commit_block().unwrap();

        let response = node.get_polled_response(tr).unwrap();
        assert!(matches!(response, Response::JarStoreSuccessful { .. }));
    }

    #[test]
    fn a_repeated_transaction_reference_is_rejected_on_redelivery() {
        let node = node();
        let request = jar_store_initial();
        let tr = node.submit_request(request.clone()).unwrap();
        node.deliver_request(&request).unwrap();
        node.commit_block().unwrap();

        let outcome = node.deliver_request(&request).unwrap();
        assert_eq!(outcome, DeliveryOutcome::Rejected(RejectionReason::RepeatedTransaction));
        assert!(node.get_polled_response(tr).is_ok());
    }

    #[test]
    fn commit_block_with_no_pending_requests_is_a_no_op() {
        let node = node();
        node.commit_block().unwrap();
        node.commit_block().unwrap();
    }

    #[test]
    fn events_are_published_to_a_wildcard_subscriber_on_commit() {
        let node = node();
        let seen: Arc<parking_lot::Mutex<Vec<StorageReference>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        node.subscribe_events(None, move |_creator, event| seen_clone.lock().push(event));

        let request = Request::ConstructorCall {
            caller: Caller {
                public_key: PublicKey::from_bytes(&[1u8; 32]),
                caller: tr(100),
                nonce: BigInt::from(0),
                chain_id: "test".into(),
                gas_limit: BigInt::from(100),
                gas_price: BigInt::from(1),
                classpath: tr(9),
            },
            constructor: CodeSignature::constructor(StorageType::class("io.tessera.Account"), vec![]),
            actuals: vec![],
            signature: Signature::from_bytes(&[0u8; 64]),
        };

        // fund the caller's account directly through a committed transaction
        // so the constructor call's pre-charge succeeds.
        {
            let mut txn = node.store.begin_transaction(0);
            let account = tessera_store::account_reference(tr(100));
            txn.set_response(
                tr(100),
                Response::GameteCreation {
                    updates: vec![
                        tessera_types::Update::class_tag(account, "io.tessera.Account", tr(100)),
                        tessera_types::Update::field(account, tessera_store::balance_field(), tessera_types::FieldValue::BigInteger(BigInt::from(1_000))),
                        tessera_types::Update::field(account, tessera_store::nonce_field(), tessera_types::FieldValue::BigInteger(BigInt::from(0))),
                    ],
                    gamete: account,
                },
            )
            .unwrap();
            txn.set_history(account, vec![]).unwrap();
            node.store.commit_transaction(txn).unwrap();
        }

        node.deliver_request(&request).unwrap();
        node.commit_block().unwrap();

        assert_eq!(*seen.lock(), vec![sr(3, 0)]);
    }
}
