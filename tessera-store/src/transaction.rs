//! The per-request delivery protocol: a staging area opened
//! over a [`crate::store::StoreView`], closed either by `commit()` (via
//! [`crate::store::Store::commit`]) or by discarding it.
//!
//! No separate overlay database is needed here: [`tessera_trie::MerkleTrie::put`]
//! already returns a new, independent view over the same shared content-
//! addressed backend, so staging a write is just reassigning one of this
//! struct's `MerkleTrie` fields. Requests themselves are never written to
//! any trie, so duplicate-transaction-reference detection within a single
//! transaction uses a plain in-memory set.

use std::collections::HashSet;

use num_bigint::BigInt;

use tessera_crypto::SignatureAlgorithm;
use tessera_engine::{BuildOutcome, Engine, EngineError};
use tessera_types::{Caller, Request, Response, StorageReference, TransactionReference, Update};

use crate::ledger;
use crate::store::{
    commit_number_key, encode_history, history_key, manifest_key, strip_jar_for_storage, tr_key, StoreError, StoreView,
};
use tessera_trie::{Database, StoredNode};

type Result<T> = std::result::Result<T, StoreError>;

/// Why a request was refused before ever reaching the response builder:
/// bad signature, wrong chain-id, nonce mismatch, insufficient balance
/// for prepayment, a repeated TR, malformed encoding, or sandbox refusal
/// to load the classpath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    RepeatedTransaction,
    WrongChainId,
    NonceMismatch { expected: BigInt, actual: BigInt },
    BadSignature,
    GasPriceTooLow { minimum: BigInt, offered: BigInt },
    GasLimitExceedsCap { cap: BigInt, requested: BigInt },
    InsufficientBalance { required: BigInt, available: BigInt },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RepeatedTransaction => write!(f, "a response or pending request already exists for this transaction"),
            Self::WrongChainId => write!(f, "chain-id does not match this node"),
            Self::NonceMismatch { expected, actual } => write!(f, "nonce mismatch: expected {expected}, got {actual}"),
            Self::BadSignature => write!(f, "signature verification failed"),
            Self::GasPriceTooLow { minimum, offered } => write!(f, "gas price {offered} below current minimum {minimum}"),
            Self::GasLimitExceedsCap { cap, requested } => write!(f, "gas limit {requested} exceeds the cap of {cap}"),
            Self::InsufficientBalance { required, available } => {
                write!(f, "balance {available} insufficient to prepay {required}")
            }
        }
    }
}

/// The outcome of [`StoreTransaction::deliver`]: either the request was
/// refused before any store write (no response exists, the caller is not
/// charged), or it was delivered and a response was staged (the
/// rejected/delivered split collapses the engine's three-way
/// success/failed/exception outcome to two from the caller's perspective,
/// since *failed* and *exception* both still produce a stored response).
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    Rejected(RejectionReason),
    Delivered(Response),
}

/// Node-wide parameters a delivery needs but that the store has no
/// business owning itself.
pub struct DeliveryContext<'a> {
    pub chain_id: &'a str,
    pub current_gas_price: &'a BigInt,
    pub gas_limit_cap: &'a BigInt,
    pub signature_algorithm: &'a dyn SignatureAlgorithm,
}

/// A staging area over one [`StoreView`] ("A staging area
/// opened by `begin_transaction(now)`"). Every write reassigns one of the
/// view's trie fields in place; nothing is visible to other readers until
/// the view is handed to `Store::commit`.
pub struct StoreTransaction<D: Database> {
    view: StoreView<D>,
    commit_number: u64,
    now: i64,
    staged_requests: HashSet<TransactionReference>,
}

impl<D: Database> StoreTransaction<D> {
    /// Opens a transaction over `view`, immediately staging the next
    /// commit number into the info trie so every subsequent write in this
    /// transaction — and `Store::commit`'s GC decision — shares one tag
    ///.
    pub(crate) fn new(view: StoreView<D>, now: i64) -> Self {
        let mut txn = Self {
            view,
            commit_number: 0,
            now,
            staged_requests: HashSet::new(),
        };
        let prior = txn.view.get_commit_number().unwrap_or(0);
        let commit_number = prior + 1;
        txn.commit_number = commit_number;
        txn.view.info = txn
            .view
            .info
            .put(commit_number_key(), commit_number.to_be_bytes().to_vec(), commit_number)
            .expect("staging the commit number into an in-memory-backed trie cannot fail");
        txn
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn commit_number(&self) -> u64 {
        self.commit_number
    }

    /// Consumes the transaction, handing its staged view to `Store::commit`.
    pub fn into_view(self) -> StoreView<D> {
        self.view
    }

    pub fn get_response(&self, tr: TransactionReference) -> Result<Option<Response>> {
        self.view.get_response(tr)
    }

    pub fn get_error(&self, tr: TransactionReference) -> Result<Option<String>> {
        self.view.get_error(tr)
    }

    pub fn get_history(&self, object: StorageReference) -> Result<Vec<TransactionReference>> {
        self.view.get_history(object)
    }

    pub fn get_state(&self, object: StorageReference) -> Result<Vec<Update>> {
        self.view.get_state(object)
    }

    pub fn get_manifest(&self) -> Result<Option<StorageReference>> {
        self.view.get_manifest()
    }

    /// `true` iff `tr` already has a staged or committed request or
    /// response — the repeated-TR rejection check.
    pub fn has_request_or_response(&self, tr: TransactionReference) -> Result<bool> {
        if self.staged_requests.contains(&tr) {
            return Ok(true);
        }
        Ok(self.view.get_response(tr)?.is_some())
    }

    fn set_request(&mut self, tr: TransactionReference) {
        self.staged_requests.insert(tr);
    }

    /// Stages `response` under `tr`, dedupliciating jar bytes into the
    /// side store first.
    pub fn set_response(&mut self, tr: TransactionReference, response: Response) -> Result<()> {
        let (stripped, jar_bytes) = strip_jar_for_storage(response);
        if let Some((digest, bytes)) = jar_bytes {
            self.view.jars.put(digest, StoredNode { commit: self.commit_number, bytes });
        }
        let mut w = tessera_codec::Writer::new();
        stripped.encode(&mut w);
        self.view.responses = self.view.responses.put(tr_key(tr), w.into_bytes(), self.commit_number)?;
        Ok(())
    }

    pub fn set_error(&mut self, tr: TransactionReference, message: impl Into<String>) -> Result<()> {
        self.view.errors = self
            .view
            .errors
            .put(tr_key(tr), message.into().into_bytes(), self.commit_number)?;
        Ok(())
    }

    /// Stages `object`'s history, minus the trailing defining transaction
    /// (the history trie never stores the final TR).
    pub fn set_history(&mut self, object: StorageReference, stored_prefix: Vec<TransactionReference>) -> Result<()> {
        self.view.history = self.view.history.put(
            history_key(object),
            encode_history(&stored_prefix),
            self.commit_number,
        )?;
        Ok(())
    }

    pub fn set_manifest(&mut self, manifest: StorageReference) -> Result<()> {
        let mut bytes = Vec::with_capacity(40);
        bytes.extend_from_slice(manifest.transaction.as_bytes());
        bytes.extend_from_slice(&manifest.progressive.to_be_bytes());
        self.view.info = self.view.info.put(manifest_key(), bytes, self.commit_number)?;
        Ok(())
    }

    /// Extends `object`'s history to include `tr`, reading the current
    /// stored prefix and appending the object's own prior defining
    /// transaction to it — i.e. the sequence grows by one entry per
    /// transaction that touches the object.
    fn extend_history(&mut self, object: StorageReference, tr: TransactionReference) -> Result<()> {
        let mut prefix = self.view.get_stored_history_prefix(object)?;
        prefix.push(tr);
        self.set_history(object, prefix)
    }

    /// Runs the full six-step delivery protocol for one request: dedup,
    /// prelude checks, balance/nonce pre-charge, response
    /// construction, and staging.
    pub fn deliver(
        &mut self,
        request: &Request,
        ctx: &DeliveryContext<'_>,
        engine: &Engine<'_>,
    ) -> std::result::Result<DeliveryOutcome, EngineError> {
        let tr = request.transaction_reference();

        // Step 2: duplicate-TR rejection.
        if self.has_request_or_response(tr).map_err(store_error_as_engine_error)? {
            return Ok(reject(tr, RejectionReason::RepeatedTransaction));
        }
        self.set_request(tr);

        if request.is_initial() {
            let response = engine.build_initial(request)?;
            self.stage_delivered_response(tr, response.clone()).map_err(store_error_as_engine_error)?;
            if let Request::Initialization { manifest, .. } = request {
                self.set_manifest(*manifest).map_err(store_error_as_engine_error)?;
                log::info!("installed manifest {manifest}");
            }
            return Ok(DeliveryOutcome::Delivered(response));
        }

        // Step 3: prelude checks for a non-initial, signed request.
        let caller = request.caller().expect("non-initial request always carries a caller");

        if caller.chain_id != ctx.chain_id {
            return Ok(reject(tr, RejectionReason::WrongChainId));
        }

        let account = ledger::account_reference(caller.caller);
        let state = self.get_state(account).map_err(store_error_as_engine_error)?;
        let current_nonce = ledger::big_integer_field(&state, &ledger::nonce_field());
        if caller.nonce != current_nonce {
            return Ok(reject(
                tr,
                RejectionReason::NonceMismatch {
                    expected: current_nonce,
                    actual: caller.nonce.clone(),
                },
            ));
        }

        let message = {
            let mut w = tessera_codec::Writer::new();
            request.encode(&mut w, true);
            w.into_bytes()
        };
        let signature = request.signature().expect("non-initial request always carries a signature");
        if !ctx.signature_algorithm.verify(&caller.public_key, &message, signature) {
            return Ok(reject(tr, RejectionReason::BadSignature));
        }

        if &caller.gas_price < ctx.current_gas_price {
            return Ok(reject(
                tr,
                RejectionReason::GasPriceTooLow {
                    minimum: ctx.current_gas_price.clone(),
                    offered: caller.gas_price.clone(),
                },
            ));
        }
        if &caller.gas_limit > ctx.gas_limit_cap {
            return Ok(reject(
                tr,
                RejectionReason::GasLimitExceedsCap {
                    cap: ctx.gas_limit_cap.clone(),
                    requested: caller.gas_limit.clone(),
                },
            ));
        }

        let balance = ledger::big_integer_field(&state, &ledger::balance_field());
        let cost = &caller.gas_limit * &caller.gas_price;
        if balance < cost {
            return Ok(reject(
                tr,
                RejectionReason::InsufficientBalance {
                    required: cost,
                    available: balance,
                },
            ));
        }

        // Step 4: increment the nonce unconditionally. The balance charge
        // is outcome-dependent — only the gas actually consumed for a
        // successful or exceptional response ("the caller is
        // charged only for CPU/RAM/storage actually consumed, not for
        // penalty"), the full pre-checked `gas_limit` for a failed one
        // ("failed... pays all of gas_limit") — so it is folded in
        // once the outcome below is known.
        let new_nonce = &current_nonce + BigInt::from(1);
        let nonce_update = Update::field(account, ledger::nonce_field(), tessera_types::FieldValue::BigInteger(new_nonce));

        // Step 5: build the response.
        let outcome = engine.build_delivered(request, caller)?;
        let response = match outcome {
            BuildOutcome::Successful(response) => {
                let balance_update = charged_balance_update(account, &balance, &caller.gas_price, &response);
                merge_prelude_updates(response, &[nonce_update, balance_update])
            }
            BuildOutcome::Exception(response) => {
                let balance_update = charged_balance_update(account, &balance, &caller.gas_price, &response);
                merge_prelude_updates(response, &[nonce_update, balance_update])
            }
            BuildOutcome::Failed { cause, gas_consumed } => {
                let gas_consumed_for_penalty = &caller.gas_limit - gas_consumed.total();
                let balance_update = Update::field(account, ledger::balance_field(), tessera_types::FieldValue::BigInteger(&balance - &cost));
                let prelude_updates = vec![nonce_update, balance_update];
                failed_response_for(request, prelude_updates, gas_consumed, gas_consumed_for_penalty, cause)
            }
        };

        self.stage_delivered_response(tr, response.clone()).map_err(store_error_as_engine_error)?;
        Ok(DeliveryOutcome::Delivered(response))
    }

    /// Stages the response itself plus the history extension for every
    /// object its updates touch.
    fn stage_delivered_response(&mut self, tr: TransactionReference, response: Response) -> Result<()> {
        let mut touched: Vec<StorageReference> = response.updates().iter().map(|u| u.object()).collect();
        touched.sort();
        touched.dedup();

        self.set_response(tr, response)?;
        for object in touched {
            self.extend_history(object, tr)?;
        }
        Ok(())
    }

    /// Discards the transaction without committing. Any trie nodes it
    /// wrote remain in the backend tagged with a commit number nothing
    /// ever references again — ordinary GC fodder, not a leak.
    pub fn abort(self) {}
}

fn store_error_as_engine_error(err: StoreError) -> EngineError {
    EngineError::Sandbox(tessera_engine::SandboxError::VerificationError(err.to_string()))
}

/// Logs a rejection at `warn` (never higher: a rejection is an expected,
/// caller-facing outcome, not a node-level error) and wraps it as a
/// [`DeliveryOutcome`].
fn reject(tr: TransactionReference, reason: RejectionReason) -> DeliveryOutcome {
    log::warn!("rejected {tr}: {reason}");
    DeliveryOutcome::Rejected(reason)
}

/// The caller's balance update for a successful or exceptional outcome:
/// charged only for the gas the response actually reports consuming, never
/// the unused remainder of the pre-checked `gas_limit` (that full-`gas_limit`
/// charge is reserved for a *failed* outcome alone).
fn charged_balance_update(account: StorageReference, balance: &BigInt, gas_price: &BigInt, response: &Response) -> Update {
    let consumed = response
        .gas_consumed()
        .expect("successful/exception responses always carry gas accounting");
    let new_balance = balance - &consumed.total() * gas_price;
    Update::field(account, ledger::balance_field(), tessera_types::FieldValue::BigInteger(new_balance))
}

fn merge_prelude_updates(response: Response, prelude_updates: &[Update]) -> Response {
    match response {
        Response::ConstructorCallSuccessful {
            mut updates,
            events,
            gas_consumed,
            new_object,
            self_charged,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::ConstructorCallSuccessful {
                updates,
                events,
                gas_consumed,
                new_object,
                self_charged,
            }
        }
        Response::ConstructorCallException {
            mut updates,
            events,
            gas_consumed,
            cause,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::ConstructorCallException {
                updates,
                events,
                gas_consumed,
                cause,
            }
        }
        Response::MethodCallSuccessful {
            mut updates,
            events,
            gas_consumed,
            result,
            self_charged,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::MethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                result,
                self_charged,
            }
        }
        Response::VoidMethodCallSuccessful {
            mut updates,
            events,
            gas_consumed,
            self_charged,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::VoidMethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                self_charged,
            }
        }
        Response::MethodCallException {
            mut updates,
            events,
            gas_consumed,
            cause,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::MethodCallException {
                updates,
                events,
                gas_consumed,
                cause,
            }
        }
        Response::JarStoreSuccessful {
            mut updates,
            gas_consumed,
            instrumented_jar,
            dependencies,
        } => {
            updates.extend_from_slice(prelude_updates);
            updates.sort();
            Response::JarStoreSuccessful {
                updates,
                gas_consumed,
                instrumented_jar,
                dependencies,
            }
        }
        other => other,
    }
}

/// Builds the persisted `*Failed` response matching `request`'s shape:
/// retains only the balance/nonce updates, sets `gas_consumed_for_penalty`
/// to the remaining gas, and records the cause.
fn failed_response_for(
    request: &Request,
    prelude_updates: Vec<Update>,
    gas_consumed: tessera_types::GasConsumed,
    gas_consumed_for_penalty: BigInt,
    cause: tessera_types::Cause,
) -> Response {
    match request {
        Request::JarStore { .. } => Response::JarStoreFailed {
            updates: prelude_updates,
            gas_consumed,
            gas_consumed_for_penalty,
            cause,
        },
        Request::ConstructorCall { .. } => Response::ConstructorCallFailed {
            updates: prelude_updates,
            gas_consumed,
            gas_consumed_for_penalty,
            cause,
        },
        Request::InstanceMethodCall { .. } | Request::StaticMethodCall { .. } => Response::MethodCallFailed {
            updates: prelude_updates,
            gas_consumed,
            gas_consumed_for_penalty,
            cause,
        },
        _ => unreachable!("initial requests never reach build_delivered"),
    }
}
