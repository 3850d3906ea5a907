//! The sandbox contract: the class-loading, deserialization, and
//! user-code execution collaborator the response builder dispatches to.
//! Its actual implementation — a bytecode verifier and an interpreter or
//! JIT for user-supplied classes — is explicitly out of scope;
//! this crate only defines the shape the builder drives it through.

use std::collections::HashMap;

use tessera_types::{Cause, CodeSignature, StorageReference, StorageValue, TransactionReference};
use tessera_updates::LiveObject;

use crate::gas::GasMeter;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum SandboxError {
    #[error("could not load classpath {classpath}: {reason}")]
    ClassLoadFailure { classpath: TransactionReference, reason: String },
    #[error("could not resolve {0}")]
    UnresolvedCode(String),
    #[error("verification error on jar: {0}")]
    VerificationError(String),
    #[error("reverification failure on dependency: {0}")]
    ReverificationFailure(String),
    #[error("deserialization error: {0}")]
    DeserializationError(String),
}

/// Everything user code left live in memory after a constructor or method
/// call, already diffed and typed — exactly the shape [`tessera_updates`]
/// consumes.
pub struct CallEffects {
    /// Every object the call touched, keyed by storage reference.
    pub objects: HashMap<StorageReference, LiveObject>,
    /// The objects the update extractor's BFS should be seeded with (the
    /// receiver, a newly-constructed object, any event objects).
    pub seeds: Vec<StorageReference>,
    /// Event object references, in the order the sandbox notified them to
    /// the builder ("Event ordering is the order in which the
    /// sandbox notified them to the builder").
    pub events: Vec<StorageReference>,
    /// `true` iff the callee itself paid for its own execution rather than
    /// the caller (self-charged semantics) — affects only which
    /// response selector is legal, never who is actually billed.
    pub self_charged: bool,
}

pub struct ConstructorOutcome {
    pub new_object: StorageReference,
    pub effects: CallEffects,
    /// `Some` when user code threw an exception type it declared as
    /// "expected" for this constructor (*exception* outcome).
    pub declared_exception: Option<Cause>,
}

pub struct MethodOutcome {
    /// `None` for a void method.
    pub result: Option<StorageValue>,
    pub effects: CallEffects,
    pub declared_exception: Option<Cause>,
}

/// The sandbox collaborator ("Sandbox:
/// `load_class`/`resolve_method_or_constructor`/`deserialize_object`/
/// `serialize`/`run_code`/`charge_gas_callback`"). One call per jar-store,
/// constructor, or method request; the gas meter is threaded through so the
/// sandbox can charge CPU/RAM/storage gas as it interprets user code.
pub trait Sandbox {
    /// Verifies and instruments a jar's bytecode, returning the
    /// instrumented bytes or a verification/reverification error (a
    /// verification error on a jar, or a reverification failure of a
    /// dependency"). Billed against `gas` like any other CPU work.
    fn verify_and_instrument_jar(
        &self,
        gas: &mut GasMeter,
        jar: &[u8],
        dependencies: &[TransactionReference],
    ) -> Result<Vec<u8>, SandboxError>;

    /// Queried once per enum-typed field value the update extractor
    /// encounters ("enum-typed fields are forbidden from
    /// having instance non-transient fields on their enum class").
    fn enum_class_has_instance_fields(&self, class_name: &str) -> bool;

    fn load_class(&self, classpath: TransactionReference, class_name: &str) -> Result<(), SandboxError>;

    fn resolve_method_or_constructor(&self, signature: &CodeSignature) -> Result<(), SandboxError>;

    fn run_constructor(
        &self,
        gas: &mut GasMeter,
        classpath: TransactionReference,
        constructor: &CodeSignature,
        actuals: &[StorageValue],
    ) -> Result<ConstructorOutcome, SandboxError>;

    fn run_instance_method(
        &self,
        gas: &mut GasMeter,
        classpath: TransactionReference,
        method: &CodeSignature,
        receiver: StorageReference,
        actuals: &[StorageValue],
    ) -> Result<MethodOutcome, SandboxError>;

    fn run_static_method(
        &self,
        gas: &mut GasMeter,
        classpath: TransactionReference,
        method: &CodeSignature,
        actuals: &[StorageValue],
    ) -> Result<MethodOutcome, SandboxError>;

    /// Runs the gamete-creation and initialization bootstrap calls, which
    /// are not billed and never fail with a declared exception — only a
    /// hard sandbox error aborts them.
    fn run_gamete_creation(
        &self,
        classpath: TransactionReference,
        initial_amounts: &[num_bigint::BigInt],
        public_key: &[u8],
    ) -> Result<(StorageReference, CallEffects), SandboxError>;

    fn run_initialization(
        &self,
        classpath: TransactionReference,
        manifest: StorageReference,
    ) -> Result<CallEffects, SandboxError>;
}
