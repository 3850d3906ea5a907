//! The response builder factory: one builder per request
//! variant, sharing gas accounting and the three-way failure/exception/
//! success taxonomy. The prelude checks (signature, nonce, chain-id,
//! balance) and the final staging of whatever this module returns both
//! belong to the store transaction; this module only runs the
//! sandbox and shapes the result.

use num_bigint::BigInt;
use num_traits::Zero;

use tessera_types::{Cause, Caller, GasConsumed, Request, Response};
use tessera_updates::{extract_updates, EnumClassModel, UpdateError};

use crate::gas::GasMeter;
use crate::sandbox::{CallEffects, Sandbox, SandboxError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sandbox refused: {0}")]
    Sandbox(#[from] SandboxError),
    #[error("invalid update graph: {0}")]
    InvalidUpdates(#[from] UpdateError),
    #[error("request variant does not match the builder it was dispatched to")]
    MismatchedRequest,
}

/// What the response builder produced for one delivered, non-initial
/// request (three-way split; *rejected* has no counterpart
/// here since it never reaches the builder at all).
pub enum BuildOutcome {
    /// A normal success-shaped response, already in its final encoded
    /// form (compact selector chosen where applicable).
    Successful(Response),
    /// A normal success-shaped response whose `get_outcome()` the node
    /// must report as the given declared exception.
    Exception(Response),
    /// Execution failed; the store transaction (§4.E step 5) builds the
    /// actual persisted `*Failed` response from this cause plus whatever
    /// gas remained at the point of failure (`gas_limit` minus
    /// `gas_consumed`'s three totals becomes `gas_consumed_for_penalty`).
    Failed { cause: Cause, gas_consumed: GasConsumed },
}

struct AsEnumClassModel<'s>(&'s dyn Sandbox);

impl<'s> EnumClassModel for AsEnumClassModel<'s> {
    fn enum_class_has_instance_fields(&self, class_name: &str) -> bool {
        self.0.enum_class_has_instance_fields(class_name)
    }
}

fn cause_from_sandbox_error(err: &SandboxError) -> Cause {
    Cause::new("tessera.sandbox.SandboxException", err.to_string(), "")
}

/// Rough storage-gas cost of persisting a response: its own canonical
/// encoded length: the simplest measure consistent with "storage gas"
/// billing actual persisted bytes.
fn response_storage_cost(response: &Response) -> BigInt {
    let mut w = tessera_codec::Writer::new();
    response.encode(&mut w);
    BigInt::from(w.bytes().len())
}

/// Builds responses for delivered requests, dispatching to the sandbox
/// collaborator for user-code execution.
pub struct Engine<'s> {
    sandbox: &'s dyn Sandbox,
}

impl<'s> Engine<'s> {
    pub fn new(sandbox: &'s dyn Sandbox) -> Self {
        Self { sandbox }
    }

    /// Builds the response for an initial request ("Initial-
    /// request builders skip signature/nonce checks but still produce
    /// responses that carry no gas data"). Infallible at this layer except
    /// for a genuine sandbox fault — there is no gas budget to exhaust and
    /// no declared-exception outcome for bootstrap calls.
    pub fn build_initial(&self, request: &Request) -> Result<Response, EngineError> {
        match request {
            Request::JarStoreInitial { jar, dependencies } => {
                let mut gas = GasMeter::new(BigInt::zero());
                let instrumented_jar = self
                    .sandbox
                    .verify_and_instrument_jar(&mut gas, jar, dependencies)?;
                Ok(Response::JarStoreInitial {
                    instrumented_jar,
                    dependencies: dependencies.clone(),
                })
            }
            Request::GameteCreation {
                classpath,
                initial_amounts,
                public_key,
            } => {
                let (gamete, effects) =
                    self.sandbox
                        .run_gamete_creation(*classpath, initial_amounts, public_key.as_bytes())?;
                let updates = self.extract(&effects)?;
                Ok(Response::GameteCreation { updates, gamete })
            }
            Request::Initialization { classpath, manifest } => {
                let effects = self.sandbox.run_initialization(*classpath, *manifest)?;
                let _ = self.extract(&effects)?;
                Ok(Response::Initialization)
            }
            _ => Err(EngineError::MismatchedRequest),
        }
    }

    /// Builds the response for a non-initial, signed request, given the
    /// caller's account and its gas budget. The store
    /// transaction has already pre-charged `caller.gas_limit *
    /// caller.gas_price` and incremented the nonce before this is called.
    pub fn build_delivered(&self, request: &Request, caller: &Caller) -> Result<BuildOutcome, EngineError> {
        let mut gas = GasMeter::new(caller.gas_limit.clone());
        let outcome = match request {
            Request::JarStore { jar, dependencies, .. } => self.build_jar_store(&mut gas, jar, dependencies),
            Request::ConstructorCall {
                caller: call_caller,
                constructor,
                actuals,
                ..
            } => self.build_constructor_call(&mut gas, call_caller, constructor, actuals),
            Request::InstanceMethodCall {
                caller: call_caller,
                method,
                receiver,
                actuals,
                ..
            } => self.build_instance_method_call(&mut gas, call_caller, method, *receiver, actuals),
            Request::StaticMethodCall {
                caller: call_caller,
                method,
                actuals,
                ..
            } => self.build_static_method_call(&mut gas, call_caller, method, actuals),
            _ => return Err(EngineError::MismatchedRequest),
        }?;

        Ok(self.charge_for_response_storage_or_fail(&mut gas, outcome))
    }

    /// Spec §4.G: "Charging for the storage cost of the response itself is
    /// a terminal step; failing to reserve that charge converts the
    /// outcome to failed."
    fn charge_for_response_storage_or_fail(&self, gas: &mut GasMeter, outcome: BuildOutcome) -> BuildOutcome {
        let response = match &outcome {
            BuildOutcome::Successful(response) | BuildOutcome::Exception(response) => Some(response),
            BuildOutcome::Failed { .. } => None,
        };
        let Some(response) = response else { return outcome };

        let cost = response_storage_cost(response);
        if gas.charge_gas_for_storage(&cost).is_err() {
            return BuildOutcome::Failed {
                cause: Cause::new(
                    "tessera.engine.OutOfGasException",
                    "insufficient gas to pay for the response's own storage cost",
                    "",
                ),
                gas_consumed: gas.gas_consumed(),
            };
        }

        // The response was built (and its `gas_consumed` snapshotted) before
        // this charge ran; patch it in now so the persisted figure includes
        // the response's own storage cost.
        let gas_consumed = gas.gas_consumed();
        match outcome {
            BuildOutcome::Successful(response) => BuildOutcome::Successful(response.with_gas_consumed(gas_consumed)),
            BuildOutcome::Exception(response) => BuildOutcome::Exception(response.with_gas_consumed(gas_consumed)),
            BuildOutcome::Failed { .. } => unreachable!("response was Some, so outcome cannot be Failed"),
        }
    }

    fn extract(&self, effects: &CallEffects) -> Result<Vec<tessera_types::Update>, EngineError> {
        let model = AsEnumClassModel(self.sandbox);
        let result = extract_updates(effects.seeds.clone(), &effects.objects, &model)?;
        Ok(result.updates)
    }

    fn build_jar_store(
        &self,
        gas: &mut GasMeter,
        jar: &[u8],
        dependencies: &[tessera_types::TransactionReference],
    ) -> Result<BuildOutcome, EngineError> {
        match self.sandbox.verify_and_instrument_jar(gas, jar, dependencies) {
            Ok(instrumented_jar) => Ok(BuildOutcome::Successful(Response::JarStoreSuccessful {
                updates: Vec::new(),
                gas_consumed: gas.gas_consumed(),
                instrumented_jar,
                dependencies: dependencies.to_vec(),
            })),
            Err(err) => Ok(BuildOutcome::Failed {
                cause: cause_from_sandbox_error(&err),
                gas_consumed: gas.gas_consumed(),
            }),
        }
    }

    fn build_constructor_call(
        &self,
        gas: &mut GasMeter,
        caller: &Caller,
        constructor: &tessera_types::CodeSignature,
        actuals: &[tessera_types::StorageValue],
    ) -> Result<BuildOutcome, EngineError> {
        let outcome = match self.sandbox.run_constructor(gas, caller.classpath, constructor, actuals) {
            Ok(outcome) => outcome,
            Err(err) => {
                return Ok(BuildOutcome::Failed {
                    cause: cause_from_sandbox_error(&err),
                    gas_consumed: gas.gas_consumed(),
                })
            }
        };
        let updates = self.extract(&outcome.effects)?;
        let gas_consumed = gas.gas_consumed();

        Ok(match outcome.declared_exception {
            Some(cause) => BuildOutcome::Exception(Response::ConstructorCallException {
                updates,
                events: outcome.effects.events,
                gas_consumed,
                cause,
            }),
            None => BuildOutcome::Successful(Response::ConstructorCallSuccessful {
                updates,
                events: outcome.effects.events,
                gas_consumed,
                new_object: outcome.new_object,
                self_charged: outcome.effects.self_charged,
            }),
        })
    }

    fn build_instance_method_call(
        &self,
        gas: &mut GasMeter,
        caller: &Caller,
        method: &tessera_types::CodeSignature,
        receiver: tessera_types::StorageReference,
        actuals: &[tessera_types::StorageValue],
    ) -> Result<BuildOutcome, EngineError> {
        let outcome = match self.sandbox.run_instance_method(gas, caller.classpath, method, receiver, actuals) {
            Ok(outcome) => outcome,
            Err(err) => {
                return Ok(BuildOutcome::Failed {
                    cause: cause_from_sandbox_error(&err),
                    gas_consumed: gas.gas_consumed(),
                })
            }
        };
        self.finish_method_call(gas, outcome)
    }

    fn build_static_method_call(
        &self,
        gas: &mut GasMeter,
        caller: &Caller,
        method: &tessera_types::CodeSignature,
        actuals: &[tessera_types::StorageValue],
    ) -> Result<BuildOutcome, EngineError> {
        let outcome = match self.sandbox.run_static_method(gas, caller.classpath, method, actuals) {
            Ok(outcome) => outcome,
            Err(err) => {
                return Ok(BuildOutcome::Failed {
                    cause: cause_from_sandbox_error(&err),
                    gas_consumed: gas.gas_consumed(),
                })
            }
        };
        self.finish_method_call(gas, outcome)
    }

    fn finish_method_call(
        &self,
        gas: &mut GasMeter,
        outcome: crate::sandbox::MethodOutcome,
    ) -> Result<BuildOutcome, EngineError> {
        let updates = self.extract(&outcome.effects)?;
        let gas_consumed = gas.gas_consumed();

        if let Some(cause) = outcome.declared_exception {
            return Ok(BuildOutcome::Exception(Response::MethodCallException {
                updates,
                events: outcome.effects.events,
                gas_consumed,
                cause,
            }));
        }

        Ok(BuildOutcome::Successful(match outcome.result {
            Some(result) => Response::MethodCallSuccessful {
                updates,
                events: outcome.effects.events,
                gas_consumed,
                result,
                self_charged: outcome.effects.self_charged,
            },
            None => Response::VoidMethodCallSuccessful {
                updates,
                events: outcome.effects.events,
                gas_consumed,
                self_charged: outcome.effects.self_charged,
            },
        }))
    }
}
