//! Responses, including the three compact selectors for
//! successful constructor/method calls with few events and a
//! non-self-charged caller.

use num_bigint::BigInt;
use tessera_codec::{selectors, CodecError, Reader, Writer};

use crate::reference::{StorageReference, TransactionReference};
use crate::update::Update;
use crate::value::StorageValue;

/// CPU, RAM, and storage gas consumed by a delivered non-initial
/// transaction ("gas consumed for CPU, RAM, storage").
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GasConsumed {
    pub cpu: BigInt,
    pub ram: BigInt,
    pub storage: BigInt,
}

impl GasConsumed {
    pub fn new(cpu: BigInt, ram: BigInt, storage: BigInt) -> Self {
        Self { cpu, ram, storage }
    }

    /// The three totals combined into the single gas figure billing is
    /// actually computed against.
    pub fn total(&self) -> BigInt {
        &self.cpu + &self.ram + &self.storage
    }

    fn encode(&self, w: &mut Writer) {
        w.write_big_integer(&self.cpu);
        w.write_big_integer(&self.ram);
        w.write_big_integer(&self.storage);
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            cpu: r.read_big_integer()?,
            ram: r.read_big_integer()?,
            storage: r.read_big_integer()?,
        })
    }
}

/// The `(class-of-cause, message-of-cause, where)` triple carried by failed
/// and exception responses.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cause {
    pub class_of_cause: String,
    pub message_of_cause: String,
    pub where_: String,
}

impl Cause {
    pub fn new(
        class_of_cause: impl Into<String>,
        message_of_cause: impl Into<String>,
        where_: impl Into<String>,
    ) -> Self {
        Self {
            class_of_cause: class_of_cause.into(),
            message_of_cause: message_of_cause.into(),
            where_: where_.into(),
        }
    }

    fn encode(&self, w: &mut Writer) {
        w.write_utf(&self.class_of_cause);
        w.write_utf(&self.message_of_cause);
        w.write_utf(&self.where_);
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            class_of_cause: r.read_utf()?,
            message_of_cause: r.read_utf()?,
            where_: r.read_utf()?,
        })
    }
}

fn encode_updates(w: &mut Writer, updates: &[Update]) {
    w.write_array(updates, |w, u| u.encode(w));
}

fn decode_updates(r: &mut Reader) -> Result<Vec<Update>, CodecError> {
    r.read_array(Update::decode)
}

fn encode_events(w: &mut Writer, events: &[StorageReference]) {
    w.write_array(events, |w, e| e.encode_shared(w));
}

fn decode_events(r: &mut Reader) -> Result<Vec<StorageReference>, CodecError> {
    r.read_array(StorageReference::decode_shared)
}

/// A response produced by the engine for a delivered request.
/// Every non-initial response carries updates and gas accounting; on
/// failure it additionally carries the penalty charge and [`Cause`].
#[derive(Clone, PartialEq, Debug)]
pub enum Response {
    GameteCreation {
        updates: Vec<Update>,
        gamete: StorageReference,
    },
    JarStoreInitial {
        instrumented_jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
    },
    Initialization,
    JarStoreSuccessful {
        updates: Vec<Update>,
        gas_consumed: GasConsumed,
        instrumented_jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
    },
    JarStoreFailed {
        updates: Vec<Update>,
        gas_consumed: GasConsumed,
        gas_consumed_for_penalty: BigInt,
        cause: Cause,
    },
    ConstructorCallSuccessful {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas_consumed: GasConsumed,
        new_object: StorageReference,
        self_charged: bool,
    },
    ConstructorCallException {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas_consumed: GasConsumed,
        cause: Cause,
    },
    ConstructorCallFailed {
        updates: Vec<Update>,
        gas_consumed: GasConsumed,
        gas_consumed_for_penalty: BigInt,
        cause: Cause,
    },
    MethodCallSuccessful {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas_consumed: GasConsumed,
        result: StorageValue,
        self_charged: bool,
    },
    VoidMethodCallSuccessful {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas_consumed: GasConsumed,
        self_charged: bool,
    },
    MethodCallException {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas_consumed: GasConsumed,
        cause: Cause,
    },
    MethodCallFailed {
        updates: Vec<Update>,
        gas_consumed: GasConsumed,
        gas_consumed_for_penalty: BigInt,
        cause: Cause,
    },
}

impl Response {
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            Self::GameteCreation { .. } | Self::JarStoreInitial { .. } | Self::Initialization
        )
    }

    pub fn updates(&self) -> &[Update] {
        match self {
            Self::GameteCreation { updates, .. }
            | Self::JarStoreSuccessful { updates, .. }
            | Self::JarStoreFailed { updates, .. }
            | Self::ConstructorCallSuccessful { updates, .. }
            | Self::ConstructorCallException { updates, .. }
            | Self::ConstructorCallFailed { updates, .. }
            | Self::MethodCallSuccessful { updates, .. }
            | Self::VoidMethodCallSuccessful { updates, .. }
            | Self::MethodCallException { updates, .. }
            | Self::MethodCallFailed { updates, .. } => updates,
            _ => &[],
        }
    }

    /// This response's gas accounting, if it carries any — every
    /// non-initial variant does.
    pub fn gas_consumed(&self) -> Option<&GasConsumed> {
        match self {
            Self::JarStoreSuccessful { gas_consumed, .. }
            | Self::JarStoreFailed { gas_consumed, .. }
            | Self::ConstructorCallSuccessful { gas_consumed, .. }
            | Self::ConstructorCallException { gas_consumed, .. }
            | Self::ConstructorCallFailed { gas_consumed, .. }
            | Self::MethodCallSuccessful { gas_consumed, .. }
            | Self::VoidMethodCallSuccessful { gas_consumed, .. }
            | Self::MethodCallException { gas_consumed, .. }
            | Self::MethodCallFailed { gas_consumed, .. } => Some(gas_consumed),
            _ => None,
        }
    }

    /// Rebuilds this response with `gas_consumed` replaced, keeping every
    /// other field as-is. A no-op for the three bootstrap variants, which
    /// carry no gas accounting to replace.
    pub fn with_gas_consumed(self, gas_consumed: GasConsumed) -> Self {
        match self {
            Self::JarStoreSuccessful {
                updates,
                instrumented_jar,
                dependencies,
                ..
            } => Self::JarStoreSuccessful {
                updates,
                gas_consumed,
                instrumented_jar,
                dependencies,
            },
            Self::JarStoreFailed {
                updates,
                gas_consumed_for_penalty,
                cause,
                ..
            } => Self::JarStoreFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            },
            Self::ConstructorCallSuccessful {
                updates,
                events,
                new_object,
                self_charged,
                ..
            } => Self::ConstructorCallSuccessful {
                updates,
                events,
                gas_consumed,
                new_object,
                self_charged,
            },
            Self::ConstructorCallException { updates, events, cause, .. } => Self::ConstructorCallException {
                updates,
                events,
                gas_consumed,
                cause,
            },
            Self::ConstructorCallFailed {
                updates,
                gas_consumed_for_penalty,
                cause,
                ..
            } => Self::ConstructorCallFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            },
            Self::MethodCallSuccessful {
                updates,
                events,
                result,
                self_charged,
                ..
            } => Self::MethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                result,
                self_charged,
            },
            Self::VoidMethodCallSuccessful {
                updates,
                events,
                self_charged,
                ..
            } => Self::VoidMethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                self_charged,
            },
            Self::MethodCallException { updates, events, cause, .. } => Self::MethodCallException {
                updates,
                events,
                gas_consumed,
                cause,
            },
            Self::MethodCallFailed {
                updates,
                gas_consumed_for_penalty,
                cause,
                ..
            } => Self::MethodCallFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            },
            other => other,
        }
    }

    /// Event object references raised by a constructor or method call, in
    /// the order the sandbox notified them ("Event ordering is
    /// the order in which the sandbox notified them to the builder").
    /// Every other response variant raises no events.
    pub fn events(&self) -> &[StorageReference] {
        match self {
            Self::ConstructorCallSuccessful { events, .. }
            | Self::ConstructorCallException { events, .. }
            | Self::MethodCallSuccessful { events, .. }
            | Self::VoidMethodCallSuccessful { events, .. }
            | Self::MethodCallException { events, .. } => events,
            _ => &[],
        }
    }

    /// `true` for the two variants recording a declared exception
    /// (`ConstructorCallException`/`MethodCallException`) — a call that
    /// otherwise completed and staged its updates, but whose outcome
    /// carries a recorded `Cause`.
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::ConstructorCallException { .. } | Self::MethodCallException { .. })
    }

    /// The `(class, message, where)` of a failed or exception outcome, if
    /// any ("on *exception* the transaction is otherwise
    /// successful... but its `get_outcome()` raises the recorded
    /// (class, message, where)").
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::JarStoreFailed { cause, .. }
            | Self::ConstructorCallException { cause, .. }
            | Self::ConstructorCallFailed { cause, .. }
            | Self::MethodCallException { cause, .. }
            | Self::MethodCallFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::GameteCreation { updates, gamete } => {
                w.write_u8(selectors::response::GAMETE_CREATION);
                encode_updates(w, updates);
                gamete.encode_shared(w);
            }
            Self::JarStoreInitial {
                instrumented_jar,
                dependencies,
            } => {
                w.write_u8(selectors::response::JAR_STORE_INITIAL);
                w.write_array(instrumented_jar, |w, b| w.write_u8(*b));
                w.write_array(dependencies, |w, d| d.encode_shared(w));
            }
            Self::Initialization => w.write_u8(selectors::response::INITIALIZATION),
            Self::JarStoreSuccessful {
                updates,
                gas_consumed,
                instrumented_jar,
                dependencies,
            } => {
                w.write_u8(selectors::response::JAR_STORE_SUCCESSFUL);
                encode_updates(w, updates);
                gas_consumed.encode(w);
                w.write_array(instrumented_jar, |w, b| w.write_u8(*b));
                w.write_array(dependencies, |w, d| d.encode_shared(w));
            }
            Self::JarStoreFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            } => {
                w.write_u8(selectors::response::JAR_STORE_FAILED);
                encode_updates(w, updates);
                gas_consumed.encode(w);
                w.write_big_integer(gas_consumed_for_penalty);
                cause.encode(w);
            }
            Self::ConstructorCallSuccessful {
                updates,
                events,
                gas_consumed,
                new_object,
                self_charged,
            } => {
                if events.is_empty() && !self_charged {
                    w.write_u8(selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL_NO_EVENTS);
                    encode_updates(w, updates);
                    gas_consumed.encode(w);
                    new_object.encode_shared(w);
                } else {
                    w.write_u8(selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL);
                    encode_updates(w, updates);
                    encode_events(w, events);
                    gas_consumed.encode(w);
                    new_object.encode_shared(w);
                    w.write_bool(*self_charged);
                }
            }
            Self::ConstructorCallException {
                updates,
                events,
                gas_consumed,
                cause,
            } => {
                w.write_u8(selectors::response::CONSTRUCTOR_CALL_EXCEPTION);
                encode_updates(w, updates);
                encode_events(w, events);
                gas_consumed.encode(w);
                cause.encode(w);
            }
            Self::ConstructorCallFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            } => {
                w.write_u8(selectors::response::CONSTRUCTOR_CALL_FAILED);
                encode_updates(w, updates);
                gas_consumed.encode(w);
                w.write_big_integer(gas_consumed_for_penalty);
                cause.encode(w);
            }
            Self::MethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                result,
                self_charged,
            } => {
                if !self_charged && events.is_empty() {
                    w.write_u8(selectors::response::METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED);
                    encode_updates(w, updates);
                    gas_consumed.encode(w);
                    result.encode(w);
                } else if !self_charged && events.len() == 1 {
                    w.write_u8(selectors::response::METHOD_CALL_SUCCESSFUL_ONE_EVENT_NO_SELF_CHARGED);
                    encode_updates(w, updates);
                    events[0].encode_shared(w);
                    gas_consumed.encode(w);
                    result.encode(w);
                } else {
                    w.write_u8(selectors::response::METHOD_CALL_SUCCESSFUL);
                    encode_updates(w, updates);
                    encode_events(w, events);
                    gas_consumed.encode(w);
                    result.encode(w);
                    w.write_bool(*self_charged);
                }
            }
            Self::VoidMethodCallSuccessful {
                updates,
                events,
                gas_consumed,
                self_charged,
            } => {
                if events.is_empty() && !self_charged {
                    w.write_u8(selectors::response::VOID_METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED);
                    encode_updates(w, updates);
                    gas_consumed.encode(w);
                } else {
                    w.write_u8(selectors::response::VOID_METHOD_CALL_SUCCESSFUL);
                    encode_updates(w, updates);
                    encode_events(w, events);
                    gas_consumed.encode(w);
                    w.write_bool(*self_charged);
                }
            }
            Self::MethodCallException {
                updates,
                events,
                gas_consumed,
                cause,
            } => {
                w.write_u8(selectors::response::METHOD_CALL_EXCEPTION);
                encode_updates(w, updates);
                encode_events(w, events);
                gas_consumed.encode(w);
                cause.encode(w);
            }
            Self::MethodCallFailed {
                updates,
                gas_consumed,
                gas_consumed_for_penalty,
                cause,
            } => {
                w.write_u8(selectors::response::METHOD_CALL_FAILED);
                encode_updates(w, updates);
                gas_consumed.encode(w);
                w.write_big_integer(gas_consumed_for_penalty);
                cause.encode(w);
            }
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let selector = r.read_u8()?;
        Ok(match selector {
            selectors::response::GAMETE_CREATION => {
                let updates = decode_updates(r)?;
                let gamete = StorageReference::decode_shared(r)?;
                Self::GameteCreation { updates, gamete }
            }
            selectors::response::JAR_STORE_INITIAL => {
                let instrumented_jar = r.read_array(|r| r.read_u8())?;
                let dependencies = r.read_array(TransactionReference::decode_shared)?;
                Self::JarStoreInitial {
                    instrumented_jar,
                    dependencies,
                }
            }
            selectors::response::INITIALIZATION => Self::Initialization,
            selectors::response::JAR_STORE_SUCCESSFUL => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let instrumented_jar = r.read_array(|r| r.read_u8())?;
                let dependencies = r.read_array(TransactionReference::decode_shared)?;
                Self::JarStoreSuccessful {
                    updates,
                    gas_consumed,
                    instrumented_jar,
                    dependencies,
                }
            }
            selectors::response::JAR_STORE_FAILED => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let gas_consumed_for_penalty = r.read_big_integer()?;
                let cause = Cause::decode(r)?;
                Self::JarStoreFailed {
                    updates,
                    gas_consumed,
                    gas_consumed_for_penalty,
                    cause,
                }
            }
            selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL_NO_EVENTS => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let new_object = StorageReference::decode_shared(r)?;
                Self::ConstructorCallSuccessful {
                    updates,
                    events: Vec::new(),
                    gas_consumed,
                    new_object,
                    self_charged: false,
                }
            }
            selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL => {
                let updates = decode_updates(r)?;
                let events = decode_events(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let new_object = StorageReference::decode_shared(r)?;
                let self_charged = r.read_bool()?;
                Self::ConstructorCallSuccessful {
                    updates,
                    events,
                    gas_consumed,
                    new_object,
                    self_charged,
                }
            }
            selectors::response::CONSTRUCTOR_CALL_EXCEPTION => {
                let updates = decode_updates(r)?;
                let events = decode_events(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let cause = Cause::decode(r)?;
                Self::ConstructorCallException {
                    updates,
                    events,
                    gas_consumed,
                    cause,
                }
            }
            selectors::response::CONSTRUCTOR_CALL_FAILED => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let gas_consumed_for_penalty = r.read_big_integer()?;
                let cause = Cause::decode(r)?;
                Self::ConstructorCallFailed {
                    updates,
                    gas_consumed,
                    gas_consumed_for_penalty,
                    cause,
                }
            }
            selectors::response::METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let result = StorageValue::decode(r)?;
                Self::MethodCallSuccessful {
                    updates,
                    events: Vec::new(),
                    gas_consumed,
                    result,
                    self_charged: false,
                }
            }
            selectors::response::METHOD_CALL_SUCCESSFUL_ONE_EVENT_NO_SELF_CHARGED => {
                let updates = decode_updates(r)?;
                let event = StorageReference::decode_shared(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let result = StorageValue::decode(r)?;
                Self::MethodCallSuccessful {
                    updates,
                    events: vec![event],
                    gas_consumed,
                    result,
                    self_charged: false,
                }
            }
            selectors::response::METHOD_CALL_SUCCESSFUL => {
                let updates = decode_updates(r)?;
                let events = decode_events(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let result = StorageValue::decode(r)?;
                let self_charged = r.read_bool()?;
                Self::MethodCallSuccessful {
                    updates,
                    events,
                    gas_consumed,
                    result,
                    self_charged,
                }
            }
            selectors::response::VOID_METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                Self::VoidMethodCallSuccessful {
                    updates,
                    events: Vec::new(),
                    gas_consumed,
                    self_charged: false,
                }
            }
            selectors::response::VOID_METHOD_CALL_SUCCESSFUL => {
                let updates = decode_updates(r)?;
                let events = decode_events(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let self_charged = r.read_bool()?;
                Self::VoidMethodCallSuccessful {
                    updates,
                    events,
                    gas_consumed,
                    self_charged,
                }
            }
            selectors::response::METHOD_CALL_EXCEPTION => {
                let updates = decode_updates(r)?;
                let events = decode_events(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let cause = Cause::decode(r)?;
                Self::MethodCallException {
                    updates,
                    events,
                    gas_consumed,
                    cause,
                }
            }
            selectors::response::METHOD_CALL_FAILED => {
                let updates = decode_updates(r)?;
                let gas_consumed = GasConsumed::decode(r)?;
                let gas_consumed_for_penalty = r.read_big_integer()?;
                let cause = Cause::decode(r)?;
                Self::MethodCallFailed {
                    updates,
                    gas_consumed,
                    gas_consumed_for_penalty,
                    cause,
                }
            }
            other => return Err(CodecError::UnknownSelector(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::Hash;

    fn tr(byte: u8) -> TransactionReference {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TransactionReference::new(Hash::new(bytes))
    }

    fn sr(byte: u8, progressive: u64) -> StorageReference {
        StorageReference::new(tr(byte), progressive)
    }

    fn gas() -> GasConsumed {
        GasConsumed::new(BigInt::from(10), BigInt::from(2), BigInt::from(1))
    }

    fn roundtrip(response: &Response) -> Response {
        let mut w = Writer::new();
        response.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        Response::decode(&mut r).unwrap()
    }

    #[test]
    fn gamete_creation_roundtrips() {
        let response = Response::GameteCreation {
            updates: vec![],
            gamete: sr(1, 0),
        };
        assert_eq!(roundtrip(&response), response);
    }

    #[test]
    fn method_call_successful_picks_compact_selector_for_zero_events() {
        let response = Response::MethodCallSuccessful {
            updates: vec![],
            events: vec![],
            gas_consumed: gas(),
            result: StorageValue::Int(7),
            self_charged: false,
        };
        let mut w = Writer::new();
        response.encode(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], selectors::response::METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED);
        assert_eq!(roundtrip(&response), response);
    }

    #[test]
    fn method_call_successful_picks_compact_selector_for_one_event() {
        let response = Response::MethodCallSuccessful {
            updates: vec![],
            events: vec![sr(2, 0)],
            gas_consumed: gas(),
            result: StorageValue::Null,
            self_charged: false,
        };
        let mut w = Writer::new();
        response.encode(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], selectors::response::METHOD_CALL_SUCCESSFUL_ONE_EVENT_NO_SELF_CHARGED);
        assert_eq!(roundtrip(&response), response);
    }

    #[test]
    fn method_call_successful_falls_back_to_full_selector_for_self_charged_or_many_events() {
        let self_charged = Response::MethodCallSuccessful {
            updates: vec![],
            events: vec![],
            gas_consumed: gas(),
            result: StorageValue::Boolean(true),
            self_charged: true,
        };
        let mut w = Writer::new();
        self_charged.encode(&mut w);
        assert_eq!(w.into_bytes()[0], selectors::response::METHOD_CALL_SUCCESSFUL);
        assert_eq!(roundtrip(&self_charged), self_charged);

        let many_events = Response::MethodCallSuccessful {
            updates: vec![],
            events: vec![sr(3, 0), sr(4, 0)],
            gas_consumed: gas(),
            result: StorageValue::Boolean(false),
            self_charged: false,
        };
        let mut w = Writer::new();
        many_events.encode(&mut w);
        assert_eq!(w.into_bytes()[0], selectors::response::METHOD_CALL_SUCCESSFUL);
        assert_eq!(roundtrip(&many_events), many_events);
    }

    #[test]
    fn constructor_call_successful_compact_vs_full() {
        let compact = Response::ConstructorCallSuccessful {
            updates: vec![],
            events: vec![],
            gas_consumed: gas(),
            new_object: sr(5, 0),
            self_charged: false,
        };
        let mut w = Writer::new();
        compact.encode(&mut w);
        assert_eq!(w.into_bytes()[0], selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL_NO_EVENTS);
        assert_eq!(roundtrip(&compact), compact);

        let full = Response::ConstructorCallSuccessful {
            updates: vec![],
            events: vec![sr(6, 0)],
            gas_consumed: gas(),
            new_object: sr(5, 0),
            self_charged: false,
        };
        let mut w = Writer::new();
        full.encode(&mut w);
        assert_eq!(w.into_bytes()[0], selectors::response::CONSTRUCTOR_CALL_SUCCESSFUL);
        assert_eq!(roundtrip(&full), full);
    }

    #[test]
    fn void_method_call_successful_compact_vs_full() {
        let compact = Response::VoidMethodCallSuccessful {
            updates: vec![],
            events: vec![],
            gas_consumed: gas(),
            self_charged: false,
        };
        let mut w = Writer::new();
        compact.encode(&mut w);
        assert_eq!(w.into_bytes()[0], selectors::response::VOID_METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED);
        assert_eq!(roundtrip(&compact), compact);
    }

    #[test]
    fn failure_and_exception_variants_roundtrip() {
        let cause = Cause::new("java.lang.ArithmeticException", "/ by zero", "Account.java:42");
        for response in [
            Response::JarStoreFailed {
                updates: vec![],
                gas_consumed: gas(),
                gas_consumed_for_penalty: BigInt::from(1000),
                cause: cause.clone(),
            },
            Response::ConstructorCallFailed {
                updates: vec![],
                gas_consumed: gas(),
                gas_consumed_for_penalty: BigInt::from(1000),
                cause: cause.clone(),
            },
            Response::ConstructorCallException {
                updates: vec![],
                events: vec![],
                gas_consumed: gas(),
                cause: cause.clone(),
            },
            Response::MethodCallFailed {
                updates: vec![],
                gas_consumed: gas(),
                gas_consumed_for_penalty: BigInt::from(1000),
                cause: cause.clone(),
            },
            Response::MethodCallException {
                updates: vec![],
                events: vec![],
                gas_consumed: gas(),
                cause: cause.clone(),
            },
        ] {
            assert_eq!(roundtrip(&response), response);
        }
    }

    #[test]
    fn initial_response_variants_roundtrip() {
        for response in [
            Response::JarStoreInitial {
                instrumented_jar: vec![0xAB, 0xCD],
                dependencies: vec![tr(1)],
            },
            Response::Initialization,
        ] {
            assert_eq!(roundtrip(&response), response);
            assert!(response.is_initial());
        }
    }
}
