//! Requests. Non-initial requests carry a signature computed
//! over the canonical encoding with the signature field erased; hashing
//! that erased encoding yields the request's transaction reference.

use tessera_codec::{selectors, CodecError, Reader, Writer};
use tessera_crypto::{hash, Hash, PublicKey, Signature};

use crate::reference::TransactionReference;
use crate::ty::{CodeSignature, StorageType};
use crate::value::StorageValue;

/// The common fields of every signed, non-initial request ("signer
/// + ... + caller + nonce + chain-id + gas-limit + gas-price + classpath +
/// signature").
#[derive(Clone, PartialEq, Debug)]
pub struct Caller {
    pub public_key: PublicKey,
    pub caller: TransactionReference,
    pub nonce: num_bigint::BigInt,
    pub chain_id: String,
    pub gas_limit: num_bigint::BigInt,
    pub gas_price: num_bigint::BigInt,
    pub classpath: TransactionReference,
}

impl Caller {
    fn encode(&self, w: &mut Writer) {
        w.write_bytes(self.public_key.as_bytes());
        self.caller.encode_shared(w);
        w.write_big_integer(&self.nonce);
        w.write_shared(&self.chain_id, |w, s| w.write_string_unshared(s));
        w.write_big_integer(&self.gas_limit);
        w.write_big_integer(&self.gas_price);
        self.classpath.encode_shared(w);
    }

    fn decode(r: &mut Reader, public_key_len: usize) -> Result<Self, CodecError> {
        let public_key = PublicKey::from_bytes(r.read_bytes(public_key_len)?);
        let caller = TransactionReference::decode_shared(r)?;
        let nonce = r.read_big_integer()?;
        let chain_id = r.read_shared(|r| r.read_string_unshared())?;
        let gas_limit = r.read_big_integer()?;
        let gas_price = r.read_big_integer()?;
        let classpath = TransactionReference::decode_shared(r)?;
        Ok(Self {
            public_key,
            caller,
            nonce,
            chain_id,
            gas_limit,
            gas_price,
            classpath,
        })
    }
}

/// A request accepted by the node. Initial requests (jar-store-
/// initial, gamete-creation, initialization) carry no caller/signature and
/// skip signature/nonce checks (§4.G). Non-initial requests are signed.
#[derive(Clone, PartialEq, Debug)]
pub enum Request {
    JarStoreInitial {
        jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
    },
    GameteCreation {
        classpath: TransactionReference,
        initial_amounts: Vec<num_bigint::BigInt>,
        public_key: PublicKey,
    },
    Initialization {
        classpath: TransactionReference,
        manifest: crate::reference::StorageReference,
    },
    JarStore {
        caller: Caller,
        jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
        signature: Signature,
    },
    ConstructorCall {
        caller: Caller,
        constructor: CodeSignature,
        actuals: Vec<StorageValue>,
        signature: Signature,
    },
    InstanceMethodCall {
        caller: Caller,
        method: CodeSignature,
        receiver: crate::reference::StorageReference,
        actuals: Vec<StorageValue>,
        signature: Signature,
    },
    StaticMethodCall {
        caller: Caller,
        method: CodeSignature,
        actuals: Vec<StorageValue>,
        signature: Signature,
    },
}

const PUBLIC_KEY_LEN: usize = 32;

impl Request {
    /// `true` for the three bootstrap variants that skip signature/nonce
    /// checks ("Initial-request builders skip signature/nonce
    /// checks").
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            Self::JarStoreInitial { .. } | Self::GameteCreation { .. } | Self::Initialization { .. }
        )
    }

    pub fn caller(&self) -> Option<&Caller> {
        match self {
            Self::JarStore { caller, .. }
            | Self::ConstructorCall { caller, .. }
            | Self::InstanceMethodCall { caller, .. }
            | Self::StaticMethodCall { caller, .. } => Some(caller),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::JarStore { signature, .. }
            | Self::ConstructorCall { signature, .. }
            | Self::InstanceMethodCall { signature, .. }
            | Self::StaticMethodCall { signature, .. } => Some(signature),
            _ => None,
        }
    }

    /// Encodes the request. When `erase_signature` is set, a signed
    /// variant's signature field is written as its empty form (/// "`B'` is `B` with the signature field replaced by its empty form").
    pub fn encode(&self, w: &mut Writer, erase_signature: bool) {
        let sig = |w: &mut Writer, signature: &Signature| {
            let bytes: &[u8] = if erase_signature { &[] } else { signature.as_bytes() };
            w.write_u32(bytes.len() as u32);
            w.write_bytes(bytes);
        };

        match self {
            Self::JarStoreInitial { jar, dependencies } => {
                w.write_u8(selectors::request::JAR_STORE_INITIAL);
                w.write_array(jar, |w, b| w.write_u8(*b));
                w.write_array(dependencies, |w, d| d.encode_shared(w));
            }
            Self::GameteCreation {
                classpath,
                initial_amounts,
                public_key,
            } => {
                w.write_u8(selectors::request::GAMETE_CREATION);
                classpath.encode_shared(w);
                w.write_array(initial_amounts, |w, amount| w.write_big_integer(amount));
                w.write_bytes(public_key.as_bytes());
            }
            Self::Initialization { classpath, manifest } => {
                w.write_u8(selectors::request::INITIALIZATION);
                classpath.encode_shared(w);
                manifest.encode_shared(w);
            }
            Self::JarStore {
                caller,
                jar,
                dependencies,
                signature,
            } => {
                w.write_u8(selectors::request::JAR_STORE);
                caller.encode(w);
                w.write_array(jar, |w, b| w.write_u8(*b));
                w.write_array(dependencies, |w, d| d.encode_shared(w));
                sig(w, signature);
            }
            Self::ConstructorCall {
                caller,
                constructor,
                actuals,
                signature,
            } => {
                w.write_u8(selectors::request::CONSTRUCTOR_CALL);
                caller.encode(w);
                constructor.encode(w);
                w.write_array(actuals, |w, v| v.encode(w));
                sig(w, signature);
            }
            Self::InstanceMethodCall {
                caller,
                method,
                receiver,
                actuals,
                signature,
            } => {
                w.write_u8(selectors::request::INSTANCE_METHOD_CALL);
                caller.encode(w);
                method.encode(w);
                receiver.encode_shared(w);
                w.write_array(actuals, |w, v| v.encode(w));
                sig(w, signature);
            }
            Self::StaticMethodCall {
                caller,
                method,
                actuals,
                signature,
            } => {
                w.write_u8(selectors::request::STATIC_METHOD_CALL);
                caller.encode(w);
                method.encode(w);
                w.write_array(actuals, |w, v| v.encode(w));
                sig(w, signature);
            }
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let selector = r.read_u8()?;
        let read_sig = |r: &mut Reader| -> Result<Signature, CodecError> {
            let len = r.read_u32()? as usize;
            Ok(Signature::from_bytes(r.read_bytes(len)?))
        };
        Ok(match selector {
            selectors::request::JAR_STORE_INITIAL => {
                let jar = r.read_array(|r| r.read_u8())?;
                let dependencies = r.read_array(TransactionReference::decode_shared)?;
                Self::JarStoreInitial { jar, dependencies }
            }
            selectors::request::GAMETE_CREATION => {
                let classpath = TransactionReference::decode_shared(r)?;
                let initial_amounts = r.read_array(|r| r.read_big_integer())?;
                let public_key = PublicKey::from_bytes(r.read_bytes(PUBLIC_KEY_LEN)?);
                Self::GameteCreation {
                    classpath,
                    initial_amounts,
                    public_key,
                }
            }
            selectors::request::INITIALIZATION => {
                let classpath = TransactionReference::decode_shared(r)?;
                let manifest = crate::reference::StorageReference::decode_shared(r)?;
                Self::Initialization { classpath, manifest }
            }
            selectors::request::JAR_STORE => {
                let caller = Caller::decode(r, PUBLIC_KEY_LEN)?;
                let jar = r.read_array(|r| r.read_u8())?;
                let dependencies = r.read_array(TransactionReference::decode_shared)?;
                let signature = read_sig(r)?;
                Self::JarStore {
                    caller,
                    jar,
                    dependencies,
                    signature,
                }
            }
            selectors::request::CONSTRUCTOR_CALL => {
                let caller = Caller::decode(r, PUBLIC_KEY_LEN)?;
                let constructor = CodeSignature::decode(r)?;
                let actuals = r.read_array(StorageValue::decode)?;
                let signature = read_sig(r)?;
                Self::ConstructorCall {
                    caller,
                    constructor,
                    actuals,
                    signature,
                }
            }
            selectors::request::INSTANCE_METHOD_CALL => {
                let caller = Caller::decode(r, PUBLIC_KEY_LEN)?;
                let method = CodeSignature::decode(r)?;
                let receiver = crate::reference::StorageReference::decode_shared(r)?;
                let actuals = r.read_array(StorageValue::decode)?;
                let signature = read_sig(r)?;
                Self::InstanceMethodCall {
                    caller,
                    method,
                    receiver,
                    actuals,
                    signature,
                }
            }
            selectors::request::STATIC_METHOD_CALL => {
                let caller = Caller::decode(r, PUBLIC_KEY_LEN)?;
                let method = CodeSignature::decode(r)?;
                let actuals = r.read_array(StorageValue::decode)?;
                let signature = read_sig(r)?;
                Self::StaticMethodCall {
                    caller,
                    method,
                    actuals,
                    signature,
                }
            }
            other => return Err(CodecError::UnknownSelector(other)),
        })
    }

    /// The transaction reference: `SHA-256` of the canonical encoding with
    /// the signature field erased. Unsigned variants have no
    /// signature field to erase, so `erase_signature` is a no-op for them.
    pub fn transaction_reference(&self) -> TransactionReference {
        let mut w = Writer::new();
        self.encode(&mut w, true);
        TransactionReference::new(hash(w.bytes()))
    }

    /// Hashes arbitrary already-encoded bytes; exposed for callers that
    /// have a raw canonical encoding from elsewhere (e.g. a network
    /// message) and want the same derivation without re-decoding.
    pub fn hash_canonical_bytes(bytes: &[u8]) -> Hash {
        hash(bytes)
    }

    pub fn storage_type_of_formals(formals: &[StorageType]) -> Vec<StorageType> {
        formals.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_2_jar_store_initial_tr() {
        let request = Request::JarStoreInitial {
            jar: vec![0x00],
            dependencies: vec![],
        };
        let mut w = Writer::new();
        request.encode(&mut w, true);
        let bytes = w.into_bytes();

        let mut expected = vec![selectors::request::JAR_STORE_INITIAL];
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.push(0x00);
        expected.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(bytes, expected);

        let tr = request.transaction_reference();
        assert_eq!(tr.hash(), hash(&bytes));
    }

    #[test]
    fn erasing_signature_changes_nothing_for_unsigned_requests() {
        let request = Request::GameteCreation {
            classpath: TransactionReference::new(Hash::zero()),
            initial_amounts: vec![num_bigint::BigInt::from(1_000_000)],
            public_key: PublicKey::from_bytes(&[7u8; PUBLIC_KEY_LEN]),
        };
        let mut a = Writer::new();
        request.encode(&mut a, true);
        let mut b = Writer::new();
        request.encode(&mut b, false);
        assert_eq!(a.into_bytes(), b.into_bytes());
    }

    #[test]
    fn signed_request_roundtrips_and_erases_signature_for_its_tr() {
        let caller = Caller {
            public_key: PublicKey::from_bytes(&[1u8; PUBLIC_KEY_LEN]),
            caller: TransactionReference::new(Hash::zero()),
            nonce: num_bigint::BigInt::from(4),
            chain_id: "tessera-test".into(),
            gas_limit: num_bigint::BigInt::from(10_000),
            gas_price: num_bigint::BigInt::from(1),
            classpath: TransactionReference::new(Hash::zero()),
        };
        let request = Request::ConstructorCall {
            caller,
            constructor: CodeSignature::constructor(StorageType::class("io.tessera.Account"), vec![StorageType::Int]),
            actuals: vec![StorageValue::Int(7)],
            signature: Signature::from_bytes(&[9u8; 64]),
        };

        let mut full = Writer::new();
        request.encode(&mut full, false);
        let mut r = Reader::new(&full.into_bytes());
        let decoded = Request::decode(&mut r).unwrap();
        assert_eq!(decoded, request);

        let tr_a = request.transaction_reference();
        let request_tampered_sig = match request.clone() {
            Request::ConstructorCall { caller, constructor, actuals, .. } => Request::ConstructorCall {
                caller,
                constructor,
                actuals,
                signature: Signature::from_bytes(&[1u8; 64]),
            },
            _ => unreachable!(),
        };
        let tr_b = request_tampered_sig.transaction_reference();
        assert_eq!(tr_a, tr_b, "TR must not depend on the signature bytes");
    }
}
