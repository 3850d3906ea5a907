//! Cryptography primitives: content hashing and signature-algorithm
//! verification. Mirrors the shape of a typical blockchain crypto crate —
//! small newtypes around a swappable backend, rather than passing raw byte
//! slices around the rest of the workspace.

use std::{convert::TryFrom, fmt};

use ed25519_dalek::Verifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of bytes in a [`Hash`].
pub const HASH_SIZE: usize = 32;

const BYTES_IN_DEBUG: usize = 4;

fn write_short_hex(f: &mut fmt::Formatter<'_>, slice: &[u8]) -> fmt::Result {
    for byte in slice.iter().take(BYTES_IN_DEBUG) {
        write!(f, "{:02x}", byte)?;
    }
    if slice.len() > BYTES_IN_DEBUG {
        write!(f, "...")?;
    }
    Ok(())
}

/// A 32-byte SHA-256 digest. Used both as a transaction reference and as the
/// key domain of the trie (§3, §6).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub fn zero() -> Self {
        Self([0; HASH_SIZE])
    }

    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_SIZE]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::MalformedHex)?;
        let arr: [u8; HASH_SIZE] =
            TryFrom::try_from(bytes.as_slice()).map_err(|_| CryptoError::MalformedHex)?;
        Ok(Self(arr))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(")?;
        write_short_hex(f, &self.0)?;
        write!(f, ")")
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hashes `data` with SHA-256.
///
/// This is the hash used for transaction references: the TR is
/// `SHA-256` of the canonical encoding of a request with its signature field
/// erased.
pub fn hash(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut bytes = [0; HASH_SIZE];
    bytes.copy_from_slice(&digest);
    Hash(bytes)
}

/// Incremental hasher for composing domain-separated hashes (e.g. trie
/// branch nodes, which hash a tag byte followed by child hashes).
#[derive(Default)]
pub struct HashStream(Sha256);

impl HashStream {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    #[must_use]
    pub fn update(mut self, chunk: &[u8]) -> Self {
        self.0.update(chunk);
        self
    }

    pub fn hash(self) -> Hash {
        let digest = self.0.finalize();
        let mut bytes = [0; HASH_SIZE];
        bytes.copy_from_slice(&digest);
        Hash(bytes)
    }
}

/// An Ed25519 public key.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        write_short_hex(f, &self.0)?;
        write!(f, ")")
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for PublicKey {}

/// A detached signature over an arbitrary byte string.
#[derive(Clone, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(")?;
        write_short_hex(f, &self.0)?;
        write!(f, ")")
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Signature {}

/// An Ed25519 keypair's secret half. Never serialized to the wire format;
/// only used by callers signing a request before submission.
pub struct SecretKey(ed25519_dalek::Keypair);

impl SecretKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public.to_bytes().to_vec())
    }
}

/// Generates a fresh Ed25519 keypair.
pub fn gen_keypair() -> (PublicKey, SecretKey) {
    let mut csprng = rand::rngs::OsRng;
    let keypair = ed25519_dalek::Keypair::generate(&mut csprng);
    let public = PublicKey(keypair.public.to_bytes().to_vec());
    (public, SecretKey(keypair))
}

/// Signs `data` with `secret_key` using Ed25519.
pub fn sign(data: &[u8], secret_key: &SecretKey) -> Signature {
    use ed25519_dalek::Signer;
    let sig = secret_key.0.sign(data);
    Signature(sig.to_bytes().to_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed hex string")]
    MalformedHex,
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("malformed signature")]
    MalformedSignature,
}

/// A caller's declared signature algorithm ("verify
/// (public-key, message, signature) for each declared algorithm"). New
/// concrete algorithms implement this trait; `Node`/`Engine` dispatch on the
/// algorithm named by the account rather than hard-coding Ed25519
/// everywhere.
pub trait SignatureAlgorithm: fmt::Debug + Send + Sync {
    /// Returns `true` iff `signature` is a valid signature of `message`
    /// under `public_key`, according to this algorithm. Malformed keys or
    /// signatures are treated as verification failures, not errors — the
    /// caller only needs a boolean for the bad-signature rejection path.
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;

    /// A human-readable algorithm name, included in rejection diagnostics.
    fn name(&self) -> &'static str;
}

/// The concrete Ed25519 algorithm used by ordinary externally-owned
/// accounts.
#[derive(Debug, Default)]
pub struct Ed25519Algorithm;

impl SignatureAlgorithm for Ed25519Algorithm {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let public = match ed25519_dalek::PublicKey::from_bytes(public_key.as_bytes()) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let sig = match ed25519_dalek::Signature::try_from(signature.as_bytes()) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        public.verify(message, &sig).is_ok()
    }

    fn name(&self) -> &'static str {
        "ed25519"
    }
}

/// The always-valid algorithm used by the unsigned faucet account: every
/// signature verifies, regardless of key or message.
#[derive(Debug, Default)]
pub struct EmptyAlgorithm;

impl SignatureAlgorithm for EmptyAlgorithm {
    fn verify(&self, _public_key: &PublicKey, _message: &[u8], _signature: &Signature) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "empty"
    }
}
