//! Transaction and storage references.

use std::fmt;

use tessera_codec::{CodecError, Reader, Writer};
use tessera_crypto::Hash;

/// A 32-byte content hash of a request's canonical encoding (minus its
/// signature field, for signed requests). Carries no progressive index —
/// only [`StorageReference`] does.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TransactionReference(Hash);

impl TransactionReference {
    pub fn new(hash: Hash) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> Hash {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Encodes this TR through the shared back-reference table.
    pub fn encode_shared(&self, w: &mut Writer) {
        w.write_shared(self, |w, tr| w.write_bytes(tr.as_bytes()));
    }

    pub fn decode_shared(r: &mut Reader) -> Result<Self, CodecError> {
        r.read_shared(|r| {
            let bytes = r.read_bytes(32)?;
            let mut arr = [0u8; 32];
            arr.copy_from_slice(bytes);
            Ok(Self(Hash::new(arr)))
        })
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The pair `(transaction, progressive)` identifying one storage object.
/// `progressive = 0` is the canonical first object created by a
/// transaction. Totally ordered lexicographically by `(transaction,
/// progressive)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StorageReference {
    pub transaction: TransactionReference,
    pub progressive: u64,
}

impl StorageReference {
    pub fn new(transaction: TransactionReference, progressive: u64) -> Self {
        Self {
            transaction,
            progressive,
        }
    }

    /// The canonical first object created by `transaction`.
    pub fn first(transaction: TransactionReference) -> Self {
        Self::new(transaction, 0)
    }

    pub fn encode_shared(&self, w: &mut Writer) {
        w.write_shared(self, |w, sr| {
            sr.transaction.encode_shared(w);
            w.write_u64(sr.progressive);
        });
    }

    pub fn decode_shared(r: &mut Reader) -> Result<Self, CodecError> {
        r.read_shared(|r| {
            let transaction = TransactionReference::decode_shared(r)?;
            let progressive = r.read_u64()?;
            Ok(Self {
                transaction,
                progressive,
            })
        })
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction, self.progressive)
    }
}
