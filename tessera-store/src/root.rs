//! The store's observable root ("Root merging. A store commit
//! produces a concatenation of the roots of its constituent tries. The
//! concatenation becomes the store's observable hash.").

use tessera_crypto::Hash;

/// The concatenation of the four constituent tries' roots, in a fixed
/// order. `checkout(root)` slices this back into its four 32-byte pieces
///.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StoreRoot {
    pub responses: Hash,
    pub info: Hash,
    pub history: Hash,
    pub errors: Hash,
}

pub const ENCODED_LEN: usize = 32 * 4;

impl StoreRoot {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn to_bytes(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        out[0..32].copy_from_slice(self.responses.as_bytes());
        out[32..64].copy_from_slice(self.info.as_bytes());
        out[64..96].copy_from_slice(self.history.as_bytes());
        out[96..128].copy_from_slice(self.errors.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; ENCODED_LEN]) -> Self {
        let mut slot = |range: std::ops::Range<usize>| {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes[range]);
            Hash::new(arr)
        };
        Self {
            responses: slot(0..32),
            info: slot(32..64),
            history: slot(64..96),
            errors: slot(96..128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let root = StoreRoot {
            responses: Hash::new([1; 32]),
            info: Hash::new([2; 32]),
            history: Hash::new([3; 32]),
            errors: Hash::new([4; 32]),
        };
        assert_eq!(StoreRoot::from_bytes(&root.to_bytes()), root);
    }

    #[test]
    fn zero_root_is_all_zero_bytes() {
        assert_eq!(StoreRoot::zero().to_bytes(), [0u8; ENCODED_LEN]);
    }
}
