//! On-disk node representation for the crit-bit (binary Patricia) trie.
//!
//! Keys are 32-byte hashes: "A 32-byte hash of the logical key
//! ... conflicting logical keys with the same 32-byte hash are treated as a
//! single entry." Branch nodes store the bit index they split on plus one
//! representative key from their subtree ("sample"), which is how a
//! crit-bit tree avoids storing explicit path prefixes: on lookup the bit
//! at each branch's index is checked without re-validating the shared
//! prefix, and the full key is only compared once, at the leaf.

use tessera_codec::{CodecError, Reader, Writer};
use tessera_crypto::{hash, Hash};

const TAG_LEAF: u8 = 0;
const TAG_BRANCH: u8 = 1;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Leaf {
        key: Hash,
        value: Vec<u8>,
    },
    Branch {
        bit_index: u16,
        sample_key: Hash,
        left: Hash,
        right: Hash,
    },
}

impl Node {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::Leaf { key, value } => {
                w.write_u8(TAG_LEAF);
                w.write_bytes(key.as_bytes());
                w.write_u32(value.len() as u32);
                w.write_bytes(value);
            }
            Self::Branch {
                bit_index,
                sample_key,
                left,
                right,
            } => {
                w.write_u8(TAG_BRANCH);
                w.write_u16(*bit_index);
                w.write_bytes(sample_key.as_bytes());
                w.write_bytes(left.as_bytes());
                w.write_bytes(right.as_bytes());
            }
        }
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let tag = r.read_u8()?;
        let node = match tag {
            TAG_LEAF => {
                let key = read_hash(&mut r)?;
                let len = r.read_u32()? as usize;
                let value = r.read_bytes(len)?.to_vec();
                Self::Leaf { key, value }
            }
            TAG_BRANCH => {
                let bit_index = r.read_u16()?;
                let sample_key = read_hash(&mut r)?;
                let left = read_hash(&mut r)?;
                let right = read_hash(&mut r)?;
                Self::Branch {
                    bit_index,
                    sample_key,
                    left,
                    right,
                }
            }
            other => return Err(CodecError::UnknownSelector(other)),
        };
        Ok(node)
    }

    /// The node's content address: `SHA-256` of its canonical encoding
    /// ("Root. A 32-byte hash of the root node").
    pub fn content_hash(&self) -> Hash {
        hash(&self.encode())
    }
}

fn read_hash(r: &mut Reader) -> Result<Hash, CodecError> {
    let bytes = r.read_bytes(32)?;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(bytes);
    Ok(Hash::new(arr))
}

/// Returns `true` iff bit `index` (0 = most significant bit of byte 0) of
/// `key` is set.
pub fn bit_at(key: &Hash, index: u16) -> bool {
    let byte = key.as_bytes()[(index / 8) as usize];
    let shift = 7 - (index % 8);
    (byte >> shift) & 1 == 1
}

/// The index of the first bit at which `a` and `b` differ, or `None` if
/// they are equal.
pub fn first_diff_bit(a: &Hash, b: &Hash) -> Option<u16> {
    for (i, (x, y)) in a.as_bytes().iter().zip(b.as_bytes().iter()).enumerate() {
        if x != y {
            let diff = x ^ y;
            let leading = diff.leading_zeros() as u16;
            return Some((i as u16) * 8 + leading);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[0] = byte;
        Hash::new(bytes)
    }

    #[test]
    fn leaf_roundtrips() {
        let node = Node::Leaf {
            key: h(1),
            value: vec![9, 9, 9],
        };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }

    #[test]
    fn branch_roundtrips() {
        let node = Node::Branch {
            bit_index: 17,
            sample_key: h(1),
            left: h(2),
            right: h(3),
        };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }

    #[test]
    fn first_diff_bit_finds_msb_difference() {
        let a = Hash::new([0b1000_0000; 32]);
        let mut b_bytes = [0b1000_0000; 32];
        b_bytes[0] = 0b0000_0000;
        let b = Hash::new(b_bytes);
        assert_eq!(first_diff_bit(&a, &b), Some(0));
        assert!(bit_at(&a, 0));
        assert!(!bit_at(&b, 0));
    }

    #[test]
    fn equal_keys_have_no_diff_bit() {
        assert_eq!(first_diff_bit(&h(5), &h(5)), None);
    }
}
