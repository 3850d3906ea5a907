//! Storage values. Each variant carries one selector byte (§6).

use std::cmp::Ordering;

use num_bigint::BigInt;
use tessera_codec::{selectors, CodecError, Reader, Writer};

use crate::reference::StorageReference;

/// A value that can be stored in an object's field, a method argument, or a
/// return value.
#[derive(Clone, PartialEq, Debug)]
pub enum StorageValue {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    String(String),
    Enum {
        class_name: String,
        literal_name: String,
    },
    Reference(StorageReference),
}

/// Rank used for the "value class" ordering tiebreak (, "then by
/// value class"). Assigned in the same order as the selector bytes in §6,
/// so the ordering used for sorting updates agrees with the wire layout.
fn rank(value: &StorageValue) -> u8 {
    use StorageValue::*;
    match value {
        Boolean(false) => 0,
        Boolean(true) => 1,
        Byte(_) => 2,
        Char(_) => 3,
        Double(_) => 4,
        Float(_) => 5,
        Long(_) => 7,
        Null => 8,
        Short(_) => 9,
        String(_) => 10,
        Reference(_) => 11,
        Enum { .. } => 12,
        BigInteger(_) => 15,
    }
}

impl Eq for StorageValue {}

impl PartialOrd for StorageValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use StorageValue::*;
        rank(self).cmp(&rank(other)).then_with(|| match (self, other) {
            (Boolean(_), Boolean(_)) => Ordering::Equal,
            (Byte(a), Byte(b)) => a.cmp(b),
            (Char(a), Char(b)) => a.cmp(b),
            (Short(a), Short(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.to_bits().cmp(&b.to_bits()),
            (Double(a), Double(b)) => a.to_bits().cmp(&b.to_bits()),
            (BigInteger(a), BigInteger(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Reference(a), Reference(b)) => a.cmp(b),
            (Enum { class_name: ac, literal_name: al }, Enum { class_name: bc, literal_name: bl }) => {
                ac.cmp(bc).then_with(|| al.cmp(bl))
            }
            (Null, Null) => Ordering::Equal,
            _ => Ordering::Equal,
        })
    }
}

impl StorageValue {
    pub fn encode(&self, w: &mut Writer) {
        use StorageValue::*;
        match self {
            Boolean(false) => w.write_u8(selectors::value::BOOLEAN_FALSE),
            Boolean(true) => w.write_u8(selectors::value::BOOLEAN_TRUE),
            Byte(v) => {
                w.write_u8(selectors::value::BYTE);
                w.write_u8(*v as u8);
            }
            Char(v) => {
                w.write_u8(selectors::value::CHAR);
                w.write_char(*v);
            }
            Double(v) => {
                w.write_u8(selectors::value::DOUBLE);
                w.write_f64(*v);
            }
            Float(v) => {
                w.write_u8(selectors::value::FLOAT);
                w.write_f32(*v);
            }
            Long(v) => {
                w.write_u8(selectors::value::LONG);
                w.write_i64(*v);
            }
            Null => w.write_u8(selectors::value::NULL),
            Short(v) => {
                w.write_u8(selectors::value::SHORT);
                w.write_i16(*v);
            }
            String(s) if s.is_empty() => w.write_u8(selectors::value::EMPTY_STRING),
            String(s) => {
                w.write_u8(selectors::value::STRING);
                w.write_shared(s, |w, s| w.write_string_unshared(s));
            }
            Reference(sr) => {
                w.write_u8(selectors::value::STORAGE_REFERENCE);
                sr.encode_shared(w);
            }
            Enum {
                class_name,
                literal_name,
            } => {
                w.write_u8(selectors::value::ENUM);
                w.write_shared(class_name, |w, s| w.write_string_unshared(s));
                w.write_shared(literal_name, |w, s| w.write_string_unshared(s));
            }
            Int(v) => {
                w.write_u8(selectors::value::INT);
                w.write_i32(*v);
            }
            BigInteger(v) => {
                w.write_u8(selectors::value::BIG_INTEGER);
                w.write_big_integer(v);
            }
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        use StorageValue::*;
        let selector = r.read_u8()?;
        Ok(match selector {
            selectors::value::BOOLEAN_FALSE => Boolean(false),
            selectors::value::BOOLEAN_TRUE => Boolean(true),
            selectors::value::BYTE => Byte(r.read_u8()? as i8),
            selectors::value::CHAR => Char(r.read_char()?),
            selectors::value::DOUBLE => Double(r.read_f64()?),
            selectors::value::FLOAT => Float(r.read_f32()?),
            selectors::value::LONG => Long(r.read_i64()?),
            selectors::value::NULL => Null,
            selectors::value::SHORT => Short(r.read_i16()?),
            selectors::value::STRING => String(r.read_shared(|r| r.read_string_unshared())?),
            selectors::value::STORAGE_REFERENCE => Reference(StorageReference::decode_shared(r)?),
            selectors::value::ENUM => {
                let class_name = r.read_shared(|r| r.read_string_unshared())?;
                let literal_name = r.read_shared(|r| r.read_string_unshared())?;
                Enum {
                    class_name,
                    literal_name,
                }
            }
            selectors::value::EMPTY_STRING => String(std::string::String::new()),
            selectors::value::INT => Int(r.read_i32()?),
            selectors::value::BIG_INTEGER => BigInteger(r.read_big_integer()?),
            other => return Err(CodecError::UnknownSelector(other)),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::TransactionReference;
    use tessera_crypto::Hash;

    fn roundtrip(value: &StorageValue) -> StorageValue {
        let mut w = Writer::new();
        value.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        StorageValue::decode(&mut r).unwrap()
    }

    #[test]
    fn int_14_matches_spec_scenario_1() {
        let value = StorageValue::Int(14);
        let mut w = Writer::new();
        value.encode(&mut w);
        assert_eq!(w.into_bytes(), vec![14, 0x00, 0x00, 0x00, 0x0E]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn all_variants_roundtrip() {
        let sr = StorageReference::first(TransactionReference::new(Hash::zero()));
        let values = vec![
            StorageValue::Null,
            StorageValue::Boolean(true),
            StorageValue::Boolean(false),
            StorageValue::Byte(-5),
            StorageValue::Char('z'),
            StorageValue::Short(-200),
            StorageValue::Int(-14),
            StorageValue::Long(i64::MIN),
            StorageValue::Float(1.5),
            StorageValue::Double(-2.25),
            StorageValue::BigInteger(BigInt::from(12345678901234_i64)),
            StorageValue::String("hello".into()),
            StorageValue::String(std::string::String::new()),
            StorageValue::Enum {
                class_name: "Color".into(),
                literal_name: "RED".into(),
            },
            StorageValue::Reference(sr),
        ];
        for value in &values {
            assert_eq!(&roundtrip(value), value);
        }
    }

    #[test]
    fn empty_and_nonempty_strings_use_distinct_selectors() {
        let mut empty = Writer::new();
        StorageValue::String(std::string::String::new()).encode(&mut empty);
        assert_eq!(empty.into_bytes(), vec![selectors::value::EMPTY_STRING]);
    }

    #[test]
    fn total_order_matches_selector_then_value() {
        assert!(StorageValue::Boolean(false) < StorageValue::Boolean(true));
        assert!(StorageValue::Boolean(true) < StorageValue::Byte(-128));
        assert!(StorageValue::Null < StorageValue::Short(0));
    }
}
