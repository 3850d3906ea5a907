//! Field and class-tag updates.

use std::cmp::Ordering;

use num_bigint::BigInt;
use tessera_codec::{selectors, CodecError, Reader, Writer};

use crate::reference::{StorageReference, TransactionReference};
use crate::ty::{FieldSignature, StorageType};

/// The value half of a field update: one constant per primitive plus
/// big-integer, string, enum, storage-reference, and the typed-null marker
/// ("for `big-integer`, `string`, `enum` emit the specific
/// update or a `null-of-type` if null").
#[derive(Clone, PartialEq, Debug)]
pub enum FieldValue {
    Boolean(bool),
    Byte(i8),
    Char(char),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i16),
    String(String),
    BigInteger(BigInt),
    Enum {
        class_name: String,
        literal_name: String,
    },
    Storage(StorageReference),
    NullOfType(StorageType),
}

fn field_value_rank(value: &FieldValue) -> u8 {
    use FieldValue::*;
    match value {
        Boolean(_) => 0,
        Byte(_) => 1,
        Char(_) => 2,
        Double(_) => 3,
        Float(_) => 4,
        Int(_) => 5,
        Long(_) => 6,
        Short(_) => 7,
        String(_) => 8,
        BigInteger(_) => 9,
        Enum { .. } => 10,
        Storage(_) => 11,
        NullOfType(_) => 12,
    }
}

impl Eq for FieldValue {}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use FieldValue::*;
        field_value_rank(self)
            .cmp(&field_value_rank(other))
            .then_with(|| match (self, other) {
                (Boolean(a), Boolean(b)) => a.cmp(b),
                (Byte(a), Byte(b)) => a.cmp(b),
                (Char(a), Char(b)) => a.cmp(b),
                (Double(a), Double(b)) => a.to_bits().cmp(&b.to_bits()),
                (Float(a), Float(b)) => a.to_bits().cmp(&b.to_bits()),
                (Int(a), Int(b)) => a.cmp(b),
                (Long(a), Long(b)) => a.cmp(b),
                (Short(a), Short(b)) => a.cmp(b),
                (String(a), String(b)) => a.cmp(b),
                (BigInteger(a), BigInteger(b)) => a.cmp(b),
                (
                    Enum {
                        class_name: ac,
                        literal_name: al,
                    },
                    Enum {
                        class_name: bc,
                        literal_name: bl,
                    },
                ) => ac.cmp(bc).then_with(|| al.cmp(bl)),
                (Storage(a), Storage(b)) => a.cmp(b),
                (NullOfType(a), NullOfType(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

impl FieldValue {
    fn encode(&self, w: &mut Writer) {
        use FieldValue::*;
        match self {
            Boolean(v) => {
                w.write_u8(selectors::update::FIELD_BOOLEAN);
                w.write_bool(*v);
            }
            Byte(v) => {
                w.write_u8(selectors::update::FIELD_BYTE);
                w.write_u8(*v as u8);
            }
            Char(v) => {
                w.write_u8(selectors::update::FIELD_CHAR);
                w.write_char(*v);
            }
            Double(v) => {
                w.write_u8(selectors::update::FIELD_DOUBLE);
                w.write_f64(*v);
            }
            Float(v) => {
                w.write_u8(selectors::update::FIELD_FLOAT);
                w.write_f32(*v);
            }
            Int(v) => {
                w.write_u8(selectors::update::FIELD_INT);
                w.write_i32(*v);
            }
            Long(v) => {
                w.write_u8(selectors::update::FIELD_LONG);
                w.write_i64(*v);
            }
            Short(v) => {
                w.write_u8(selectors::update::FIELD_SHORT);
                w.write_i16(*v);
            }
            String(s) => {
                w.write_u8(selectors::update::FIELD_STRING);
                w.write_shared(s, |w, s| w.write_string_unshared(s));
            }
            BigInteger(v) => {
                w.write_u8(selectors::update::FIELD_BIG_INTEGER);
                w.write_big_integer(v);
            }
            Enum {
                class_name,
                literal_name,
            } => {
                w.write_u8(selectors::update::FIELD_ENUM);
                w.write_shared(class_name, |w, s| w.write_string_unshared(s));
                w.write_shared(literal_name, |w, s| w.write_string_unshared(s));
            }
            Storage(sr) => {
                w.write_u8(selectors::update::FIELD_STORAGE);
                sr.encode_shared(w);
            }
            NullOfType(ty) => {
                w.write_u8(selectors::update::FIELD_NULL_OF_TYPE);
                ty.encode(w);
            }
        }
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        use FieldValue::*;
        let selector = r.read_u8()?;
        Ok(match selector {
            selectors::update::FIELD_BOOLEAN => Boolean(r.read_bool()?),
            selectors::update::FIELD_BYTE => Byte(r.read_u8()? as i8),
            selectors::update::FIELD_CHAR => Char(r.read_char()?),
            selectors::update::FIELD_DOUBLE => Double(r.read_f64()?),
            selectors::update::FIELD_FLOAT => Float(r.read_f32()?),
            selectors::update::FIELD_INT => Int(r.read_i32()?),
            selectors::update::FIELD_LONG => Long(r.read_i64()?),
            selectors::update::FIELD_SHORT => Short(r.read_i16()?),
            selectors::update::FIELD_STRING => String(r.read_shared(|r| r.read_string_unshared())?),
            selectors::update::FIELD_BIG_INTEGER => BigInteger(r.read_big_integer()?),
            selectors::update::FIELD_ENUM => {
                let class_name = r.read_shared(|r| r.read_string_unshared())?;
                let literal_name = r.read_shared(|r| r.read_string_unshared())?;
                Enum {
                    class_name,
                    literal_name,
                }
            }
            selectors::update::FIELD_STORAGE => Storage(StorageReference::decode_shared(r)?),
            selectors::update::FIELD_NULL_OF_TYPE => NullOfType(StorageType::decode(r)?),
            other => return Err(CodecError::UnknownSelector(other)),
        })
    }
}

/// One entry of a transaction's emitted update set:
/// either the class-tag binding an object to its defining jar, or a typed
/// field update.
#[derive(Clone, PartialEq, Debug)]
pub enum Update {
    ClassTag {
        object: StorageReference,
        class_name: String,
        jar: TransactionReference,
    },
    Field {
        object: StorageReference,
        field: FieldSignature,
        value: FieldValue,
    },
}

impl Update {
    pub fn object(&self) -> StorageReference {
        match self {
            Self::ClassTag { object, .. } => *object,
            Self::Field { object, .. } => *object,
        }
    }

    pub fn class_tag(
        object: StorageReference,
        class_name: impl Into<std::string::String>,
        jar: TransactionReference,
    ) -> Self {
        Self::ClassTag {
            object,
            class_name: class_name.into(),
            jar,
        }
    }

    pub fn field(object: StorageReference, field: FieldSignature, value: FieldValue) -> Self {
        Self::Field { object, field, value }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::ClassTag {
                object,
                class_name,
                jar,
            } => {
                w.write_u8(selectors::update::KIND_CLASS_TAG);
                object.encode_shared(w);
                w.write_shared(class_name, |w, s| w.write_string_unshared(s));
                jar.encode_shared(w);
            }
            Self::Field { object, field, value } => {
                w.write_u8(selectors::update::KIND_FIELD);
                object.encode_shared(w);
                field.encode_shared(w);
                value.encode(w);
            }
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let kind = r.read_u8()?;
        match kind {
            selectors::update::KIND_CLASS_TAG => {
                let object = StorageReference::decode_shared(r)?;
                let class_name = r.read_shared(|r| r.read_string_unshared())?;
                let jar = TransactionReference::decode_shared(r)?;
                Ok(Self::ClassTag {
                    object,
                    class_name,
                    jar,
                })
            }
            selectors::update::KIND_FIELD => {
                let object = StorageReference::decode_shared(r)?;
                let field = FieldSignature::decode_shared(r)?;
                let value = FieldValue::decode(r)?;
                Ok(Self::Field { object, field, value })
            }
            other => Err(CodecError::UnknownSelector(other)),
        }
    }
}

impl Eq for Update {}

/// Rank used to order a class-tag update before any field update on the
/// same object — the class-tag establishes the object's existence, so it
/// logically precedes its field contents.
fn kind_rank(update: &Update) -> u8 {
    match update {
        Update::ClassTag { .. } => 0,
        Update::Field { .. } => 1,
    }
}

impl PartialOrd for Update {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Update {
    /// Object SR, then field signature, then value class.
    /// Class-tag updates have no field signature; they sort before any
    /// field update on the same object.
    fn cmp(&self, other: &Self) -> Ordering {
        self.object().cmp(&other.object()).then_with(|| {
            kind_rank(self).cmp(&kind_rank(other)).then_with(|| match (self, other) {
                (
                    Update::ClassTag {
                        class_name: ac,
                        jar: aj,
                        ..
                    },
                    Update::ClassTag {
                        class_name: bc,
                        jar: bj,
                        ..
                    },
                ) => ac.cmp(bc).then_with(|| aj.cmp(bj)),
                (
                    Update::Field { field: af, value: av, .. },
                    Update::Field { field: bf, value: bv, .. },
                ) => af.cmp(bf).then_with(|| av.cmp(bv)),
                _ => Ordering::Equal,
            })
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

    fn roundtrip(update: &Update) -> Update {
        let mut w = Writer::new();
        update.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        Update::decode(&mut r).unwrap()
    }

    #[test]
    fn class_tag_and_field_roundtrip() {
        let object = sr(1, 0);
        let class_tag = Update::class_tag(object, "io.tessera.Account", tr(9));
        assert_eq!(roundtrip(&class_tag), class_tag);

        let field = Update::field(
            object,
            FieldSignature::new(StorageType::class("io.tessera.Account"), "balance", StorageType::Long),
            FieldValue::Long(42),
        );
        assert_eq!(roundtrip(&field), field);
    }

    #[test]
    fn orders_by_object_then_class_tag_before_field() {
        let object = sr(1, 0);
        let class_tag = Update::class_tag(object, "io.tessera.Account", tr(9));
        let field = Update::field(
            object,
            FieldSignature::new(StorageType::class("io.tessera.Account"), "balance", StorageType::Long),
            FieldValue::Long(42),
        );
        assert!(class_tag < field);

        let other_object_field = Update::field(
            sr(2, 0),
            FieldSignature::new(StorageType::class("io.tessera.Account"), "balance", StorageType::Long),
            FieldValue::Long(1),
        );
        assert!(field < other_object_field);
    }

    #[test]
    fn orders_by_field_signature_then_value_class() {
        let object = sr(1, 0);
        let class = StorageType::class("io.tessera.Account");
        let a = Update::field(
            object,
            FieldSignature::new(class.clone(), "balance", StorageType::Long),
            FieldValue::Long(1),
        );
        let b = Update::field(
            object,
            FieldSignature::new(class, "owner", StorageType::class("io.tessera.EOA")),
            FieldValue::Storage(sr(3, 0)),
        );
        assert!(a < b, "\"balance\" sorts before \"owner\"");
    }

    #[test]
    fn null_of_type_roundtrips() {
        let object = sr(4, 0);
        let update = Update::field(
            object,
            FieldSignature::new(StorageType::class("A"), "next", StorageType::class("A")),
            FieldValue::NullOfType(StorageType::class("A")),
        );
        assert_eq!(roundtrip(&update), update);
    }
}
