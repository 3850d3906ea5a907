//! Storage types and field/code signatures.

use std::fmt;

use tessera_codec::{selectors, CodecError, Reader, Writer};

/// A storage type: either one of the eight primitives plus `object`, or a
/// class type interned by the shared string table. Basics sort before
/// class types; among class types, by name — both follow
/// directly from the declaration order below plus the derived field
/// comparison on `ClassType`'s name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum StorageType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
    ClassType(String),
}

impl StorageType {
    pub fn class(name: impl Into<String>) -> Self {
        Self::ClassType(name.into())
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Self::Boolean => w.write_u8(selectors::ty::BOOLEAN),
            Self::Byte => w.write_u8(selectors::ty::BYTE),
            Self::Char => w.write_u8(selectors::ty::CHAR),
            Self::Short => w.write_u8(selectors::ty::SHORT),
            Self::Int => w.write_u8(selectors::ty::INT),
            Self::Long => w.write_u8(selectors::ty::LONG),
            Self::Float => w.write_u8(selectors::ty::FLOAT),
            Self::Double => w.write_u8(selectors::ty::DOUBLE),
            Self::Object => w.write_u8(selectors::ty::OBJECT),
            Self::ClassType(name) => {
                w.write_u8(selectors::ty::CLASS_TYPE);
                w.write_shared(name, |w, s| w.write_string_unshared(s));
            }
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let selector = r.read_u8()?;
        Ok(match selector {
            selectors::ty::BOOLEAN => Self::Boolean,
            selectors::ty::BYTE => Self::Byte,
            selectors::ty::CHAR => Self::Char,
            selectors::ty::SHORT => Self::Short,
            selectors::ty::INT => Self::Int,
            selectors::ty::LONG => Self::Long,
            selectors::ty::FLOAT => Self::Float,
            selectors::ty::DOUBLE => Self::Double,
            selectors::ty::OBJECT => Self::Object,
            selectors::ty::CLASS_TYPE => {
                let name: String = r.read_shared(|r| r.read_string_unshared())?;
                Self::ClassType(name)
            }
            other => return Err(CodecError::UnknownSelector(other)),
        })
    }

    pub fn is_basic(&self) -> bool {
        !matches!(self, Self::ClassType(_))
    }
}

/// `(defining-class, name, type)`. Hashed and compared structurally;
/// interned during a single marshalling scope, so it is one of
/// the codec's four shared-table domains alongside TRs, SRs, and strings.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FieldSignature {
    pub defining_class: StorageType,
    pub name: String,
    pub field_type: StorageType,
}

impl FieldSignature {
    pub fn new(defining_class: StorageType, name: impl Into<String>, field_type: StorageType) -> Self {
        Self {
            defining_class,
            name: name.into(),
            field_type,
        }
    }

    pub fn encode_shared(&self, w: &mut Writer) {
        w.write_shared(self, |w, sig| {
            sig.defining_class.encode(w);
            w.write_shared(&sig.name, |w, s| w.write_string_unshared(s));
            sig.field_type.encode(w);
        });
    }

    pub fn decode_shared(r: &mut Reader) -> Result<Self, CodecError> {
        r.read_shared(|r| {
            let defining_class = StorageType::decode(r)?;
            let name: String = r.read_shared(|r| r.read_string_unshared())?;
            let field_type = StorageType::decode(r)?;
            Ok(Self {
                defining_class,
                name,
                field_type,
            })
        })
    }
}

/// A constructor or method signature. Not subject to back-reference
/// interning (only TRs, SRs, field signatures, and strings are shared
/// interning domains).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CodeSignature {
    pub defining_class: StorageType,
    pub method_name: Option<String>,
    pub formals: Vec<StorageType>,
    pub return_type: Option<StorageType>,
}

impl CodeSignature {
    pub fn constructor(defining_class: StorageType, formals: Vec<StorageType>) -> Self {
        Self {
            defining_class,
            method_name: None,
            formals,
            return_type: None,
        }
    }

    pub fn method(
        defining_class: StorageType,
        method_name: impl Into<String>,
        formals: Vec<StorageType>,
        return_type: Option<StorageType>,
    ) -> Self {
        Self {
            defining_class,
            method_name: Some(method_name.into()),
            formals,
            return_type,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.method_name.is_none()
    }

    pub fn encode(&self, w: &mut Writer) {
        self.defining_class.encode(w);
        match &self.method_name {
            Some(name) => {
                w.write_bool(true);
                w.write_utf(name);
            }
            None => w.write_bool(false),
        }
        w.write_array(&self.formals, |w, f| f.encode(w));
        match &self.return_type {
            Some(ty) => {
                w.write_bool(true);
                ty.encode(w);
            }
            None => w.write_bool(false),
        }
    }

    pub fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let defining_class = StorageType::decode(r)?;
        let method_name = if r.read_bool()? {
            Some(r.read_utf()?)
        } else {
            None
        };
        let formals = r.read_array(StorageType::decode)?;
        let return_type = if r.read_bool()? {
            Some(StorageType::decode(r)?)
        } else {
            None
        };
        Ok(Self {
            defining_class,
            method_name,
            formals,
            return_type,
        })
    }
}

impl fmt::Display for CodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method_name {
            Some(name) => write!(f, "{:?}.{}(..)", self.defining_class, name),
            None => write!(f, "{:?}.<init>(..)", self.defining_class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basics_sort_before_class_types() {
        assert!(StorageType::Double < StorageType::class("java.lang.Object"));
    }

    #[test]
    fn class_types_sort_by_name() {
        assert!(StorageType::class("A") < StorageType::class("B"));
    }

    #[test]
    fn storage_type_roundtrip() {
        for ty in [
            StorageType::Boolean,
            StorageType::Int,
            StorageType::class("io.tessera.Account"),
        ] {
            let mut w = Writer::new();
            ty.encode(&mut w);
            let bytes = w.into_bytes();
            let mut r = Reader::new(&bytes);
            assert_eq!(StorageType::decode(&mut r).unwrap(), ty);
        }
    }

    #[test]
    fn field_signature_shared_roundtrip() {
        let sig = FieldSignature::new(StorageType::class("A"), "balance", StorageType::Long);
        let mut w = Writer::new();
        sig.encode_shared(&mut w);
        sig.encode_shared(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(FieldSignature::decode_shared(&mut r).unwrap(), sig);
        assert_eq!(FieldSignature::decode_shared(&mut r).unwrap(), sig);
    }
}
