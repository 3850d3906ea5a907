//! Conventions for reading an externally-owned account's balance and nonce
//! out of the generic field-update stream ("read the caller's
//! nonce from its latest history ... check the caller's balance covers
//! `gas_limit * gas_price`"). The wire data model has no dedicated ledger
//! record — balance and nonce are ordinary object fields, observable the
//! same way any other field is via [`crate::store::StoreView::get_state`].

use num_bigint::BigInt;
use tessera_types::{FieldSignature, FieldValue, StorageReference, StorageType, TransactionReference, Update};

/// The well-known class every account object is tagged with. Not declared
/// anywhere in the wire format itself — a convention the sandbox's
/// standard library and this store must agree on.
pub const ACCOUNT_CLASS_NAME: &str = "io.takamaka.code.lang.ExternallyOwnedAccount";

pub fn balance_field() -> FieldSignature {
    FieldSignature::new(
        StorageType::class(ACCOUNT_CLASS_NAME),
        "balance",
        StorageType::class("java.math.BigInteger"),
    )
}

pub fn nonce_field() -> FieldSignature {
    FieldSignature::new(
        StorageType::class(ACCOUNT_CLASS_NAME),
        "nonce",
        StorageType::class("java.math.BigInteger"),
    )
}

/// The storage reference of the account object created by `creator` — the
/// canonical first object of its own creating transaction.
pub fn account_reference(creator: TransactionReference) -> StorageReference {
    StorageReference::first(creator)
}

/// Reads one field's value out of a coalesced update stream (the output of
/// `get_state`), defaulting to zero when the field was never set — true
/// for an account that exists but has not yet had its balance/nonce
/// written by gamete creation.
pub fn big_integer_field(state: &[Update], field: &FieldSignature) -> BigInt {
    state
        .iter()
        .find_map(|update| match update {
            Update::Field { field: f, value: FieldValue::BigInteger(v), .. } if f == field => Some(v.clone()),
            _ => None,
        })
        .unwrap_or_else(BigInt::default)
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

    #[test]
    fn missing_field_defaults_to_zero() {
        assert_eq!(big_integer_field(&[], &balance_field()), BigInt::default());
    }

    #[test]
    fn finds_the_matching_field_update() {
        let object = account_reference(tr(1));
        let state = vec![Update::field(object, balance_field(), FieldValue::BigInteger(BigInt::from(500)))];
        assert_eq!(big_integer_field(&state, &balance_field()), BigInt::from(500));
    }
}
