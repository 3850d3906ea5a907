//! Bit-exact selector byte values (, "External interfaces"). These
//! are load-bearing wire constants: changing any of them breaks every
//! previously-persisted transaction reference and response.

/// Shared-table control byte: next occurrence is given as a 32-bit index.
pub const NEXT_INDEX: u8 = 254;
/// Shared-table control byte: first occurrence, full encoding follows.
pub const FIRST_OCCURRENCE: u8 = 255;

/// Selectors for `StorageValue` variants.
pub mod value {
    pub const BOOLEAN_FALSE: u8 = 0;
    pub const BOOLEAN_TRUE: u8 = 1;
    pub const BYTE: u8 = 2;
    pub const CHAR: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const FLOAT: u8 = 5;
    pub const LONG: u8 = 7;
    pub const NULL: u8 = 8;
    pub const SHORT: u8 = 9;
    pub const STRING: u8 = 10;
    pub const STORAGE_REFERENCE: u8 = 11;
    pub const ENUM: u8 = 12;
    pub const EMPTY_STRING: u8 = 13;
    pub const INT: u8 = 14;
    // Reserved for a future big-integer-carrying variant selector; 
    // `big-integer` has no bit-exact selector assigned alongside the other
    // twelve value kinds. Encoded with a selector outside the 0..=14 range
    // reserved above so it cannot collide if one is assigned later.
    pub const BIG_INTEGER: u8 = 15;

    pub fn is_known(selector: u8) -> bool {
        matches!(
            selector,
            BOOLEAN_FALSE | BOOLEAN_TRUE | BYTE | CHAR | DOUBLE | FLOAT | LONG | NULL | SHORT
                | STRING | STORAGE_REFERENCE | ENUM | EMPTY_STRING | INT | BIG_INTEGER
        )
    }
}

/// Selectors for `Response` variants.
pub mod response {
    pub const GAMETE_CREATION: u8 = 0;
    pub const JAR_STORE_INITIAL: u8 = 1;
    pub const JAR_STORE_SUCCESSFUL: u8 = 2;
    pub const JAR_STORE_FAILED: u8 = 3;
    pub const CONSTRUCTOR_CALL_FAILED: u8 = 4;
    pub const CONSTRUCTOR_CALL_EXCEPTION: u8 = 5;
    pub const CONSTRUCTOR_CALL_SUCCESSFUL: u8 = 6;
    pub const VOID_METHOD_CALL_SUCCESSFUL: u8 = 7;
    pub const METHOD_CALL_FAILED: u8 = 8;
    pub const METHOD_CALL_SUCCESSFUL: u8 = 9;
    pub const METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED: u8 = 10;
    pub const METHOD_CALL_SUCCESSFUL_ONE_EVENT_NO_SELF_CHARGED: u8 = 11;
    pub const VOID_METHOD_CALL_SUCCESSFUL_NO_EVENTS_NO_SELF_CHARGED: u8 = 12;
    pub const CONSTRUCTOR_CALL_SUCCESSFUL_NO_EVENTS: u8 = 13;
    pub const INITIALIZATION: u8 = 14;
    // Spec §6 lists bit-exact selectors 0..=14 and every one of those
    // fifteen values is accounted for by the other variants above, but a
    // method call's declared-exception outcome ("method-call ...
    // exception") has no assigned byte among them — unlike
    // `constructor-call-exception`, which does. Reserved outside the
    // 0..=14 range for the same reason as `value::BIG_INTEGER`.
    pub const METHOD_CALL_EXCEPTION: u8 = 15;
}

/// Selectors for constructor signatures.
pub mod constructor {
    pub const GENERIC: u8 = 0;
    pub const EOA_CANONICAL: u8 = 3;
}

/// Selectors for `Update` variants. Not bit-exact in  (it says
/// "updates use the numbers present in the data model" rather than listing
/// them), so these are internally consistent but not cross-checked against
/// an external format; documented here so the codec and `tessera-types`
/// agree on one place of truth.
pub mod update {
    /// Leading kind byte distinguishing a class-tag update from a field
    /// update, written before the object reference. Needed because an
    /// object's own shared-table control byte can itself be `0` (a
    /// back-reference to table index 0), so the two cannot be told apart by
    /// peeking at what follows — the kind must be tagged explicitly first.
    pub const KIND_CLASS_TAG: u8 = 0;
    pub const KIND_FIELD: u8 = 1;

    pub const FIELD_BOOLEAN: u8 = 1;
    pub const FIELD_BYTE: u8 = 2;
    pub const FIELD_CHAR: u8 = 3;
    pub const FIELD_DOUBLE: u8 = 4;
    pub const FIELD_FLOAT: u8 = 5;
    pub const FIELD_INT: u8 = 6;
    pub const FIELD_LONG: u8 = 7;
    pub const FIELD_SHORT: u8 = 8;
    pub const FIELD_STRING: u8 = 9;
    pub const FIELD_BIG_INTEGER: u8 = 10;
    pub const FIELD_ENUM: u8 = 11;
    pub const FIELD_STORAGE: u8 = 12;
    pub const FIELD_NULL_OF_TYPE: u8 = 13;
}

/// Selectors for `StorageType` variants (basic types plus the class-type
/// tag). Basics sort before class types 
pub mod ty {
    pub const BOOLEAN: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const CHAR: u8 = 2;
    pub const SHORT: u8 = 3;
    pub const INT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const FLOAT: u8 = 6;
    pub const DOUBLE: u8 = 7;
    pub const OBJECT: u8 = 8;
    pub const CLASS_TYPE: u8 = 9;
}

/// Selectors for `Request` variants.
pub mod request {
    pub const JAR_STORE_INITIAL: u8 = 0;
    pub const GAMETE_CREATION: u8 = 1;
    pub const INITIALIZATION: u8 = 2;
    pub const JAR_STORE: u8 = 3;
    pub const CONSTRUCTOR_CALL: u8 = 4;
    pub const INSTANCE_METHOD_CALL: u8 = 5;
    pub const STATIC_METHOD_CALL: u8 = 6;
}
