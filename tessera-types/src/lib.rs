//! Immutable value objects for the wire data model: transaction
//! and storage references, storage values, storage/field/code signatures,
//! updates, requests, and responses. None of these types hold any I/O
//! state — every encode/decode is a pure function over a [`tessera_codec`]
//! `Writer`/`Reader`.

pub mod reference;
pub mod request;
pub mod response;
pub mod ty;
pub mod update;
pub mod value;

pub use reference::{StorageReference, TransactionReference};
pub use request::{Caller, Request};
pub use response::{Cause, GasConsumed, Response};
pub use ty::{CodeSignature, FieldSignature, StorageType};
pub use update::{FieldValue, Update};
pub use value::StorageValue;
