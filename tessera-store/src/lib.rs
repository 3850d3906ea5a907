//! The object store and its per-request delivery protocol: responses,
//! per-object histories, the manifest/commit-number info trie, and the
//! delivery-time error cache, all behind one observable [`StoreRoot`].

pub mod ledger;
pub mod root;
pub mod store;
pub mod transaction;

pub use ledger::{account_reference, balance_field, big_integer_field, nonce_field, ACCOUNT_CLASS_NAME};
pub use root::StoreRoot;
pub use store::{CheckableDepth, Store, StoreError, StoreView};
pub use transaction::{DeliveryContext, DeliveryOutcome, RejectionReason, StoreTransaction};
