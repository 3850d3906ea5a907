//! The node: public submission API, semaphore-gated polling, event
//! subscriptions, and the mempool/consensus callback boundary
//! (`post` → `check` → `deliver` → `commit_block`).

pub mod config;
pub mod events;
pub mod mempool;
pub mod node;
pub mod semaphore;

pub use config::{ConfigError, NodeConfig};
pub use events::{EventHandler, EventRegistry, SubscriptionId};
pub use mempool::{ImmediateMempool, Mempool, MempoolError};
pub use node::{Node, NodeError, NodeParameters};
pub use semaphore::SemaphoreRegistry;
