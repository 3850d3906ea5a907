//! Gas accounting, the sandbox collaborator contract, and response
//! construction for delivered transactions.

pub mod builder;
pub mod gas;
pub mod sandbox;

pub use builder::{BuildOutcome, Engine, EngineError};
pub use gas::{GasError, GasMeter};
pub use sandbox::{CallEffects, ConstructorOutcome, MethodOutcome, Sandbox, SandboxError};
