// Application layer - use cases and orchestration.
// Clients (the CLI, importers, tests) go through LedgerService; the pure
// balance and settlement computations live in the domain module.

pub mod error;
pub mod service;
pub mod summary;

pub use error::*;
pub use service::*;
pub use summary::*;
