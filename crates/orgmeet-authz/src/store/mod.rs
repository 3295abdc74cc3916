//! Access store abstraction
//!
//! The production record store (collections, relation fields, cascade deletes)
//! is an external collaborator. Authorization only needs the read side defined
//! by [`AccessStore`]. [`InMemoryStore`] is a reference implementation that
//! enforces the same constraints the production schema declares, used by the
//! bundled decision service, fixtures and tests.

mod error;
mod memory;
mod provider;
mod snapshot;
mod traced;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use provider::{AccessStore, StoreStats};
pub use snapshot::Snapshot;
pub use traced::TracedStore;
