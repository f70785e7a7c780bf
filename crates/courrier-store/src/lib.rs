//! # courrier-store
//!
//! Local-store contracts for the Courrier messaging core.
//!
//! The relational storage engine itself lives outside this workspace; what
//! the core depends on is the trait surface defined here: typed CRUD keyed by
//! `(account id, local id)` / `(account id, peer id)`, sparse patch
//! application, and the handful of range queries the reconciliation engine
//! and send queue need.  Every operation is transactional per call and a
//! suspension point for the caller.
//!
//! [`MemoryStore`] is a reference implementation over process memory, used
//! by the engine's tests and by embedders that do not bring a relational
//! backend.

pub mod criteria;
pub mod keys;
pub mod memory;
pub mod messages;
pub mod owners;
pub mod peers;

mod error;

pub use criteria::{DialogsCriteria, MessagesCriteria};
pub use error::{Result, StoreError};
pub use keys::KeysStore;
pub use memory::MemoryStore;
pub use messages::{ForwardInfo, MessagesStore};
pub use owners::OwnersStore;
pub use peers::PeersStore;
