//! # courrier-engine
//!
//! The message synchronization and delivery engine.
//!
//! The engine keeps a local replica of conversations and messages in sync
//! with a remote messaging service.  All mutation (UI actions, push
//! notifications, delivery results) funnels through sparse patches applied
//! by the store, after which typed change events are broadcast to
//! observers.  Outbound messages move through a status state machine driven
//! by a single serialized send worker; encrypted messages are classified and
//! decrypted in batches with per-conversation session keys; bare numeric
//! participant ids resolve through a cache-or-network owner resolver.
//!
//! Entry point: [`MessagesEngine`].

pub mod compose;
pub mod decryptor;
pub mod engine;
pub mod events;
pub mod history;
pub mod mapper;
pub mod owners;
pub mod reconciler;
pub mod send_queue;

mod error;

pub use compose::MessageBuilder;
pub use engine::{MessagesEngine, Remote, Stores};
pub use error::{EngineError, Result};
pub use history::{Conversation, Dialog, MessagesPage};
pub use owners::{Mode, OwnersResolver};
