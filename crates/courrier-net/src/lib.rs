//! # courrier-net
//!
//! Remote-service contracts for the Courrier messaging core.
//!
//! The wire transport itself (HTTP client, long-poll decoder, media
//! uploader) lives outside this workspace; the engine depends only on the
//! traits and payload types defined here.

pub mod accounts;
pub mod api;
pub mod dto;
pub mod push;
pub mod uploads;

mod error;

pub use accounts::AccountsRegistry;
pub use api::{RemoteAccountsApi, RemoteMediaApi, RemoteMessagesApi, RemoteOwnersApi};
pub use error::{NetError, Result};
pub use uploads::{Upload, UploadDestination, UploadManager, UploadResult, UploadStatus};
