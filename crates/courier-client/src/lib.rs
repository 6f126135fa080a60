//! Client side of Courier: a typed HTTP client and the polling loop that
//! keeps a conversation list and the open chat up to date.

pub mod api;
pub mod error;
pub mod sync;

pub use api::ApiClient;
pub use error::ClientError;
pub use sync::{SyncHandle, SyncLoop, ViewState};
