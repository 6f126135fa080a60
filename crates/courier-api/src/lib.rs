pub mod auth;
pub mod conversations;
mod convert;
pub mod error;
pub mod guard;
pub mod messages;
pub mod messaging;
pub mod middleware;
pub mod router;
pub mod state;
pub mod users;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, AppStateInner};
