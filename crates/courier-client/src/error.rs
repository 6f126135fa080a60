use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{message} ({status})")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No chat is open")]
    NoOpenChat,
}

impl ClientError {
    /// Error kind reported by the server, if this came from the server.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
