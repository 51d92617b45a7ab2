//! Error types for the ticketing API client.
//!
//! # Design
//! The `Display` output of every variant is the human-readable message a
//! front-end shows to the user. `Rejected` carries the message already
//! extracted from the server's error body (or the operation's fallback), so
//! callers never need to look at raw response bodies.

use thiserror::Error;

/// Errors returned by `TicketClient` parse methods and `TicketDesk` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 401 on an authenticated endpoint. `TicketDesk`
    /// clears the stored token before returning this.
    #[error("Sesión expirada")]
    SessionExpired,

    /// A mutating call was attempted with no stored token; no request was sent.
    #[error("Sesión expirada")]
    NotAuthenticated,

    /// The server returned 404 for a single-ticket read.
    #[error("Error al cargar ticket")]
    NotFound,

    /// The server returned another non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The session store could not persist the token.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// True for both flavours of "the user has to log in again".
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::NotAuthenticated)
    }
}
