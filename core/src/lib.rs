//! API client core for the technical-support ticketing service.
//!
//! # Overview
//! Two layers:
//! - `TicketClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network (host-does-IO pattern). It also maps
//!   the backend's Spanish, nested ticket DTOs onto the flat `Ticket` view
//!   model and turns error bodies into display messages.
//! - `TicketDesk` wraps it with a `Transport` and a `SessionStore`, owning the
//!   bearer-token lifecycle (store on login, clear on logout or 401).
//!
//! # Design
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.
//! - Error `Display` strings are the user-facing messages.

pub mod client;
pub mod config;
pub mod error;
pub mod error_body;
pub mod http;
pub mod service;
pub mod session;
pub mod stats;
pub mod transport;
pub mod types;

pub use client::TicketClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use error_body::{ErrorBody, FieldError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use service::TicketDesk;
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, TOKEN_KEY};
pub use stats::{Dashboard, EquipmentCount, Statistics};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    AuthTokens, Completion, Credentials, NewTicket, StatusFilter, Ticket, TicketDto, TicketId,
    TicketPdf, TicketReceipt, TicketStatus,
};
