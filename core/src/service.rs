//! Async façade that owns the token lifecycle.
//!
//! # Design
//! `TicketDesk` drives the stateless `TicketClient` through a `Transport` and
//! keeps the bearer token in a `SessionStore`:
//! - `login` stores the access token, `clear_auth` deletes it.
//! - Authenticated calls attach the stored token when there is one.
//! - Any `ApiError::SessionExpired` coming back from the parser clears the
//!   store before the error is returned.
//! - `complete_ticket` refuses to run without a token and sends nothing.
//!
//! No operation retries or recovers; every error reaches the caller.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::client::TicketClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::SessionStore;
use crate::stats::{Dashboard, Statistics};
use crate::transport::Transport;
use crate::types::{
    AuthTokens, Completion, Credentials, NewTicket, StatusFilter, Ticket, TicketId, TicketPdf,
    TicketReceipt,
};

pub struct TicketDesk<T, S> {
    client: TicketClient,
    transport: T,
    session: S,
}

impl<T: Transport, S: SessionStore> TicketDesk<T, S> {
    pub fn new(client: TicketClient, transport: T, session: S) -> Self {
        Self {
            client,
            transport,
            session,
        }
    }

    pub fn client(&self) -> &TicketClient {
        &self.client
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// An empty stored token counts as logged out.
    pub fn is_authenticated(&self) -> bool {
        self.session.get().is_some_and(|token| !token.is_empty())
    }

    pub fn clear_auth(&self) {
        self.session.clear();
        debug!("session cleared");
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let credentials = Credentials {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let request = self.client.build_login(&credentials)?;
        let tokens = self.client.parse_login(self.send(request).await?)?;
        self.session.set(&tokens.access)?;
        info!(identifier, "technician logged in");
        Ok(tokens)
    }

    pub async fn create_ticket(&self, input: &NewTicket) -> Result<TicketReceipt, ApiError> {
        let request = self.client.build_create_ticket(input)?;
        let receipt = self.client.parse_create_ticket(self.send(request).await?)?;
        info!(ticket_id = receipt.ticket_id, "ticket submitted");
        Ok(receipt)
    }

    pub async fn list_tickets(&self, filter: Option<StatusFilter>) -> Result<Vec<Ticket>, ApiError> {
        let token = self.session.get();
        let request = self.client.build_list_tickets(token.as_deref(), filter);
        let response = self.send(request).await?;
        self.expire_on_unauthorized(self.client.parse_list_tickets(response))
    }

    pub async fn get_ticket(&self, id: TicketId) -> Result<Ticket, ApiError> {
        let token = self.session.get();
        let request = self.client.build_get_ticket(token.as_deref(), id);
        let response = self.send(request).await?;
        self.expire_on_unauthorized(self.client.parse_get_ticket(response))
    }

    pub async fn complete_ticket(&self, id: TicketId, completion: &Completion) -> Result<(), ApiError> {
        let token = self.session.get().ok_or(ApiError::NotAuthenticated)?;
        let request = self.client.build_complete_ticket(&token, id, completion)?;
        let response = self.send(request).await?;
        self.expire_on_unauthorized(self.client.parse_complete_ticket(response))?;
        info!(ticket_id = id, technician = %completion.technician_name, "ticket closed");
        Ok(())
    }

    pub async fn fetch_ticket_pdf(&self, id: TicketId) -> Result<TicketPdf, ApiError> {
        let token = self.session.get();
        let request = self.client.build_ticket_pdf(token.as_deref(), id);
        let response = self.send(request).await?;
        self.expire_on_unauthorized(self.client.parse_ticket_pdf(id, response))
    }

    /// Saves the ticket report as `ticket_<id>.pdf` in `dir` and returns the path.
    pub async fn download_ticket_pdf(&self, id: TicketId, dir: &Path) -> Result<PathBuf, ApiError> {
        let pdf = self.fetch_ticket_pdf(id).await?;
        let path = pdf.save_in(dir).map_err(|e| ApiError::Storage(e.to_string()))?;
        info!(ticket_id = id, path = %path.display(), "ticket report saved");
        Ok(path)
    }

    pub async fn get_statistics(&self) -> Result<Statistics, ApiError> {
        let token = self.session.get();
        let request = self.client.build_statistics(token.as_deref());
        let response = self.send(request).await?;
        self.expire_on_unauthorized(self.client.parse_statistics(response))
    }

    /// Pending tickets, completed tickets and statistics, requested
    /// concurrently. The three reads are not a consistent snapshot.
    pub async fn load_dashboard(&self) -> Result<Dashboard, ApiError> {
        let (pending, completed, statistics) = futures::try_join!(
            self.list_tickets(Some(StatusFilter::Pending)),
            self.list_tickets(Some(StatusFilter::Completed)),
            self.get_statistics(),
        )?;
        Ok(Dashboard {
            pending,
            completed,
            statistics,
        })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "api call");
        self.transport.execute(request).await
    }

    fn expire_on_unauthorized<R>(&self, result: Result<R, ApiError>) -> Result<R, ApiError> {
        if let Err(ApiError::SessionExpired) = &result {
            warn!("server rejected the session token; clearing it");
            self.session.clear();
        }
        result
    }
}
