//! Stateless HTTP request builder and response parser for the ticketing API.
//!
//! # Design
//! `TicketClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Authenticated builders take the bearer token as an argument; the token
//! lifecycle lives in `TicketDesk`, not here.
//!
//! Status handling follows two policies. Public endpoints and the completion
//! call surface the message found in the error body; the read endpoints report
//! a fixed message per operation, except that a 404 on a single-ticket read is
//! `ApiError::NotFound`. Every authenticated parser maps 401 to
//! `ApiError::SessionExpired` before anything else.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::error_body::ErrorBody;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::stats::Statistics;
use crate::types::{
    AuthTokens, Completion, CompletionPayload, Credentials, LoginPayload, NewTicket, StatusFilter,
    Ticket, TicketDto, TicketId, TicketPdf, TicketReceipt,
};

const LOGIN_FAILED: &str = "Error al iniciar sesión";
const CREATE_FAILED: &str = "Error al crear el ticket";
const LIST_FAILED: &str = "Error al cargar tickets";
const GET_FAILED: &str = "Error al cargar ticket";
const COMPLETE_FAILED: &str = "Error al completar el ticket";
const PDF_FAILED: &str = "Error al descargar PDF";
const STATS_FAILED: &str = "Error al cargar estadísticas";

/// Synchronous, stateless client for the ticketing API.
#[derive(Debug, Clone)]
pub struct TicketClient {
    base_url: String,
}

impl TicketClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/auth/login/", None, &LoginPayload::from(credentials))
    }

    pub fn build_create_ticket(&self, input: &NewTicket) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/solicitar-ticket/", None, input)
    }

    pub fn build_list_tickets(&self, token: Option<&str>, filter: Option<StatusFilter>) -> HttpRequest {
        let path = match filter {
            Some(filter) => format!("/tickets/?status={}", filter.as_query()),
            None => "/tickets/".to_string(),
        };
        self.get_request(&path, token)
    }

    pub fn build_get_ticket(&self, token: Option<&str>, id: TicketId) -> HttpRequest {
        self.get_request(&format!("/tickets/{id}/"), token)
    }

    pub fn build_complete_ticket(
        &self,
        token: &str,
        id: TicketId,
        completion: &Completion,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            &format!("/tickets/{id}/"),
            Some(token),
            &CompletionPayload::from(completion),
        )
    }

    pub fn build_ticket_pdf(&self, token: Option<&str>, id: TicketId) -> HttpRequest {
        self.get_request(&format!("/tickets/{id}/pdf/"), token)
    }

    pub fn build_statistics(&self, token: Option<&str>) -> HttpRequest {
        self.get_request("/stats/", token)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<AuthTokens, ApiError> {
        if !response.is_success() {
            return Err(ApiError::Rejected {
                status: response.status,
                message: ErrorBody::parse(&response.body).login_message_or(LOGIN_FAILED),
            });
        }
        decode(&response)
    }

    pub fn parse_create_ticket(&self, response: HttpResponse) -> Result<TicketReceipt, ApiError> {
        check_status_with_body(&response, CREATE_FAILED)?;
        decode(&response)
    }

    pub fn parse_list_tickets(&self, response: HttpResponse) -> Result<Vec<Ticket>, ApiError> {
        check_session(&response)?;
        check_status(&response, LIST_FAILED)?;
        let list: Vec<TicketDto> = decode(&response)?;
        Ok(list.into_iter().map(Ticket::from).collect())
    }

    pub fn parse_get_ticket(&self, response: HttpResponse) -> Result<Ticket, ApiError> {
        check_session(&response)?;
        if response.status == 404 {
            return Err(ApiError::NotFound);
        }
        check_status(&response, GET_FAILED)?;
        let dto: TicketDto = decode(&response)?;
        Ok(Ticket::from(dto))
    }

    pub fn parse_complete_ticket(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_session(&response)?;
        check_status_with_body(&response, COMPLETE_FAILED)
    }

    pub fn parse_ticket_pdf(&self, id: TicketId, response: HttpResponse) -> Result<TicketPdf, ApiError> {
        check_session(&response)?;
        check_status(&response, PDF_FAILED)?;
        Ok(TicketPdf {
            ticket_id: id,
            bytes: response.body,
        })
    }

    pub fn parse_statistics(&self, response: HttpResponse) -> Result<Statistics, ApiError> {
        check_session(&response)?;
        check_status(&response, STATS_FAILED)?;
        decode(&response)
    }

    fn get_request(&self, path: &str, token: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{path}", self.base_url),
            headers: bearer(token).into_iter().collect(),
            body: None,
        }
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        token: Option<&str>,
        payload: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(bearer(token));
        Ok(HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers,
            body: Some(body),
        })
    }
}

fn bearer(token: Option<&str>) -> Option<(String, String)> {
    token.map(|t| ("authorization".to_string(), format!("Bearer {t}")))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// 401 on an authenticated endpoint means the token is no longer valid.
fn check_session(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 401 {
        return Err(ApiError::SessionExpired);
    }
    Ok(())
}

/// Non-2xx responses get a fixed per-operation message.
fn check_status(response: &HttpResponse, fallback: &str) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Rejected {
        status: response.status,
        message: fallback.to_string(),
    })
}

/// Non-2xx responses carry the message extracted from the error body.
fn check_status_with_body(response: &HttpResponse, fallback: &str) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Rejected {
        status: response.status,
        message: ErrorBody::parse(&response.body).message_or(fallback),
    })
}
