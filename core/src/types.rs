//! Wire DTOs and view models for the ticketing API.
//!
//! # Design
//! The backend speaks Spanish field names and nests the requester and the
//! equipment under `usuario` / `equipo`. Consumers work with the flat,
//! English `Ticket` view model instead; `From<TicketDto> for Ticket` is the
//! only place the two shapes meet. Every DTO field is optional so the mapping
//! can never fail on a sparse payload.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server-assigned ticket identifier.
pub type TicketId = i64;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Technician credentials. `identifier` is either an email or a username.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

/// Login body. The backend accepts either key, so the identifier is sent
/// under both.
#[derive(Debug, Serialize)]
pub(crate) struct LoginPayload<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a Credentials> for LoginPayload<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        Self {
            email: &credentials.identifier,
            username: &credentials.identifier,
            password: &credentials.password,
        }
    }
}

/// Tokens returned by a successful login. Only `access` is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Public repair request submitted by an end user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub person_name: String,
    pub person_id: String,
    pub equipment_type: String,
    pub damage_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReceipt {
    pub ticket_id: TicketId,
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// Lifecycle state owned by the backend.
///
/// Unrecognised strings are kept in `Other` so a new backend state never
/// breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    Open,
    InProcess,
    Closed,
    Other(String),
}

impl TicketStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TicketStatus::Open => "ABIERTO",
            TicketStatus::InProcess => "EN_PROCESO",
            TicketStatus::Closed => "CERRADO",
            TicketStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for TicketStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ABIERTO" => TicketStatus::Open,
            "EN_PROCESO" => TicketStatus::InProcess,
            "CERRADO" => TicketStatus::Closed,
            _ => TicketStatus::Other(raw),
        }
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Server-side filter for the ticket list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn as_query(self) -> &'static str {
        match self {
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonDto {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub identificacion: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquipmentDto {
    #[serde(default)]
    pub tipo: Option<String>,
}

/// A ticket exactly as the backend serializes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketDto {
    pub id: TicketId,
    #[serde(default)]
    pub usuario: Option<PersonDto>,
    #[serde(default)]
    pub equipo: Option<EquipmentDto>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub tipo_dano: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub atendido_por: Option<String>,
    #[serde(default)]
    pub procedimiento: Option<String>,
}

/// Flattened view model consumed by the technician views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub person_name: String,
    pub person_id: String,
    pub equipment_type: String,
    pub damage_type: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: String,
    #[serde(rename = "atendido_por", default)]
    pub attended_by: Option<String>,
    #[serde(rename = "procedimiento", default)]
    pub procedure: Option<String>,
}

impl From<TicketDto> for Ticket {
    fn from(dto: TicketDto) -> Self {
        let person = dto.usuario.unwrap_or_default();
        let equipment = dto.equipo.unwrap_or_default();
        Self {
            id: dto.id,
            person_name: person.nombre.unwrap_or_default(),
            person_id: person.identificacion.unwrap_or_default(),
            equipment_type: equipment.tipo.unwrap_or_default(),
            damage_type: dto.tipo_dano.unwrap_or_default(),
            description: dto.descripcion.unwrap_or_default(),
            status: TicketStatus::from(dto.estado.unwrap_or_default()),
            created_at: dto.fecha.unwrap_or_default(),
            attended_by: dto.atendido_por,
            procedure: dto.procedimiento,
        }
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// What the technician reports when closing a ticket.
#[derive(Debug, Clone)]
pub struct Completion {
    pub technician_name: String,
    pub procedure_description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionPayload<'a> {
    pub estado: &'static str,
    pub atendido_por: &'a str,
    pub procedimiento: &'a str,
}

impl<'a> From<&'a Completion> for CompletionPayload<'a> {
    fn from(completion: &'a Completion) -> Self {
        Self {
            estado: "CERRADO",
            atendido_por: &completion.technician_name,
            procedimiento: &completion.procedure_description,
        }
    }
}

// ---------------------------------------------------------------------------
// PDF export
// ---------------------------------------------------------------------------

/// A downloaded ticket report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPdf {
    pub ticket_id: TicketId,
    pub bytes: Vec<u8>,
}

impl TicketPdf {
    pub fn file_name(&self) -> String {
        format!("ticket_{}.pdf", self.ticket_id)
    }

    /// Writes the report as `ticket_<id>.pdf` inside `dir`.
    pub fn save_in(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}
