//! In-memory implementation of the ticketing REST API.
//!
//! Mirrors the production backend closely enough for the client's integration
//! tests: DRF-style validation errors on intake, bearer-token checks on every
//! technician route, server-side status filters and the statistics
//! aggregation. All routes live under `/api`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const TECH_USERNAME: &str = "tech";
pub const TECH_EMAIL: &str = "tech@example.com";
pub const TECH_PASSWORD: &str = "secret";
pub const TECH_NAME: &str = "Laura Gómez";
pub const INACTIVE_USERNAME: &str = "former";

const OPEN: &str = "ABIERTO";
const IN_PROCESS: &str = "EN_PROCESO";
const CLOSED: &str = "CERRADO";

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Technician {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub active: bool,
}

impl Technician {
    fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Usuario {
    pub nombre: String,
    pub identificacion: String,
    pub correo: String,
    pub telefono: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Equipo {
    pub tipo: String,
    pub serie: String,
}

/// Ticket in the backend's wire shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub usuario: Usuario,
    pub equipo: Equipo,
    pub descripcion: String,
    pub tipo_dano: String,
    pub estado: String,
    pub fecha: String,
    pub atendido_por: Option<String>,
    pub procedimiento: Option<String>,
}

pub struct Backend {
    technicians: Vec<Technician>,
    /// access token -> index into `technicians`
    sessions: HashMap<String, usize>,
    tickets: BTreeMap<i64, Ticket>,
    next_id: i64,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(vec![
            Technician {
                username: TECH_USERNAME.to_string(),
                email: TECH_EMAIL.to_string(),
                password: TECH_PASSWORD.to_string(),
                full_name: TECH_NAME.to_string(),
                active: true,
            },
            Technician {
                username: INACTIVE_USERNAME.to_string(),
                email: "former@example.com".to_string(),
                password: TECH_PASSWORD.to_string(),
                full_name: String::new(),
                active: false,
            },
        ])
    }
}

impl Backend {
    pub fn new(technicians: Vec<Technician>) -> Self {
        Self {
            technicians,
            sessions: HashMap::new(),
            tickets: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn insert_ticket(&mut self, mut ticket: Ticket) -> i64 {
        ticket.id = self.next_id;
        self.next_id += 1;
        self.tickets.insert(ticket.id, ticket.clone());
        ticket.id
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<&Technician, Failure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                Failure::detail(
                    StatusCode::UNAUTHORIZED,
                    "Authentication credentials were not provided.",
                )
            })?;
        self.sessions
            .get(token)
            .and_then(|&idx| self.technicians.get(idx))
            .ok_or_else(|| Failure::detail(StatusCode::UNAUTHORIZED, "Given token not valid for any token type"))
    }
}

pub type Db = Arc<RwLock<Backend>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error response with a JSON body.
pub struct Failure(StatusCode, Value);

impl Failure {
    fn error(status: StatusCode, message: &str) -> Self {
        Self(status, json!({ "error": message }))
    }

    fn detail(status: StatusCode, message: &str) -> Self {
        Self(status, json!({ "detail": message }))
    }

    fn not_found() -> Self {
        Self::detail(StatusCode::NOT_FOUND, "No Ticket matches the given query.")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    app_with(Backend::default())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    let api = Router::new()
        .route("/auth/login/", post(login))
        .route("/solicitar-ticket/", post(submit_ticket))
        .route("/tickets/", get(list_tickets))
        .route("/tickets/{id}/", get(get_ticket).patch(update_ticket))
        .route("/tickets/{id}/pdf/", get(ticket_pdf))
        .route("/stats/", get(stats))
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

async fn login(State(db): State<Db>, Json(body): Json<LoginBody>) -> Result<Json<Value>, Failure> {
    let identifier = [body.email, body.username]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    let password = body.password.unwrap_or_default();
    if identifier.is_empty() || password.is_empty() {
        return Err(Failure::error(
            StatusCode::BAD_REQUEST,
            "email (o usuario) y contraseña son obligatorios",
        ));
    }

    let mut backend = db.write().await;
    let found = backend.technicians.iter().position(|t| {
        if identifier.contains('@') {
            t.email.eq_ignore_ascii_case(&identifier)
        } else {
            t.username.eq_ignore_ascii_case(&identifier)
        }
    });
    let idx = match found {
        Some(idx) if backend.technicians[idx].password == password => idx,
        _ => {
            warn!(%identifier, "rejected login");
            return Err(Failure::error(StatusCode::UNAUTHORIZED, "Credenciales inválidas"));
        }
    };
    if !backend.technicians[idx].active {
        return Err(Failure::error(StatusCode::FORBIDDEN, "Usuario inactivo"));
    }

    let access = Uuid::new_v4().simple().to_string();
    let refresh = Uuid::new_v4().simple().to_string();
    backend.sessions.insert(access.clone(), idx);
    info!(%identifier, "login");
    Ok(Json(json!({ "access": access, "refresh": refresh })))
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// (field, max length, required)
const INTAKE_FIELDS: [(&str, Option<usize>, bool); 7] = [
    ("personName", Some(100), true),
    ("personId", Some(50), true),
    ("equipmentType", Some(50), true),
    ("damageType", Some(50), true),
    ("description", None, true),
    ("email", None, false),
    ("phone", Some(20), false),
];

/// Validates the intake body the way the backend serializer does. Errors are
/// keyed by field in declaration order.
pub fn validate_intake(body: &Value) -> Result<BTreeMap<&'static str, String>, Map<String, Value>> {
    let mut errors = Map::new();
    let mut clean = BTreeMap::new();

    for (field, max_len, required) in INTAKE_FIELDS {
        let message = match body.get(field) {
            None | Some(Value::Null) if required => Some("This field is required.".to_string()),
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() && required => {
                Some("This field may not be blank.".to_string())
            }
            Some(Value::String(s)) => match max_len {
                Some(max) if s.chars().count() > max => {
                    Some(format!("Ensure this field has no more than {max} characters."))
                }
                _ if field == "email" && !s.is_empty() && !s.contains('@') => {
                    Some("Enter a valid email address.".to_string())
                }
                _ => {
                    clean.insert(field, s.trim().to_string());
                    None
                }
            },
            Some(_) => Some("Not a valid string.".to_string()),
        };
        if let Some(message) = message {
            errors.insert(field.to_string(), json!([message]));
        }
    }

    if errors.is_empty() {
        Ok(clean)
    } else {
        Err(errors)
    }
}

async fn submit_ticket(State(db): State<Db>, Json(body): Json<Value>) -> Result<Response, Failure> {
    let mut fields = validate_intake(&body).map_err(|errors| Failure(StatusCode::BAD_REQUEST, Value::Object(errors)))?;
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();

    let correo = Some(take("email")).filter(|s| !s.is_empty()).unwrap_or_else(|| "noreply@local".to_string());
    let serial: String = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    let ticket = Ticket {
        id: 0,
        usuario: Usuario {
            nombre: take("personName"),
            identificacion: take("personId"),
            correo,
            telefono: take("phone"),
        },
        equipo: Equipo {
            tipo: take("equipmentType"),
            serie: format!("SOL-{serial}"),
        },
        descripcion: take("description"),
        tipo_dano: take("damageType"),
        estado: OPEN.to_string(),
        fecha: now(),
        atendido_por: None,
        procedimiento: None,
    };

    let id = db.write().await.insert_ticket(ticket);
    info!(ticket_id = id, "ticket submitted");
    Ok((StatusCode::CREATED, Json(json!({ "ticketId": id }))).into_response())
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

async fn list_tickets(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, Failure> {
    let backend = db.read().await;
    backend.authenticate(&headers)?;
    let wanted: &[&str] = match query.status.as_deref() {
        Some("pending") => &[OPEN, IN_PROCESS],
        Some("completed") => &[CLOSED],
        _ => &[OPEN, IN_PROCESS, CLOSED],
    };
    // newest first; ids grow with creation time
    let tickets = backend
        .tickets
        .values()
        .rev()
        .filter(|t| query.status.is_none() || wanted.contains(&t.estado.as_str()))
        .cloned()
        .collect();
    Ok(Json(tickets))
}

async fn get_ticket(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, Failure> {
    let backend = db.read().await;
    backend.authenticate(&headers)?;
    backend.tickets.get(&id).cloned().map(Json).ok_or_else(Failure::not_found)
}

#[derive(Deserialize)]
pub struct TicketPatch {
    pub estado: Option<String>,
    pub descripcion: Option<String>,
    pub tipo_dano: Option<String>,
    pub atendido_por: Option<String>,
    pub procedimiento: Option<String>,
}

async fn update_ticket(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<TicketPatch>,
) -> Result<Json<Ticket>, Failure> {
    let mut backend = db.write().await;
    let technician = backend.authenticate(&headers)?.display_name().to_string();
    if let Some(estado) = &patch.estado {
        if ![OPEN, IN_PROCESS, CLOSED].contains(&estado.as_str()) {
            return Err(Failure(
                StatusCode::BAD_REQUEST,
                json!({ "estado": [format!("\"{estado}\" is not a valid choice.")] }),
            ));
        }
    }

    let ticket = backend.tickets.get_mut(&id).ok_or_else(Failure::not_found)?;
    if let Some(estado) = patch.estado {
        ticket.estado = estado;
    }
    if let Some(descripcion) = patch.descripcion {
        ticket.descripcion = descripcion;
    }
    if let Some(tipo_dano) = patch.tipo_dano {
        ticket.tipo_dano = tipo_dano;
    }
    if let Some(procedimiento) = patch.procedimiento {
        ticket.procedimiento = Some(procedimiento);
    }
    // body value wins, otherwise the authenticated technician
    let attended_by = patch
        .atendido_por
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(technician);
    ticket.atendido_por = Some(attended_by);

    if ticket.estado == CLOSED {
        info!(ticket_id = id, "ticket closed");
    }
    Ok(Json(ticket.clone()))
}

async fn ticket_pdf(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, Failure> {
    let backend = db.read().await;
    backend.authenticate(&headers)?;
    let ticket = backend.tickets.get(&id).ok_or_else(Failure::not_found)?;
    let bytes = render_pdf(&ticket_report(ticket));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"ticket_{id}.pdf\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentCount {
    pub equipment_type: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub pending: u64,
    pub in_process: u64,
    pub closed: u64,
    pub total: u64,
    pub technicians: Vec<String>,
    #[serde(rename = "technicianPerformance")]
    pub technician_performance: BTreeMap<String, u64>,
    #[serde(rename = "failureTypes")]
    pub failure_types: BTreeMap<String, u64>,
    #[serde(rename = "equipmentFrequency")]
    pub equipment_frequency: Vec<EquipmentCount>,
    #[serde(rename = "totalTickets")]
    pub total_tickets: u64,
    #[serde(rename = "completedTickets")]
    pub completed_tickets: u64,
}

impl Stats {
    pub fn compute(backend: &Backend) -> Self {
        let count = |estado: &str| backend.tickets.values().filter(|t| t.estado == estado).count() as u64;
        let closed = count(CLOSED);
        let total = backend.tickets.len() as u64;

        let mut technician_performance = BTreeMap::new();
        let mut failure_types = BTreeMap::new();
        let mut per_equipment: BTreeMap<String, u64> = BTreeMap::new();
        for ticket in backend.tickets.values() {
            if ticket.estado == CLOSED {
                if let Some(name) = ticket.atendido_por.as_deref().filter(|n| !n.is_empty()) {
                    *technician_performance.entry(name.to_string()).or_insert(0) += 1;
                }
            }
            if !ticket.tipo_dano.is_empty() {
                *failure_types.entry(ticket.tipo_dano.clone()).or_insert(0) += 1;
            }
            let tipo = if ticket.equipo.tipo.is_empty() { "N/A" } else { ticket.equipo.tipo.as_str() };
            *per_equipment.entry(tipo.to_string()).or_insert(0) += 1;
        }
        let mut equipment_frequency: Vec<EquipmentCount> = per_equipment
            .into_iter()
            .map(|(equipment_type, count)| EquipmentCount { equipment_type, count })
            .collect();
        equipment_frequency.sort_by(|a, b| b.count.cmp(&a.count));
        equipment_frequency.truncate(10);

        Self {
            pending: count(OPEN),
            in_process: count(IN_PROCESS),
            closed,
            total,
            technicians: backend
                .technicians
                .iter()
                .filter(|t| t.active)
                .map(|t| t.display_name().to_string())
                .collect(),
            technician_performance,
            failure_types,
            equipment_frequency,
            total_tickets: total,
            completed_tickets: closed,
        }
    }
}

async fn stats(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Stats>, Failure> {
    let backend = db.read().await;
    backend.authenticate(&headers)?;
    Ok(Json(Stats::compute(&backend)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

fn ticket_report(ticket: &Ticket) -> Vec<String> {
    vec![
        format!("Ticket #{}", ticket.id),
        format!("Usuario: {} ({})", ticket.usuario.nombre, ticket.usuario.identificacion),
        format!("Equipo: {} - {}", ticket.equipo.tipo, ticket.equipo.serie),
        format!("Tipo de dano: {}", ticket.tipo_dano),
        format!("Estado: {}", ticket.estado),
        format!("Fecha: {}", ticket.fecha),
        format!("Descripcion: {}", ticket.descripcion),
        format!("Atendido por: {}", ticket.atendido_por.as_deref().unwrap_or("-")),
        format!("Procedimiento: {}", ticket.procedimiento.as_deref().unwrap_or("-")),
    ]
}

/// Single-page PDF with one Helvetica text line per entry. Non-ASCII
/// characters are replaced with `?`.
pub fn render_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT /F1 11 Tf 50 780 Td 14 TL\n");
    for line in lines {
        let escaped: String = line
            .chars()
            .map(|c| if c.is_ascii() { c } else { '?' })
            .collect::<String>()
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({escaped}) Tj T*\n"));
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{object}\nendobj\n", i + 1));
    }
    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(estado: &str, tipo: &str, dano: &str, atendido_por: Option<&str>) -> Ticket {
        Ticket {
            id: 0,
            usuario: Usuario {
                nombre: "Ana".to_string(),
                identificacion: "1".to_string(),
                correo: "noreply@local".to_string(),
                telefono: String::new(),
            },
            equipo: Equipo {
                tipo: tipo.to_string(),
                serie: "SOL-1".to_string(),
            },
            descripcion: "x".to_string(),
            tipo_dano: dano.to_string(),
            estado: estado.to_string(),
            fecha: String::new(),
            atendido_por: atendido_por.map(str::to_string),
            procedimiento: None,
        }
    }

    #[test]
    fn validation_reports_missing_fields_in_declaration_order() {
        let errors = validate_intake(&json!({ "description": "broken" })).unwrap_err();
        let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["personName", "personId", "equipmentType", "damageType"]);
        assert_eq!(errors["personName"], json!(["This field is required."]));
    }

    #[test]
    fn validation_checks_length_blank_and_email() {
        let errors = validate_intake(&json!({
            "personName": "a".repeat(101),
            "personId": " ",
            "equipmentType": "PC",
            "damageType": "Pantalla",
            "description": "x",
            "email": "not-an-email",
            "phone": "",
        }))
        .unwrap_err();
        assert_eq!(errors["personName"], json!(["Ensure this field has no more than 100 characters."]));
        assert_eq!(errors["personId"], json!(["This field may not be blank."]));
        assert_eq!(errors["email"], json!(["Enter a valid email address."]));
        assert!(errors.get("phone").is_none());
    }

    #[test]
    fn validation_accepts_a_complete_body() {
        let clean = validate_intake(&json!({
            "personName": "Ana",
            "personId": "CC-1",
            "equipmentType": "Laptop",
            "damageType": "Pantalla",
            "description": "No enciende",
        }))
        .unwrap();
        assert_eq!(clean["personName"], "Ana");
        assert!(!clean.contains_key("email"));
    }

    #[test]
    fn stats_aggregate_like_the_backend() {
        let mut backend = Backend::default();
        backend.insert_ticket(sample(OPEN, "Laptop", "Pantalla", None));
        backend.insert_ticket(sample(IN_PROCESS, "Laptop", "", None));
        backend.insert_ticket(sample(CLOSED, "", "Pantalla", Some("Luis")));
        backend.insert_ticket(sample(CLOSED, "Impresora", "Atasco", Some("")));

        let stats = Stats::compute(&backend);
        assert_eq!((stats.pending, stats.in_process, stats.closed, stats.total), (1, 1, 2, 4));
        assert_eq!(stats.total_tickets, 4);
        assert_eq!(stats.completed_tickets, 2);
        assert_eq!(stats.technicians, vec![TECH_NAME.to_string()]);
        assert_eq!(stats.technician_performance.len(), 1);
        assert_eq!(stats.technician_performance["Luis"], 1);
        assert_eq!(stats.failure_types["Pantalla"], 2);
        assert!(!stats.failure_types.contains_key(""));
        assert_eq!(stats.equipment_frequency[0].equipment_type, "Laptop");
        assert_eq!(stats.equipment_frequency[0].count, 2);
        assert!(stats.equipment_frequency.iter().any(|e| e.equipment_type == "N/A"));
    }

    #[test]
    fn pdf_has_header_trailer_and_escaped_text() {
        let bytes = render_pdf(&["Equipo (PC)".to_string(), "Dañado".to_string()]);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Equipo \\(PC\\)) Tj"));
        assert!(text.contains("(Da?ado) Tj"));
    }
}
