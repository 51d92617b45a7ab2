//! `TicketDesk` behaviour: token lifecycle, session expiry and the
//! no-request precondition, checked against a scripted transport, plus one
//! end-to-end run over reqwest against the mock server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ticketdesk_core::{
    ApiError, Completion, HttpRequest, HttpResponse, MemorySessionStore, NewTicket, ReqwestTransport,
    SessionStore, StatusFilter, TicketClient, TicketDesk, TicketStatus, Transport,
};

/// Replays canned responses in order and records every request it sees.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn with(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Transport("no scripted response left".to_string()))
    }
}

fn desk(transport: ScriptedTransport, session: MemorySessionStore) -> TicketDesk<ScriptedTransport, MemorySessionStore> {
    TicketDesk::new(TicketClient::new("http://api.test/api"), transport, session)
}

fn completion() -> Completion {
    Completion {
        technician_name: "Laura".to_string(),
        procedure_description: "Limpieza interna".to_string(),
    }
}

#[tokio::test]
async fn login_stores_token_and_authenticated_calls_send_it() {
    let transport = ScriptedTransport::with(vec![
        HttpResponse::new(200, r#"{"access":"abc123"}"#),
        HttpResponse::new(200, "[]"),
    ]);
    let desk = desk(transport.clone(), MemorySessionStore::new());
    assert!(!desk.is_authenticated());

    desk.login("tech@example.com", "secret").await.unwrap();
    assert!(desk.is_authenticated());

    desk.list_tickets(None).await.unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].header("authorization").is_none());
    assert_eq!(requests[1].header("Authorization"), Some("Bearer abc123"));
}

#[tokio::test]
async fn clear_auth_logs_out() {
    let desk = desk(ScriptedTransport::default(), MemorySessionStore::with_token("abc123"));
    assert!(desk.is_authenticated());
    desk.clear_auth();
    assert!(!desk.is_authenticated());
}

#[tokio::test]
async fn empty_stored_token_is_not_a_session() {
    let desk = desk(ScriptedTransport::default(), MemorySessionStore::with_token(""));
    assert!(!desk.is_authenticated());
}

#[tokio::test]
async fn failed_login_keeps_previous_state() {
    let transport = ScriptedTransport::with(vec![HttpResponse::new(401, r#"{"error":"Credenciales inválidas"}"#)]);
    let desk = desk(transport, MemorySessionStore::new());
    let err = desk.login("tech", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Credenciales inválidas");
    assert!(!desk.is_authenticated());
}

#[tokio::test]
async fn unauthorized_response_clears_the_token() {
    let unauthorized = || HttpResponse::new(401, r#"{"detail":"expired"}"#);
    let transport = ScriptedTransport::with(vec![unauthorized(), unauthorized(), unauthorized(), unauthorized()]);
    let desk = desk(transport, MemorySessionStore::new());

    desk.session().set("stale").unwrap();
    assert!(matches!(desk.list_tickets(Some(StatusFilter::Pending)).await, Err(ApiError::SessionExpired)));
    assert!(!desk.is_authenticated());

    desk.session().set("stale").unwrap();
    assert!(matches!(desk.get_statistics().await, Err(ApiError::SessionExpired)));
    assert!(!desk.is_authenticated());

    desk.session().set("stale").unwrap();
    let err = desk.complete_ticket(1, &completion()).await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(err.to_string(), "Sesión expirada");
    assert!(!desk.is_authenticated());

    desk.session().set("stale").unwrap();
    assert!(matches!(desk.fetch_ticket_pdf(1).await, Err(ApiError::SessionExpired)));
    assert!(!desk.is_authenticated());
}

#[tokio::test]
async fn complete_without_token_sends_nothing() {
    let transport = ScriptedTransport::default();
    let desk = desk(transport.clone(), MemorySessionStore::new());

    let err = desk.complete_ticket(3, &completion()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotAuthenticated));
    assert!(err.requires_login());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn create_ticket_reports_the_first_field_error() {
    let transport = ScriptedTransport::with(vec![HttpResponse::new(
        400,
        r#"{"personName":["This field is required."],"description":["This field is required."]}"#,
    )]);
    let desk = desk(transport.clone(), MemorySessionStore::with_token("abc123"));

    let err = desk.create_ticket(&NewTicket::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "This field is required.");
    // intake is public: no credential even when logged in
    assert!(transport.requests()[0].header("authorization").is_none());
    assert!(desk.is_authenticated());
}

#[tokio::test]
async fn other_failures_leave_the_token_alone() {
    let transport = ScriptedTransport::with(vec![HttpResponse::new(500, "")]);
    let desk = desk(transport, MemorySessionStore::with_token("abc123"));
    let err = desk.get_statistics().await.unwrap_err();
    assert_eq!(err.to_string(), "Error al cargar estadísticas");
    assert!(desk.is_authenticated());
}

#[tokio::test]
async fn end_to_end_over_reqwest() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));

    let desk = TicketDesk::new(
        TicketClient::new(&format!("http://{addr}/api")),
        ReqwestTransport::new(),
        MemorySessionStore::new(),
    );

    let receipt = desk
        .create_ticket(&NewTicket {
            person_name: "Ana Ruiz".to_string(),
            person_id: "CC-1020".to_string(),
            equipment_type: "Impresora".to_string(),
            damage_type: "Atasco".to_string(),
            description: "Atasco de papel".to_string(),
            email: Some("ana@example.com".to_string()),
            phone: None,
        })
        .await
        .unwrap();

    desk.login(mock_server::TECH_USERNAME, mock_server::TECH_PASSWORD).await.unwrap();

    let dashboard = desk.load_dashboard().await.unwrap();
    assert_eq!(dashboard.pending.len(), 1);
    assert!(dashboard.completed.is_empty());
    assert_eq!(dashboard.statistics.pending, 1);

    desk.complete_ticket(receipt.ticket_id, &completion()).await.unwrap();
    let ticket = desk.get_ticket(receipt.ticket_id).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert_eq!(ticket.attended_by.as_deref(), Some("Laura"));

    let dir = std::env::temp_dir().join(format!("ticketdesk-e2e-{}", std::process::id()));
    let path = desk.download_ticket_pdf(receipt.ticket_id, &dir).await.unwrap();
    assert_eq!(path.file_name().unwrap(), format!("ticket_{}.pdf", receipt.ticket_id).as_str());
    assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF-"));
    let _ = std::fs::remove_dir_all(&dir);

    // a forged token is rejected and cleared
    desk.session().set("forged").unwrap();
    assert!(matches!(desk.get_statistics().await, Err(ApiError::SessionExpired)));
    assert!(!desk.is_authenticated());
}
