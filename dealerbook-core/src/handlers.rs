use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::approval::executor::{ApprovalReport, ApprovalWorkflow};
use crate::approval::state_machine::ApprovalState;
use crate::editing::{EditSession, SaveWorkflow};
use crate::error::{ApprovalError, SaveError, SessionError, StoreError};
use crate::lines::codec::decode;
use crate::lines::totals::{format_fixed, line_amount, total};
use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceOrder, InvoiceStatus};
use crate::models::line_item::{InvoiceHeader, LineItem};
use crate::stores::{InvoiceStore, LocalDocumentStore, PDF_CONTENT_TYPE};

/// Application state containing shared resources.
///
/// This struct holds the database pool used for health checks and the
/// collaborators every route handler works through.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,

    /// Invoice store backing all invoice routes
    pub invoices: Arc<dyn InvoiceStore>,

    pub saves: Arc<SaveWorkflow>,
    pub approvals: Arc<ApprovalWorkflow>,

    /// Local document directory, when documents are served by this process
    pub documents: Option<Arc<LocalDocumentStore>>,
}

/// Errors returned by the route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceKey),

    #[error("document {0} not found")]
    DocumentNotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("document could not be read: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            phase: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            state: Option<ApprovalState>,
        }

        let (status, phase, state) = match &self {
            ApiError::InvoiceNotFound(_) | ApiError::DocumentNotFound(_) => {
                (StatusCode::NOT_FOUND, None, None)
            }
            ApiError::Session(_) => (StatusCode::UNPROCESSABLE_ENTITY, None, None),
            ApiError::Save(_) => (StatusCode::BAD_GATEWAY, Some("save"), None),
            ApiError::Approval(e) => (StatusCode::BAD_GATEWAY, Some(e.phase()), Some(e.halted_at())),
            ApiError::Store(_) => (StatusCode::BAD_GATEWAY, None, None),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            phase,
            state,
        };
        (status, Json(body)).into_response()
    }
}

/// One materialized row with its computed amount.
#[derive(Debug, Serialize)]
pub struct RowView {
    #[serde(flatten)]
    pub item: LineItem,
    pub amount: String,
}

/// Invoice as shown to clients: display-normalized, with materialized rows
/// and a fixed-point total.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub row_id: Option<i64>,
    pub phone_number: String,
    pub invoice_number: String,
    pub dealer: String,
    pub invoice_date: String,
    pub status: InvoiceStatus,
    pub pdf_url: Option<String>,
    pub rows: Vec<RowView>,
    pub total: String,
}

impl From<&Invoice> for InvoiceView {
    fn from(invoice: &Invoice) -> Self {
        let shown = invoice.display_normalized();
        let rows = decode(&shown);
        let total = format_fixed(total(&rows));

        Self {
            row_id: shown.row_id,
            phone_number: shown.phone_number,
            invoice_number: shown.invoice_number,
            dealer: shown.dealer,
            invoice_date: shown.invoice_date,
            status: shown.status,
            pdf_url: shown.pdf_url,
            rows: rows
                .into_iter()
                .map(|item| RowView {
                    amount: format_fixed(line_amount(&item)),
                    item,
                })
                .collect(),
            total,
        }
    }
}

/// Body of a save request.
///
/// `header` and `rows` replace the stored values when given; `edits` are
/// then applied in order.
#[derive(Debug, Default, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub header: Option<InvoiceHeader>,
    #[serde(default)]
    pub rows: Option<Vec<LineItem>>,
    #[serde(default)]
    pub edits: Vec<EditOperation>,
}

/// Single field or row operation on an edit session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    SetHeaderField { field: String, value: String },
    SetRowField { index: usize, field: String, value: String },
    AddRow,
    RemoveRow { index: usize },
}

impl EditOperation {
    pub fn apply(self, session: &mut EditSession) -> Result<(), SessionError> {
        match self {
            EditOperation::SetHeaderField { field, value } => {
                session.set_header_field_named(&field, value)
            }
            EditOperation::SetRowField {
                index,
                field,
                value,
            } => session.set_row_field_named(index, &field, value),
            EditOperation::AddRow => {
                session.add_row();
                Ok(())
            }
            EditOperation::RemoveRow { index } => session.remove_row(index).map(|_| ()),
        }
    }
}

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "dealerbook",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
///
/// Verifies that the database connection is working by executing
/// a simple query.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Phone directory: every phone number owning at least one invoice.
async fn list_phones(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let phones = state.invoices.phone_numbers().await?;
    Ok(Json(phones))
}

/// Invoices of one phone number, newest first.
async fn list_invoices(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Vec<InvoiceView>>, ApiError> {
    let filter = InvoiceFilter {
        order: InvoiceOrder::RowIdDescending,
        ..InvoiceFilter::by_phone(phone)
    };
    let invoices = state.invoices.query(&filter).await?;
    Ok(Json(invoices.iter().map(InvoiceView::from).collect()))
}

async fn find_invoice(state: &AppState, key: InvoiceKey) -> Result<Invoice, ApiError> {
    state
        .invoices
        .query(&InvoiceFilter::by_key(&key))
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::InvoiceNotFound(key))
}

/// Saves an edit of one invoice as a draft.
async fn save_invoice(
    State(state): State<AppState>,
    Path((phone, number)): Path<(String, String)>,
    Json(request): Json<EditRequest>,
) -> Result<Json<InvoiceView>, ApiError> {
    let invoice = find_invoice(&state, InvoiceKey::new(phone, number)).await?;
    let mut session = EditSession::begin(&invoice);

    if request.header.is_some() || request.rows.is_some() {
        let header = request.header.unwrap_or_else(|| session.header().clone());
        let rows = request.rows.unwrap_or_else(|| session.rows().to_vec());
        session.replace(header, rows);
    }
    for edit in request.edits {
        edit.apply(&mut session)?;
    }

    if invoice.status == InvoiceStatus::Approved {
        warn!("Invoice {} is approved; saving reopens it as a draft", session.key());
    }
    let saved = state.saves.commit(&session).await?;
    Ok(Json(InvoiceView::from(&saved)))
}

/// Runs the approval workflow for one invoice.
async fn approve_invoice(
    State(state): State<AppState>,
    Path((phone, number)): Path<(String, String)>,
) -> Result<Json<ApprovalReport>, ApiError> {
    let invoice = find_invoice(&state, InvoiceKey::new(phone, number)).await?;
    let report = state.approvals.approve(&invoice).await?;
    Ok(Json(report))
}

async fn delete_invoice(
    State(state): State<AppState>,
    Path((phone, number)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = InvoiceKey::new(phone, number);
    state.invoices.delete(&key).await?;
    info!("Deleted invoice {}", key);
    Ok(StatusCode::NO_CONTENT)
}

/// Serves a stored document from the local document directory.
async fn get_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .documents
        .as_ref()
        .and_then(|documents| documents.path_for(&name))
        .ok_or_else(|| ApiError::DocumentNotFound(name.clone()))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::DocumentNotFound(name))
        }
        Err(e) => return Err(ApiError::Io(e)),
    };

    Ok(([(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], bytes).into_response())
}

/// Creates the main application router.
///
/// Sets up all routes and middleware for the DealerBook API.
///
/// # Arguments
///
/// * `state` - The application state containing the stores and workflows
///
/// # Returns
///
/// Returns a configured Axum Router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/phones", get(list_phones))
        .route("/phones/:phone/invoices", get(list_invoices))
        .route(
            "/phones/:phone/invoices/:number",
            put(save_invoice).delete(delete_invoice),
        )
        .route("/phones/:phone/invoices/:number/approve", post(approve_invoice))
        .route("/documents/:name", get(get_document))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
