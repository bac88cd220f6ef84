use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use ticketdesk_types::api::{
    CreateTicketRequest, DashboardResponse, MutationResponse, TicketQuery, UpdateTicketRequest,
};
use ticketdesk_types::error::DeskResult;
use ticketdesk_types::models::{NewTicket, Ticket, TicketPatch, User};

use crate::dashboard;
use crate::error::{ApiError, ApiJson, blocking};
use crate::filter::{TicketFilter, sort_recent_first};
use crate::state::AppState;
use crate::store::{TicketStore, parse_status};

/// Filtered tickets, newest first. Shared with the rendered tickets page.
pub fn visible_tickets(store: &TicketStore, filter: &TicketFilter) -> DeskResult<Vec<Ticket>> {
    let mut tickets = filter.apply(store.list()?);
    sort_recent_first(&mut tickets);
    Ok(tickets)
}

pub fn new_ticket(title: String, description: Option<String>, status: Option<&str>) -> DeskResult<NewTicket> {
    Ok(NewTicket {
        title,
        description,
        status: parse_status(status)?,
    })
}

pub fn ticket_patch(
    title: Option<String>,
    description: Option<String>,
    status: Option<&str>,
) -> DeskResult<TicketPatch> {
    Ok(TicketPatch {
        title,
        description,
        status: parse_status(status)?,
    })
}

/// GET /api/tickets?q=&status=
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let filter = TicketFilter::from_query(&query)?;
    let store = state.tickets.clone();
    let tickets = blocking(move || visible_tickets(&store, &filter)).await?;
    debug!("Listing {} tickets", tickets.len());
    Ok(Json(tickets))
}

/// GET /api/tickets/{id}
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(_user): Extension<User>,
) -> Result<Json<Ticket>, ApiError> {
    let store = state.tickets.clone();
    Ok(Json(blocking(move || store.get(&id)).await?))
}

/// POST /api/tickets
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(_user): Extension<User>,
    ApiJson(req): ApiJson<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = new_ticket(req.title, req.description, req.status.as_deref())?;
    let store = state.tickets.clone();
    let ticket = blocking(move || store.create(new)).await?;

    Ok((StatusCode::CREATED, Json(MutationResponse::ok(Some(ticket)))))
}

/// PATCH /api/tickets/{id}
pub async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(_user): Extension<User>,
    ApiJson(req): ApiJson<UpdateTicketRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let patch = ticket_patch(req.title, req.description, req.status.as_deref())?;
    let store = state.tickets.clone();
    let ticket = blocking(move || store.update(&id, patch)).await?;

    Ok(Json(MutationResponse::ok(Some(ticket))))
}

/// DELETE /api/tickets/{id}
pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(_user): Extension<User>,
) -> Result<Json<MutationResponse>, ApiError> {
    let store = state.tickets.clone();
    blocking(move || store.delete(&id)).await?;

    Ok(Json(MutationResponse::ok(None)))
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(_user): Extension<User>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let store = state.tickets.clone();
    let tickets = blocking(move || store.list()).await?;
    Ok(Json(dashboard::summarize(tickets)))
}
