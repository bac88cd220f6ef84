//! Cookie-session handlers for the server-rendered pages.

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, warn};

use ticketdesk_types::api::{MutationResponse, TicketQuery};
use ticketdesk_types::error::{AuthFailure, DeskError, DeskResult};
use ticketdesk_types::models::{Ticket, User};

use crate::dashboard;
use crate::error::{ApiError, blocking};
use crate::filter::{TicketFilter, sort_recent_first};
use crate::session::{self, FlashKind, SESSION_COOKIE};
use crate::state::AppState;
use crate::store::TicketStore;
use crate::tickets::{new_ticket, ticket_patch};
use crate::views::{self, PageContext};

const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    confirm_password: Option<String>,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketForm {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    csrf_token: Option<String>,
}

/// Render a page with the caller's flash messages. `form` pages mint a CSRF
/// token; others only show one that already exists, so anonymous browsing
/// leaves nothing in the session store.
async fn render(
    session: &Session,
    user: Option<&User>,
    form: bool,
    view: impl FnOnce(&PageContext<'_>) -> String,
) -> Result<Response, ApiError> {
    let csrf = if form {
        Some(session::csrf_token(session).await?)
    } else {
        session::existing_csrf_token(session).await?
    };
    let flash = session::take_flash(session).await?;
    let ctx = PageContext {
        user,
        csrf_token: csrf.as_deref(),
        success: flash.success,
        error: flash.error,
    };
    Ok(Html(view(&ctx)).into_response())
}

/// Send an anonymous visitor to the login page, saying so when the cookie they
/// presented named a session that has since lapsed.
async fn to_login(session: &Session, jar: &CookieJar) -> Result<Response, ApiError> {
    if session::lapsed(session, jar.get(SESSION_COOKIE).is_some()) {
        let msg = AuthFailure::SessionExpired.message();
        session::set_flash(session, FlashKind::Error, msg).await?;
    }
    Ok(Redirect::to("/login").into_response())
}

async fn flash_redirect(
    session: &Session,
    kind: FlashKind,
    message: impl Into<String>,
    to: &str,
) -> Result<Response, ApiError> {
    session::set_flash(session, kind, message).await?;
    Ok(Redirect::to(to).into_response())
}

/// GET /
pub async fn home(session: Session) -> Result<Response, ApiError> {
    if session::current_user(&session).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render(&session, None, false, views::landing).await
}

/// GET /login
pub async fn show_login(session: Session) -> Result<Response, ApiError> {
    if session::current_user(&session).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render(&session, None, true, views::login).await
}

/// GET /signup
pub async fn show_signup(session: Session) -> Result<Response, ApiError> {
    if session::current_user(&session).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render(&session, None, true, views::signup).await
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if !session::validate_csrf(&session, &form.csrf_token).await? {
        warn!("Login form rejected: bad CSRF token");
        let msg = AuthFailure::InvalidCsrfToken.message();
        return flash_redirect(&session, FlashKind::Error, msg, "/login").await;
    }

    let accounts = state.accounts.clone();
    match blocking(move || accounts.verify(&form.email, &form.password)).await {
        Ok(user) => {
            session::log_in(&session, &user).await?;
            debug!("User {} signed in through the login form", user.id);
            flash_redirect(&session, FlashKind::Success, "Welcome back!", "/dashboard").await
        }
        Err(err) => flash_redirect(&session, FlashKind::Error, err.message(), "/login").await,
    }
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    if !session::validate_csrf(&session, &form.csrf_token).await? {
        warn!("Signup form rejected: bad CSRF token");
        let msg = AuthFailure::InvalidCsrfToken.message();
        return flash_redirect(&session, FlashKind::Error, msg, "/signup").await;
    }

    let accounts = state.accounts.clone();
    let result = blocking(move || {
        accounts.register(&form.email, &form.password, form.confirm_password.as_deref())
    })
    .await;

    match result {
        Ok(user) => {
            session::log_in(&session, &user).await?;
            flash_redirect(&session, FlashKind::Success, "Account created successfully!", "/dashboard").await
        }
        Err(err) => flash_redirect(&session, FlashKind::Error, err.message(), "/signup").await,
    }
}

/// GET /logout
pub async fn logout(session: Session) -> Result<Response, ApiError> {
    session::log_out(&session).await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let Some(user) = session::current_user(&session).await? else {
        return to_login(&session, &jar).await;
    };

    let store = state.tickets.clone();
    let summary = dashboard::summarize(blocking(move || store.list()).await?);
    let now = Utc::now();
    render(&session, Some(&user), true, |ctx| views::dashboard(ctx, &summary, now)).await
}

/// GET /tickets?q=&status=
pub async fn tickets(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Query(query): Query<TicketQuery>,
) -> Result<Response, ApiError> {
    let Some(user) = session::current_user(&session).await? else {
        return to_login(&session, &jar).await;
    };

    // An unrecognised status in the URL shows every status rather than an error.
    let filter = TicketFilter::from_query(&query)
        .unwrap_or_else(|_| TicketFilter::new(query.q.as_deref().unwrap_or_default(), None));

    let store = state.tickets.clone();
    let applied = filter.clone();
    let (visible, total) = blocking(move || {
        let all = store.list()?;
        let total = all.len();
        let mut visible = applied.apply(all);
        sort_recent_first(&mut visible);
        Ok((visible, total))
    })
    .await?;

    render(&session, Some(&user), true, |ctx| views::tickets(ctx, &visible, &filter, total)).await
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Update,
    Delete,
}

impl Mutation {
    fn done(self) -> &'static str {
        match self {
            Mutation::Create => "Ticket created successfully!",
            Mutation::Update => "Ticket updated successfully!",
            Mutation::Delete => "Ticket deleted successfully!",
        }
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"))
}

fn required_id(id: Option<String>) -> DeskResult<String> {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeskError::validation("Ticket ID is required."))
}

fn apply_mutation(store: &TicketStore, op: Mutation, form: TicketForm) -> DeskResult<Option<Ticket>> {
    match op {
        Mutation::Create => {
            let new = new_ticket(form.title.unwrap_or_default(), form.description, form.status.as_deref())?;
            store.create(new).map(Some)
        }
        Mutation::Update => {
            let id = required_id(form.id)?;
            let patch = ticket_patch(form.title, form.description, form.status.as_deref())?;
            store.update(&id, patch).map(Some)
        }
        Mutation::Delete => {
            let id = required_id(form.id)?;
            store.delete(&id)?;
            Ok(None)
        }
    }
}

/// Shared body of the ticket form endpoints. Script callers get JSON; plain
/// browser form posts are sent back to the list with a flash.
async fn mutate(
    state: &AppState,
    session: &Session,
    jar: &CookieJar,
    headers: &HeaderMap,
    form: TicketForm,
    op: Mutation,
) -> Result<Response, ApiError> {
    let html = wants_html(headers);

    if session::current_user(session).await?.is_none() {
        if html {
            return to_login(session, jar).await;
        }
        return Err(ApiError::unauthorized());
    }

    let token = form
        .csrf_token
        .clone()
        .or_else(|| headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string))
        .unwrap_or_default();
    if !session::validate_csrf(session, &token).await? {
        warn!("Ticket {:?} rejected: bad CSRF token", op);
        let err = ApiError::from(DeskError::Auth(AuthFailure::InvalidCsrfToken));
        if html {
            return flash_redirect(session, FlashKind::Error, err.message(), "/tickets").await;
        }
        return Err(err);
    }

    let store = state.tickets.clone();
    let result = blocking(move || apply_mutation(&store, op, form)).await;

    match (result, html) {
        (Ok(ticket), false) => Ok(Json(MutationResponse::ok(ticket)).into_response()),
        (Ok(_), true) => flash_redirect(session, FlashKind::Success, op.done(), "/tickets").await,
        (Err(err), false) => Err(err),
        (Err(err), true) => flash_redirect(session, FlashKind::Error, err.message(), "/tickets").await,
    }
}

/// POST /tickets/create
pub async fn create_ticket(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<TicketForm>,
) -> Result<Response, ApiError> {
    mutate(&state, &session, &jar, &headers, form, Mutation::Create).await
}

/// POST /tickets/update
pub async fn update_ticket(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<TicketForm>,
) -> Result<Response, ApiError> {
    mutate(&state, &session, &jar, &headers, form, Mutation::Update).await
}

/// POST /tickets/delete
pub async fn delete_ticket(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<TicketForm>,
) -> Result<Response, ApiError> {
    mutate(&state, &session, &jar, &headers, form, Mutation::Delete).await
}

/// Fallback for unknown routes.
pub async fn not_found(session: Session) -> Result<Response, ApiError> {
    let user = session::current_user(&session).await?;
    let page = render(&session, user.as_ref(), false, views::not_found).await?;
    Ok((StatusCode::NOT_FOUND, page).into_response())
}
