use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, pages, session, tickets};

/// Every route the service answers, with the page session layer. CORS and
/// tracing are added by the binary.
pub fn router(state: AppState) -> Router {
    let sessions = session::layer(state.sessions.clone(), state.session_ttl, state.secure_cookies);

    let public_api = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login));

    let protected_api = Router::new()
        .route("/api/auth/session", get(auth::current_user))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route(
            "/api/tickets/{id}",
            get(tickets::get_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        )
        .route("/api/dashboard", get(tickets::dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let site = Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::show_login).post(pages::login))
        .route("/signup", get(pages::show_signup).post(pages::signup))
        .route("/logout", get(pages::logout))
        .route("/dashboard", get(pages::dashboard))
        .route("/tickets", get(pages::tickets))
        .route("/tickets/create", post(pages::create_ticket))
        .route("/tickets/update", post(pages::update_ticket))
        .route("/tickets/delete", post(pages::delete_ticket));

    Router::new()
        .merge(public_api)
        .merge(protected_api)
        .merge(site)
        .route("/health", get(health))
        .fallback(pages::not_found)
        .layer(sessions)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
