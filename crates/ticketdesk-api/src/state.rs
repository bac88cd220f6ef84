use std::sync::Arc;

use chrono::Duration;

use ticketdesk_db::Repositories;

use crate::accounts::AccountStore;
use crate::session::PageSessionStore;
use crate::store::TicketStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub tickets: TicketStore,
    pub accounts: AccountStore,
    pub sessions: PageSessionStore,
    pub session_ttl: Duration,
    /// Mark the session cookie `Secure` (set when served over HTTPS).
    pub secure_cookies: bool,
}

/// Knobs the binary reads from its environment.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
}

impl AppStateInner {
    pub fn new(repos: Repositories, auth: AuthSettings) -> AppState {
        Arc::new(Self {
            tickets: TicketStore::new(repos.tickets),
            accounts: AccountStore::new(repos.users, auth.jwt_secret, auth.token_ttl),
            sessions: PageSessionStore::new(),
            session_ttl: auth.session_ttl,
            secure_cookies: auth.secure_cookies,
        })
    }
}
