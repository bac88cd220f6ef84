//! Cookie sessions for the rendered pages, on top of `tower-sessions`.
//!
//! The browser only holds the session id. The signed-in user, the CSRF token
//! and flash messages are typed keys on the [`Session`]; records live in
//! [`PageSessionStore`] and are written only once something is put in them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::{self, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion};
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};

use ticketdesk_types::error::{DeskError, DeskResult};
use ticketdesk_types::models::User;

pub const SESSION_COOKIE: &str = "ticketdesk_session";

const USER_KEY: &str = "user";
const CSRF_KEY: &str = "csrf_token";
const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot messages shown on the next rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Process-local session records, dropped once their idle expiry passes.
#[derive(Debug, Clone, Default)]
pub struct PageSessionStore {
    records: Arc<Mutex<HashMap<Id, Record>>>,
}

impl PageSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.expiry_date > now);
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for PageSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = self.records.lock().await;
        while records.contains_key(&record.id) {
            record.id = Id::default();
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        let records = self.records.lock().await;
        Ok(records.get(id).filter(|r| r.expiry_date > now).cloned())
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.records.lock().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for PageSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        self.purge_expired().await;
        Ok(())
    }
}

/// Session middleware: `HttpOnly`, `SameSite=Strict`, expiring after `idle`
/// without a request. Every request that touches a stored session pushes the
/// expiry forward.
pub fn layer(store: PageSessionStore, idle: chrono::Duration, secure: bool) -> SessionManagerLayer<PageSessionStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_path("/")
        .with_http_only(true)
        .with_same_site(SameSite::Strict)
        .with_secure(secure)
        .with_always_save(true)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(idle.num_seconds())))
}

fn internal(err: tower_sessions::session::Error) -> DeskError {
    DeskError::Internal(err.into())
}

pub async fn current_user(session: &Session) -> DeskResult<Option<User>> {
    session.get(USER_KEY).await.map_err(internal)
}

/// The session's CSRF token, minted on first use.
pub async fn csrf_token(session: &Session) -> DeskResult<String> {
    if let Some(token) = existing_csrf_token(session).await? {
        return Ok(token);
    }
    let token = random_token();
    session.insert(CSRF_KEY, &token).await.map_err(internal)?;
    Ok(token)
}

/// The CSRF token if one was already minted. Never writes to the session.
pub async fn existing_csrf_token(session: &Session) -> DeskResult<Option<String>> {
    session.get(CSRF_KEY).await.map_err(internal)
}

/// Constant-time comparison against the session's CSRF token.
pub async fn validate_csrf(session: &Session, presented: &str) -> DeskResult<bool> {
    let expected = existing_csrf_token(session).await?;
    Ok(match expected {
        Some(expected) if !presented.is_empty() => {
            constant_time_eq::constant_time_eq(expected.as_bytes(), presented.as_bytes())
        }
        _ => false,
    })
}

/// Bind `user` to a new session id and CSRF token. Pending flash messages
/// carry over.
pub async fn log_in(session: &Session, user: &User) -> DeskResult<()> {
    session.cycle_id().await.map_err(internal)?;
    session.insert(USER_KEY, user).await.map_err(internal)?;
    session.insert(CSRF_KEY, random_token()).await.map_err(internal)?;
    Ok(())
}

pub async fn log_out(session: &Session) -> DeskResult<()> {
    session.flush().await.map_err(internal)
}

pub async fn set_flash(session: &Session, kind: FlashKind, message: impl Into<String>) -> DeskResult<()> {
    let mut flash: Flash = session.get(FLASH_KEY).await.map_err(internal)?.unwrap_or_default();
    match kind {
        FlashKind::Success => flash.success = Some(message.into()),
        FlashKind::Error => flash.error = Some(message.into()),
    }
    session.insert(FLASH_KEY, flash).await.map_err(internal)
}

/// Read and clear pending flash messages.
pub async fn take_flash(session: &Session) -> DeskResult<Flash> {
    let flash = session.remove::<Flash>(FLASH_KEY).await.map_err(internal)?;
    Ok(flash.unwrap_or_default())
}

/// True when the request carried a session cookie but no live record backs
/// it. Only meaningful after the session has been read.
pub fn lapsed(session: &Session, presented_cookie: bool) -> bool {
    presented_cookie && session.id().is_none()
}

/// 256 random bits, hex encoded.
fn random_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
