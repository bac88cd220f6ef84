//! Storage backends for tickets and accounts.
//!
//! Call sites only see [`TicketRepository`] and [`UserRepository`]; the
//! concrete backend is picked once at startup through [`Backend`].

pub mod json;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use ticketdesk_types::models::{Ticket, UserRecord};

/// Persistence for the ticket collection.
///
/// Methods are synchronous; async callers run them on the blocking pool.
pub trait TicketRepository: Send + Sync {
    /// All tickets in storage order.
    fn list(&self) -> Result<Vec<Ticket>>;

    fn get(&self, id: &str) -> Result<Option<Ticket>>;

    fn insert(&self, ticket: &Ticket) -> Result<()>;

    /// Overwrite the ticket with the same id. Returns `false` if no such ticket.
    fn replace(&self, ticket: &Ticket) -> Result<bool>;

    /// Returns `false` if no such ticket.
    fn remove(&self, id: &str) -> Result<bool>;
}

/// Persistence for user accounts.
pub trait UserRepository: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    /// Insert a new account. Returns `false` when the email is already taken.
    fn insert(&self, user: &UserRecord) -> Result<bool>;

    fn count(&self) -> Result<usize>;
}

/// Which storage backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `tickets.json` and `users.json` inside the directory.
    Json(PathBuf),
    /// A single SQLite database file.
    Sqlite(PathBuf),
    /// Process-local, lost on restart.
    Memory,
}

#[derive(Clone)]
pub struct Repositories {
    pub tickets: Arc<dyn TicketRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    pub fn open(backend: &Backend) -> Result<Self> {
        match backend {
            Backend::Json(dir) => {
                let tickets = json::JsonTicketRepository::open(dir.join("tickets.json"))?;
                let users = json::JsonUserRepository::open(dir.join("users.json"))?;
                Ok(Self {
                    tickets: Arc::new(tickets),
                    users: Arc::new(users),
                })
            }
            Backend::Sqlite(path) => {
                let db = Arc::new(sqlite::SqliteDatabase::open(path)?);
                Ok(Self {
                    tickets: db.clone(),
                    users: db,
                })
            }
            Backend::Memory => Ok(Self::in_memory()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            tickets: Arc::new(memory::MemoryTicketRepository::default()),
            users: Arc::new(memory::MemoryUserRepository::default()),
        }
    }
}
