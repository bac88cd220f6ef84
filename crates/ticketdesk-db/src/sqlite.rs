use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use tracing::info;

use ticketdesk_types::models::{Ticket, TicketStatus, UserRecord};

use crate::{TicketRepository, UserRepository, migrations};

/// Embedded SQLite backend. One connection behind a mutex; rows keep
/// insertion order through `rowid`.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Ticket {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: status.parse::<TicketStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

const TICKET_COLUMNS: &str = "id, title, description, status, created_at, updated_at";

impl TicketRepository for SqliteDatabase {
    fn list(&self) -> Result<Vec<Ticket>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets ORDER BY rowid"))?;
            let rows = stmt
                .query_map([], ticket_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"))?;
            let mut rows = stmt.query_map([id], ticket_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    fn insert(&self, ticket: &Ticket) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tickets (id, title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ticket.id,
                    ticket.title,
                    ticket.description,
                    ticket.status.as_str(),
                    encode_time(&ticket.created_at),
                    encode_time(&ticket.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn replace(&self, ticket: &Ticket) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tickets
                 SET title = ?2, description = ?3, status = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    ticket.id,
                    ticket.title,
                    ticket.description,
                    ticket.status.as_str(),
                    encode_time(&ticket.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn remove(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM tickets WHERE id = ?1", [id])? > 0))
    }
}

impl UserRepository for SqliteDatabase {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, password_hash FROM users WHERE email = ?1")?;
            let mut rows = stmt.query_map([email], user_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, email, password_hash FROM users WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], user_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    fn insert(&self, user: &UserRecord) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO NOTHING",
                params![user.id, user.email, user.password_hash],
            )?;
            Ok(inserted > 0)
        })
    }

    fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as usize)
        })
    }
}
