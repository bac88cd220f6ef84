use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use ticketdesk_types::models::{Ticket, UserRecord};

use crate::{TicketRepository, UserRepository};

/// A JSON array on disk, read in full and rewritten in full on every change.
///
/// The mutex only orders writers inside this process. Two processes sharing
/// the same file can still lose each other's updates.
pub struct JsonCollection<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open the collection, creating the parent directory and an empty `[]`
    /// file if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
        if !path.exists() {
            write_atomically(&path, b"[]")?;
        }
        info!("JSON collection opened at {}", path.display());
        Ok(Self {
            path,
            lock: Mutex::new(()),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn load(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("JSON store lock poisoned: {}", e))?;
        self.read()
    }

    /// Read the whole collection, let `f` mutate it, then write it back.
    /// Nothing is written when `f` returns an error.
    pub fn modify<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        let _guard = self.lock.lock().map_err(|e| anyhow!("JSON store lock poisoned: {}", e))?;
        let mut items = self.read()?;
        let out = f(&mut items)?;
        let bytes = serde_json::to_vec_pretty(&items)?;
        write_atomically(&self.path, &bytes)?;
        debug!("Rewrote {} ({} records)", self.path.display(), items.len());
        Ok(out)
    }

    fn read(&self) -> Result<Vec<T>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", self.path.display()))
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

pub struct JsonTicketRepository {
    tickets: JsonCollection<Ticket>,
}

impl JsonTicketRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            tickets: JsonCollection::open(path)?,
        })
    }
}

impl TicketRepository for JsonTicketRepository {
    fn list(&self) -> Result<Vec<Ticket>> {
        self.tickets.load()
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>> {
        Ok(self.tickets.load()?.into_iter().find(|t| t.id == id))
    }

    fn insert(&self, ticket: &Ticket) -> Result<()> {
        self.tickets.modify(|all| {
            if all.iter().any(|t| t.id == ticket.id) {
                return Err(anyhow!("ticket id {} already exists", ticket.id));
            }
            all.push(ticket.clone());
            Ok(())
        })
    }

    fn replace(&self, ticket: &Ticket) -> Result<bool> {
        // Avoid rewriting the file for a miss.
        if self.get(&ticket.id)?.is_none() {
            return Ok(false);
        }
        self.tickets.modify(|all| match all.iter_mut().find(|t| t.id == ticket.id) {
            Some(slot) => {
                *slot = ticket.clone();
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn remove(&self, id: &str) -> Result<bool> {
        if self.get(id)?.is_none() {
            return Ok(false);
        }
        self.tickets.modify(|all| {
            let before = all.len();
            all.retain(|t| t.id != id);
            Ok(all.len() != before)
        })
    }
}

pub struct JsonUserRepository {
    users: JsonCollection<UserRecord>,
}

impl JsonUserRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            users: JsonCollection::open(path)?,
        })
    }
}

impl UserRepository for JsonUserRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.load()?.into_iter().find(|u| u.email == email))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.load()?.into_iter().find(|u| u.id == id))
    }

    fn insert(&self, user: &UserRecord) -> Result<bool> {
        if self.find_by_email(&user.email)?.is_some() {
            return Ok(false);
        }
        self.users.modify(|all| {
            // Re-check under the write lock.
            if all.iter().any(|u| u.email == user.email) {
                return Ok(false);
            }
            all.push(user.clone());
            Ok(true)
        })
    }

    fn count(&self) -> Result<usize> {
        Ok(self.users.load()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[test]
    fn ticket_repository_contract() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonTicketRepository::open(dir.path().join("tickets.json")).unwrap();
        contract::tickets(&repo);
    }

    #[test]
    fn user_repository_contract() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonUserRepository::open(dir.path().join("users.json")).unwrap();
        contract::users(&repo);
    }

    #[test]
    fn open_creates_empty_array_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tickets.json");
        let _repo = JsonTicketRepository::open(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        {
            let repo = JsonTicketRepository::open(&path).unwrap();
            repo.insert(&contract::ticket("keep", "Persisted")).unwrap();
        }
        let reopened = JsonTicketRepository::open(&path).unwrap();
        let all = reopened.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Persisted");
    }

    #[test]
    fn file_is_a_pretty_camel_case_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let repo = JsonTicketRepository::open(&path).unwrap();
        repo.insert(&contract::ticket("x", "Shape")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["id"], "x");
        assert!(first.get("createdAt").is_some());
    }

    #[test]
    fn failed_modify_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let repo = JsonTicketRepository::open(&path).unwrap();
        repo.insert(&contract::ticket("dup", "One")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(repo.insert(&contract::ticket("dup", "Two")).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "{not json").unwrap();
        let repo = JsonUserRepository::open(&path).unwrap();
        assert!(repo.count().is_err());
    }
}
