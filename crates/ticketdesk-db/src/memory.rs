use std::sync::Mutex;

use anyhow::{Result, anyhow};

use ticketdesk_types::models::{Ticket, UserRecord};

use crate::{TicketRepository, UserRepository};

#[derive(Default)]
pub struct MemoryTicketRepository {
    tickets: Mutex<Vec<Ticket>>,
}

impl MemoryTicketRepository {
    fn with<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Ticket>) -> Result<T>,
    {
        let mut tickets = self.tickets.lock().map_err(|e| anyhow!("Ticket lock poisoned: {}", e))?;
        f(&mut tickets)
    }
}

impl TicketRepository for MemoryTicketRepository {
    fn list(&self) -> Result<Vec<Ticket>> {
        self.with(|all| Ok(all.clone()))
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>> {
        self.with(|all| Ok(all.iter().find(|t| t.id == id).cloned()))
    }

    fn insert(&self, ticket: &Ticket) -> Result<()> {
        self.with(|all| {
            if all.iter().any(|t| t.id == ticket.id) {
                return Err(anyhow!("ticket id {} already exists", ticket.id));
            }
            all.push(ticket.clone());
            Ok(())
        })
    }

    fn replace(&self, ticket: &Ticket) -> Result<bool> {
        self.with(|all| match all.iter_mut().find(|t| t.id == ticket.id) {
            Some(slot) => {
                *slot = ticket.clone();
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn remove(&self, id: &str) -> Result<bool> {
        self.with(|all| {
            let before = all.len();
            all.retain(|t| t.id != id);
            Ok(all.len() != before)
        })
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<UserRecord>>,
}

impl MemoryUserRepository {
    fn with<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> Result<T>,
    {
        let mut users = self.users.lock().map_err(|e| anyhow!("User lock poisoned: {}", e))?;
        f(&mut users)
    }
}

impl UserRepository for MemoryUserRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.with(|all| Ok(all.iter().find(|u| u.email == email).cloned()))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        self.with(|all| Ok(all.iter().find(|u| u.id == id).cloned()))
    }

    fn insert(&self, user: &UserRecord) -> Result<bool> {
        self.with(|all| {
            if all.iter().any(|u| u.email == user.email) {
                return Ok(false);
            }
            all.push(user.clone());
            Ok(true)
        })
    }

    fn count(&self) -> Result<usize> {
        self.with(|all| Ok(all.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[test]
    fn ticket_repository_contract() {
        contract::tickets(&MemoryTicketRepository::default());
    }

    #[test]
    fn user_repository_contract() {
        contract::users(&MemoryUserRepository::default());
    }
}
