use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use ticketdesk_db::TicketRepository;
use ticketdesk_types::error::{DeskError, DeskResult};
use ticketdesk_types::models::{NewTicket, Ticket, TicketPatch, TicketStatus};

/// Owns the ticket collection: validation, id assignment and timestamps on
/// top of whichever repository backs it.
#[derive(Clone)]
pub struct TicketStore {
    repo: Arc<dyn TicketRepository>,
}

impl TicketStore {
    pub fn new(repo: Arc<dyn TicketRepository>) -> Self {
        Self { repo }
    }

    /// Every ticket, in storage order. Sort with
    /// [`crate::filter::sort_recent_first`] for display.
    pub fn list(&self) -> DeskResult<Vec<Ticket>> {
        Ok(self.repo.list()?)
    }

    pub fn get(&self, id: &str) -> DeskResult<Ticket> {
        self.repo.get(id)?.ok_or_else(|| DeskError::ticket_not_found(id))
    }

    pub fn create(&self, new: NewTicket) -> DeskResult<Ticket> {
        let title = validate_title(&new.title)?;
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::now_v7().to_string(),
            title,
            description: new.description.unwrap_or_default(),
            status: new.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.repo.insert(&ticket)?;
        info!("Ticket {} created ({})", ticket.id, ticket.status);
        Ok(ticket)
    }

    pub fn update(&self, id: &str, patch: TicketPatch) -> DeskResult<Ticket> {
        let mut ticket = self.get(id)?;

        if let Some(title) = patch.title {
            ticket.title = validate_title(&title)?;
        }
        if let Some(description) = patch.description {
            ticket.description = description;
        }
        if let Some(status) = patch.status {
            ticket.status = status;
        }
        ticket.updated_at = next_timestamp(ticket.updated_at);

        // The ticket may have been deleted between the read and the write.
        if !self.repo.replace(&ticket)? {
            return Err(DeskError::ticket_not_found(id));
        }
        info!("Ticket {} updated", ticket.id);
        Ok(ticket)
    }

    pub fn delete(&self, id: &str) -> DeskResult<()> {
        if !self.repo.remove(id)? {
            return Err(DeskError::ticket_not_found(id));
        }
        info!("Ticket {} deleted", id);
        Ok(())
    }
}

fn validate_title(title: &str) -> DeskResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DeskError::validation("Title is required."));
    }
    Ok(title.to_string())
}

/// `now`, or just after `previous` if the clock has not moved past it.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Parse a status coming from a form or JSON body. Blank means "not given".
pub fn parse_status(raw: Option<&str>) -> DeskResult<Option<TicketStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<TicketStatus>()
            .map(Some)
            .map_err(|_| DeskError::validation("Invalid status.")),
    }
}
