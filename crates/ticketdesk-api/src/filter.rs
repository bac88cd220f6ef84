use ticketdesk_types::api::TicketQuery;
use ticketdesk_types::error::DeskResult;
use ticketdesk_types::models::{Ticket, TicketStatus};

use crate::store::parse_status;

/// Search text and status, applied conjunctively. The search text is matched
/// as typed, surrounding whitespace included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    search: String,
    status: Option<TicketStatus>,
}

impl TicketFilter {
    pub fn new(search: &str, status: Option<TicketStatus>) -> Self {
        Self {
            search: search.to_lowercase(),
            status,
        }
    }

    /// Build from `?q=&status=`; `status=all` means any status.
    pub fn from_query(query: &TicketQuery) -> DeskResult<Self> {
        let status = match query.status.as_deref().map(str::trim) {
            Some("all") => None,
            other => parse_status(other)?,
        };
        Ok(Self::new(query.q.as_deref().unwrap_or_default(), status))
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn status(&self) -> Option<TicketStatus> {
        self.status
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        let text_ok = self.search.is_empty()
            || ticket.title.to_lowercase().contains(&self.search)
            || ticket.description.to_lowercase().contains(&self.search);
        let status_ok = self.status.is_none_or(|s| s == ticket.status);
        text_ok && status_ok
    }

    pub fn apply(&self, tickets: Vec<Ticket>) -> Vec<Ticket> {
        tickets.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Newest `updated_at` first. Stable for equal timestamps.
pub fn sort_recent_first(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn ticket(title: &str, description: &str, status: TicketStatus, age_secs: i64) -> Ticket {
        let at = Utc::now() - Duration::seconds(age_secs);
        Ticket {
            id: title.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn sample() -> Vec<Ticket> {
        vec![
            ticket("A", "", TicketStatus::Open, 30),
            ticket("B", "", TicketStatus::Closed, 20),
            ticket("Printer jam", "paper stuck in tray a", TicketStatus::Open, 10),
            ticket("Email", "cannot send", TicketStatus::InProgress, 5),
        ]
    }

    fn ids(tickets: &[Ticket]) -> Vec<&str> {
        tickets.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn status_and_search_apply_together() {
        let filter = TicketFilter::new("A", Some(TicketStatus::Open));
        let result = filter.apply(sample());
        // "Email" contains an "a" but is in progress.
        assert_eq!(ids(&result), ["A", "Printer jam"]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let filter = TicketFilter::new("CANNOT", None);
        assert_eq!(ids(&filter.apply(sample())), ["Email"]);

        let filter = TicketFilter::new("printer", None);
        assert_eq!(ids(&filter.apply(sample())), ["Printer jam"]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        assert_eq!(TicketFilter::default().apply(sample()).len(), 4);
    }

    #[test]
    fn search_text_is_not_trimmed() {
        let filter = TicketFilter::new(" jam", None);
        assert_eq!(ids(&filter.apply(sample())), ["Printer jam"]);

        let filter = TicketFilter::new("jam ", None);
        assert!(filter.apply(sample()).is_empty());
    }

    #[test]
    fn status_only() {
        let filter = TicketFilter::new("", Some(TicketStatus::Closed));
        assert_eq!(ids(&filter.apply(sample())), ["B"]);
    }

    #[test]
    fn query_parsing_understands_all_and_rejects_unknown() {
        let query = TicketQuery {
            q: Some("x".into()),
            status: Some("all".into()),
        };
        assert_eq!(TicketFilter::from_query(&query).unwrap(), TicketFilter::new("x", None));

        let query = TicketQuery {
            q: None,
            status: Some("in_progress".into()),
        };
        assert_eq!(
            TicketFilter::from_query(&query).unwrap().status(),
            Some(TicketStatus::InProgress)
        );

        let query = TicketQuery {
            q: None,
            status: Some("urgent".into()),
        };
        assert!(TicketFilter::from_query(&query).is_err());
    }

    #[test]
    fn sorts_newest_first() {
        let mut tickets = sample();
        sort_recent_first(&mut tickets);
        assert_eq!(ids(&tickets), ["Email", "Printer jam", "B", "A"]);
    }
}
