use chrono::{DateTime, Utc};

use ticketdesk_types::api::{DashboardResponse, DashboardStats, StatusSlice};
use ticketdesk_types::models::{Ticket, TicketStatus};

use crate::filter::sort_recent_first;

pub const RECENT_LIMIT: usize = 5;

const PIE_CENTER: f64 = 50.0;
const PIE_RADIUS: f64 = 40.0;

pub fn stats(tickets: &[Ticket]) -> DashboardStats {
    let mut stats = DashboardStats {
        total: tickets.len(),
        ..Default::default()
    };
    for ticket in tickets {
        match ticket.status {
            TicketStatus::Open => stats.open += 1,
            TicketStatus::InProgress => stats.in_progress += 1,
            TicketStatus::Closed => stats.closed += 1,
        }
    }
    stats
}

/// The most recently updated tickets, newest first.
pub fn recent(mut tickets: Vec<Ticket>, limit: usize) -> Vec<Ticket> {
    sort_recent_first(&mut tickets);
    tickets.truncate(limit);
    tickets
}

pub fn summarize(tickets: Vec<Ticket>) -> DashboardResponse {
    let stats = stats(&tickets);
    DashboardResponse {
        stats,
        recent: recent(tickets, RECENT_LIMIT),
        distribution: distribution(&stats),
    }
}

fn status_color(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "#10B981",
        TicketStatus::InProgress => "#F59E0B",
        TicketStatus::Closed => "#6B7280",
    }
}

fn status_count(stats: &DashboardStats, status: TicketStatus) -> usize {
    match status {
        TicketStatus::Open => stats.open,
        TicketStatus::InProgress => stats.in_progress,
        TicketStatus::Closed => stats.closed,
    }
}

/// Pie chart slices in status order. Empty when there are no tickets.
///
/// A slice that fills the whole pie, or an empty one, has no `path`: the
/// former is drawn as a plain circle, the latter not at all.
pub fn distribution(stats: &DashboardStats) -> Vec<StatusSlice> {
    let total: usize = TicketStatus::ALL.iter().map(|s| status_count(stats, *s)).sum();
    if total == 0 {
        return Vec::new();
    }

    let mut cursor = 0.0;
    TicketStatus::ALL
        .iter()
        .map(|&status| {
            let value = status_count(stats, status);
            let share = value as f64 / total as f64;
            let start = cursor;
            let end = start + share * 360.0;
            cursor = end;

            let path = (value > 0 && value < total).then(|| slice_path(start, end));
            StatusSlice {
                label: status.label(),
                value,
                color: status_color(status),
                percentage: share * 100.0,
                start_angle: start,
                end_angle: end,
                path,
            }
        })
        .collect()
}

/// Point on the pie rim; 0 degrees is twelve o'clock.
fn rim_point(angle_deg: f64) -> (f64, f64) {
    let rad = (angle_deg - 90.0).to_radians();
    (PIE_CENTER + PIE_RADIUS * rad.cos(), PIE_CENTER + PIE_RADIUS * rad.sin())
}

fn slice_path(start: f64, end: f64) -> String {
    let (sx, sy) = rim_point(start);
    let (ex, ey) = rim_point(end);
    let large_arc = u8::from(end - start > 180.0);
    format!(
        "M {c} {c} L {sx:.3} {sy:.3} A {r} {r} 0 {large_arc} 1 {ex:.3} {ey:.3} Z",
        c = PIE_CENTER,
        r = PIE_RADIUS,
    )
}

/// "just now", "3 minutes ago", "1 hour ago", "2 days ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(hours / 24, "day")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
