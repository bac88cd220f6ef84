//! HTML for the server-rendered pages. Every piece of user data goes through
//! [`escape`].

use std::fmt::Write;

use chrono::{DateTime, Utc};

use ticketdesk_types::api::{DashboardResponse, StatusSlice};
use ticketdesk_types::models::{Ticket, TicketStatus, User};

use crate::dashboard::relative_time;
use crate::filter::TicketFilter;

/// Per-request data shared by every page.
pub struct PageContext<'a> {
    pub user: Option<&'a User>,
    /// Absent on pages without forms for a visitor who has no session yet.
    pub csrf_token: Option<&'a str>,
    pub success: Option<String>,
    pub error: Option<String>,
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, ctx: &PageContext<'_>, body: &str) -> String {
    let nav = match ctx.user {
        Some(user) => format!(
            r#"<a href="/dashboard">Dashboard</a> <a href="/tickets">Tickets</a>
      <span class="who">{}</span> <a href="/logout">Log out</a>"#,
            escape(&user.email)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/signup">Sign up</a>"#.to_string(),
    };

    let mut flashes = String::new();
    if let Some(msg) = &ctx.success {
        let _ = write!(flashes, r#"<div class="toast success">{}</div>"#, escape(msg));
    }
    if let Some(msg) = &ctx.error {
        let _ = write!(flashes, r#"<div class="toast error">{}</div>"#, escape(msg));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  {csrf_meta}
  <title>{title} · TicketDesk</title>
</head>
<body>
  <header><a class="brand" href="/">TicketDesk</a>
    <nav>{nav}</nav>
  </header>
  {flashes}
  <main>
{body}
  </main>
  <footer>&copy; {year} TicketDesk</footer>
</body>
</html>
"#,
        csrf_meta = ctx
            .csrf_token
            .map(|t| format!(r#"<meta name="csrf-token" content="{}">"#, escape(t)))
            .unwrap_or_default(),
        title = escape(title),
        year = Utc::now().format("%Y"),
    )
}

fn csrf_field(ctx: &PageContext<'_>) -> String {
    format!(r#"<input type="hidden" name="csrf_token" value="{}">"#, escape(ctx.csrf_token.unwrap_or_default()))
}

fn status_tag(status: TicketStatus) -> String {
    format!(r#"<span class="tag tag-{}">{}</span>"#, status.as_str(), status.label())
}

fn status_options(selected: Option<TicketStatus>, with_all: bool) -> String {
    let mut out = String::new();
    if with_all {
        let sel = if selected.is_none() { " selected" } else { "" };
        let _ = write!(out, r#"<option value="all"{sel}>All statuses</option>"#);
    }
    for status in TicketStatus::ALL {
        let sel = if selected == Some(status) { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{}"{sel}>{}</option>"#, status.as_str(), status.label());
    }
    out
}

pub fn landing(ctx: &PageContext<'_>) -> String {
    let body = r#"    <section class="hero">
      <h1>Support tickets, sorted.</h1>
      <p>Create, track and resolve support requests in one place.</p>
      <a class="button" href="/signup">Get started</a> <a class="button secondary" href="/login">Log in</a>
    </section>"#;
    layout("Welcome", ctx, body)
}

fn credentials_form(ctx: &PageContext<'_>, action: &str, submit: &str, confirm: bool) -> String {
    let confirm_field = if confirm {
        r#"
      <label>Confirm password <input type="password" name="confirm_password" required></label>"#
    } else {
        ""
    };
    format!(
        r#"    <form class="auth" method="post" action="{action}">
      {csrf}
      <label>Email <input type="email" name="email" required autofocus></label>
      <label>Password <input type="password" name="password" required></label>{confirm_field}
      <button type="submit">{submit}</button>
    </form>"#,
        csrf = csrf_field(ctx),
    )
}

pub fn login(ctx: &PageContext<'_>) -> String {
    let body = format!(
        "    <h1>Log in</h1>\n{}\n    <p>No account? <a href=\"/signup\">Sign up</a></p>",
        credentials_form(ctx, "/login", "Log in", false)
    );
    layout("Log in", ctx, &body)
}

pub fn signup(ctx: &PageContext<'_>) -> String {
    let body = format!(
        "    <h1>Create an account</h1>\n{}\n    <p>Already registered? <a href=\"/login\">Log in</a></p>",
        credentials_form(ctx, "/signup", "Sign up", true)
    );
    layout("Sign up", ctx, &body)
}

fn pie_chart(slices: &[StatusSlice]) -> String {
    if slices.is_empty() {
        return r#"<p class="empty">No ticket data to display.</p>"#.to_string();
    }

    let mut svg = String::from(r#"<svg viewBox="0 0 100 100" class="pie">"#);
    for slice in slices.iter().filter(|s| s.value > 0) {
        match &slice.path {
            Some(d) => {
                let _ = write!(svg, r#"<path d="{d}" fill="{}"/>"#, slice.color);
            }
            None => {
                let _ = write!(svg, r#"<circle cx="50" cy="50" r="40" fill="{}"/>"#, slice.color);
            }
        }
    }
    svg.push_str("</svg>");

    let mut legend = String::from(r#"<ul class="legend">"#);
    for slice in slices {
        let _ = write!(
            legend,
            r#"<li><span class="dot" style="background:{}"></span>{} ({}) {:.0}%</li>"#,
            slice.color, slice.label, slice.value, slice.percentage
        );
    }
    legend.push_str("</ul>");

    format!("{svg}\n{legend}")
}

pub fn dashboard(ctx: &PageContext<'_>, summary: &DashboardResponse, now: DateTime<Utc>) -> String {
    let stats = &summary.stats;
    let greeting = ctx.user.map(|u| escape(&u.email)).unwrap_or_default();

    let mut recent = String::new();
    if summary.recent.is_empty() {
        recent.push_str(r#"<p class="empty">No recent activity.</p>"#);
    } else {
        recent.push_str("<ul class=\"recent\">");
        for ticket in &summary.recent {
            let _ = write!(
                recent,
                "<li><strong>{}</strong> {} <time datetime=\"{}\">{}</time></li>",
                escape(&ticket.title),
                status_tag(ticket.status),
                ticket.updated_at.to_rfc3339(),
                relative_time(ticket.updated_at, now),
            );
        }
        recent.push_str("</ul>");
    }

    let body = format!(
        r#"    <h1>Welcome back, {greeting}!</h1>
    <p>Here's a snapshot of your support activity. <a class="button" href="/tickets">Create New Ticket</a></p>
    <section class="cards">
      <div class="card"><dt>Total Tickets</dt><dd>{total}</dd></div>
      <div class="card"><dt>Open Tickets</dt><dd>{open}</dd></div>
      <div class="card"><dt>In Progress</dt><dd>{in_progress}</dd></div>
      <div class="card"><dt>Resolved Tickets</dt><dd>{closed}</dd></div>
    </section>
    <section class="card">
      <h2>Ticket Status Distribution</h2>
      {pie}
    </section>
    <section class="card">
      <h2>Recent Activity</h2>
      {recent}
    </section>"#,
        total = stats.total,
        open = stats.open,
        in_progress = stats.in_progress,
        closed = stats.closed,
        pie = pie_chart(&summary.distribution),
    );
    layout("Dashboard", ctx, &body)
}

fn ticket_card(ctx: &PageContext<'_>, ticket: &Ticket) -> String {
    let id = escape(&ticket.id);
    let title = escape(&ticket.title);
    let description = escape(&ticket.description);
    format!(
        r#"      <article class="ticket">
        <h3>{title}</h3> {tag}
        <p>{description}</p>
        <small>Updated {updated}</small>
        <details><summary>Edit</summary>
          <form method="post" action="/tickets/update">
            {csrf}
            <input type="hidden" name="id" value="{id}">
            <label>Title <input name="title" value="{title}" required></label>
            <label>Description <textarea name="description">{description}</textarea></label>
            <label>Status <select name="status">{options}</select></label>
            <button type="submit">Save</button>
          </form>
        </details>
        <form method="post" action="/tickets/delete" class="inline">
          {csrf}
          <input type="hidden" name="id" value="{id}">
          <button type="submit" class="danger">Delete</button>
        </form>
      </article>"#,
        tag = status_tag(ticket.status),
        updated = ticket.updated_at.format("%Y-%m-%d %H:%M UTC"),
        csrf = csrf_field(ctx),
        options = status_options(Some(ticket.status), false),
    )
}

pub fn tickets(ctx: &PageContext<'_>, tickets: &[Ticket], filter: &TicketFilter, total: usize) -> String {
    let mut list = String::new();
    if tickets.is_empty() {
        let hint = if total > 0 {
            "Try adjusting your search or filter."
        } else {
            "Get started by creating a new ticket."
        };
        let _ = write!(list, r#"      <p class="empty">No tickets found. {hint}</p>"#);
    } else {
        for ticket in tickets {
            list.push_str(&ticket_card(ctx, ticket));
            list.push('\n');
        }
    }

    let body = format!(
        r#"    <h1>Tickets</h1>
    <form class="filters" method="get" action="/tickets">
      <input type="search" name="q" value="{search}" placeholder="Search by title or description">
      <select name="status">{filter_options}</select>
      <button type="submit">Filter</button>
    </form>
    <details class="create"><summary>Create New Ticket</summary>
      <form method="post" action="/tickets/create">
        {csrf}
        <label>Title <input name="title" required></label>
        <label>Description <textarea name="description"></textarea></label>
        <label>Status <select name="status">{new_options}</select></label>
        <button type="submit">Create</button>
      </form>
    </details>
    <section class="tickets">
{list}
    </section>"#,
        search = escape(filter.search()),
        filter_options = status_options(filter.status(), true),
        csrf = csrf_field(ctx),
        new_options = status_options(Some(TicketStatus::Open), false),
    );
    layout("Tickets", ctx, &body)
}

pub fn not_found(ctx: &PageContext<'_>) -> String {
    let body = r#"    <h1>404</h1>
    <p>The page you're looking for doesn't exist.</p>
    <a class="button" href="/">Go home</a>"#;
    layout("Page not found", ctx, body)
}
