pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod pages;
pub mod router;
pub mod session;
pub mod state;
pub mod store;
pub mod tickets;
pub mod views;

pub use router::router;
pub use state::{AppState, AppStateInner, AuthSettings};
