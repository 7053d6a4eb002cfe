//! Web dashboard: the start/stop form and the live log viewer.

pub mod routes;
pub mod server;
pub mod state;
pub mod templates;
pub mod websocket;

pub use server::{router, start_dashboard};
pub use state::{DashboardState, LogLine};
