pub mod ai;
pub mod auth;
pub mod cron;
pub mod daily;
pub mod devices;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod interactions;
pub mod middleware;
pub mod preferences;
pub mod push;
pub mod registry;
pub mod routes;
pub mod schedules;
pub mod state;
pub mod telegram;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
