pub mod app;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod storage;
pub mod verification;

pub use app::app;
pub use state::AppState;

#[cfg(test)]
pub mod testing;
