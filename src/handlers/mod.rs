// handlers/mod.rs - route handlers, one module per API area
//
// All routes are public; caller authentication happens upstream.
pub mod attendance; // /api/attendance - rotating code verification
pub mod health;     // /, /health
pub mod message;    // /api/message - queue relay

pub use health::{health, root};
