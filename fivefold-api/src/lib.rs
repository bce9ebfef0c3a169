//! Fivefold session coordinator
//!
//! Seats two players, forwards the side to move's requests into
//! [`fivefold_core`], and pushes every state change to WebSocket subscribers.

pub mod config;
pub mod error;
pub mod events;
pub mod routes;
pub mod session;

pub use config::Args;
pub use routes::{router, AppState, AppStateInner};
pub use session::{Session, SessionError};
