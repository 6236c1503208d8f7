//! HTTP control interface
//!
//! The command surface exposed to UI collaborators: transport commands,
//! read-only status and meter accessors, and a server-sent-events stream
//! of player events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
