//! Gateway: HTTP server for the LINE webhook.
//!
//! `GET /health` and `POST /webhook`, each also under `/api`. Events of one webhook call are
//! handled concurrently; failures after signature verification still answer 200.

pub mod events;
mod server;

pub use events::{EventContext, EventError};
pub use server::{router, run_gateway, GatewayState, HANDLED_BODY};
