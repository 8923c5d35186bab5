//! HTTP front end for the agent.
//!
//! `POST /` runs one agent loop per request and answers with the final text;
//! `GET /health` reports liveness.

pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::GatewayState;
