//! Gateway: the HTTP surface of the relay.
//!
//! One port serves the Intercom webhook, the operator endpoints over Teams and Intercom,
//! the mapping-store CRUD under `/api/config`, and health probes.

mod config_api;
mod error;
mod server;
mod teams_api;
mod webhook;

pub use error::ApiError;
pub use server::{build_processor, build_router, run_gateway, GatewayState};
