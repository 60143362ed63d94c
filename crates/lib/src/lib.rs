//! Relay core library: Intercom webhook verification and routing, notification
//! formatting, Teams and Intercom clients, and the HTTP gateway used by the CLI.

pub mod chat;
pub mod config;
pub mod events;
pub mod format;
pub mod gateway;
pub mod init;
pub mod messaging;
pub mod processor;
pub mod routing;
pub mod signature;
pub mod store;
