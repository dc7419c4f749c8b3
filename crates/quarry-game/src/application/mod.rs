//! Application layer: command handlers, guard probes and queries.

pub mod command_handlers;
pub mod guards;
pub mod hooks;
pub mod query_handlers;
