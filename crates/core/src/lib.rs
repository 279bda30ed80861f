//! Helpdesk domain core.
//!
//! Pure domain logic shared by the database, events, and API crates:
//! status enums and the ticket lifecycle transition table, the chat
//! access gate, SLA threshold evaluation, and the common error type.
//! This crate performs no I/O.

pub mod chat_access;
pub mod error;
pub mod roles;
pub mod sla;
pub mod status;
pub mod ticket;
pub mod types;
