//! Identifiers, wire types and the transport error shape shared by the chat
//! client crates.

pub mod domain;
pub mod error;
pub mod protocol;
