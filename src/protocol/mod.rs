//! Wire protocol model
//!
//! Line-delimited JSON-RPC shapes exchanged with the provider process, and
//! the classification of incoming lines into a tagged union keyed on id
//! presence.

pub mod messages;

pub use messages::{RequestEnvelope, WireError, WireMessage, WireNotification, WireResponse};
