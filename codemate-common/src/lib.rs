//! CodeMate Common Types
//!
//! Wire types for identity-provider webhook deliveries, shared by the backend
//! and anything else that needs to produce or inspect them.

pub mod identity;

pub use identity::{EmailAddress, UserCreatedData, UserDeletedData, WebhookEnvelope};
