//! Core domain models shared across all Campus services.
//!
//! These are the "truth" types — what the database stores and the API
//! serializes. Ids are UUID v7: globally unique and time-sortable.

pub mod channel;
pub mod membership;
pub mod message;
pub mod role;

/// Re-export all model types for convenience.
pub use channel::*;
pub use membership::*;
pub use message::*;
pub use role::*;
