//! Repository modules — plain async functions over a `PgPool`.
//!
//! No business rules live here; the workflow layer owns the membership state
//! machine and repositories only expose the conditional writes it needs.

pub mod channels;
pub mod memberships;
pub mod messages;
pub mod roles;
