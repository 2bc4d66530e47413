//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//!
//! Each entity comes as an `XCore` holding its data, aliased as `NewX` for
//! insertion, and an `X` wrapping the core together with its unique ID.

pub mod ballot;
pub mod candidate;
pub mod election;
pub mod exception;
pub mod user;
pub mod whitelist;
