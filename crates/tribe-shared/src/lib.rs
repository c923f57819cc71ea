//! # tribe-shared
//!
//! Domain model shared by every Tribe crate: messages, participants, feed
//! items and the timestamp coercion rules applied at the wire boundary.

pub mod constants;
pub mod error;
pub mod time;
pub mod types;

pub use error::ValidationError;
pub use types::*;
