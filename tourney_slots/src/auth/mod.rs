//! Caller identity handed to the reservation engine.
//!
//! Authentication itself (passwords, sessions, tokens) lives outside this
//! crate. Whatever authenticates the caller produces an [`Actor`]: a user id
//! plus exactly one [`Role`].
//!
//! ## Example
//!
//! ```
//! use tourney_slots::auth::{Actor, Role};
//!
//! let admin = Actor::operator(1);
//! assert!(admin.is_operator());
//! assert_eq!(Actor::participant(7).role, Role::Participant);
//! ```

pub mod models;

pub use models::{Actor, Role, UserId};
