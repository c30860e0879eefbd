//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase.
//! - Credentials never leave the server.

pub mod admin;
pub mod auth;
pub mod candidate;
pub mod election;
pub mod id;
pub mod response;
pub mod stats;
pub mod vote;
pub mod voter;
