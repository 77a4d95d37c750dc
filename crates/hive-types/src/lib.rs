//! Shared domain types for the Hive instance bus.
//!
//! This crate contains the types exchanged between the bus facade, its
//! transport drivers and application code: discovery responses, ping round
//! control, configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod error;
pub mod pong;
