//! # waypoint-contracts
//!
//! Shared types, configuration, and error contracts for the Waypoint
//! orchestration core.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, small invariant helpers, and errors.

pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod plan;
pub mod rule;
