//! Core domain types
//!
//! These types represent the fundamental entities shared between the host
//! orchestrator (which persists job records) and the lifecycle engine
//! (which produces them from deploys and discovery).

pub mod job;
pub mod target;
