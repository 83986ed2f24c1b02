//! Stevedore Core
//!
//! Core types and pure logic for the stevedore workload lifecycle engine.
//!
//! This crate contains:
//! - Domain types: Job descriptors, manifests, infrastructure target config
//! - DTOs: Request types exchanged with the host orchestrator
//! - Naming: Deterministic resource/container/image name derivation
//! - Env: Environment variable merging and reserved-name conflict detection

pub mod domain;
pub mod dto;
pub mod env;
pub mod naming;
