//! Mung Core - Shared types library.
//!
//! This crate provides the types used by the Mung admin tools:
//! - `admin` - Administrative dashboard (server-rendered, talks to the backend)
//! - `cli` - Command-line tools for bootstrap and backup/restore
//!
//! # Architecture
//!
//! Every entity here is owned by the external backend service. The admin only
//! deserializes, displays, and re-serializes them. The core crate contains only
//! types and pure helpers - no I/O and no HTTP clients.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, and the backend's JSON entities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
