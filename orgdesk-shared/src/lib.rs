//! # Orgdesk Shared Library
//!
//! Data access, business rules and identity primitives for the Orgdesk
//! user and organization backend.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool, query executor and the partial-update builder
//! - `models`: Records and repositories for users, organizations and memberships
//! - `services`: Permission-checked business operations
//! - `auth`: Token validation, bearer middleware and permission checks
//! - `events`: Domain events and sinks
//! - `error`: Service error taxonomy
//! - `testing`: In-memory doubles (tests and the `testing` feature)

pub mod auth;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Current version of the Orgdesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
