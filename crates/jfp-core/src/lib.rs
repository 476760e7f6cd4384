//! jfp-core: shared types, IDs, errors, and configuration for the federation proxy.
//!
//! This crate is the foundational dependency for jfp-db and jfp-server,
//! providing type-safe identifiers, a unified error type, and environment-driven
//! application configuration.

pub mod config;
pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
