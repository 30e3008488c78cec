//! # notegen-core
//!
//! Core types, traits, and abstractions for the notegen generation pipeline.
//!
//! This crate provides the foundational data structures (generation jobs,
//! their configs and payloads), the parametric job state machine, and the
//! collaborator traits that the database, inference, and job crates implement
//! or consume.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use state::StageDescriptor;
pub use traits::*;
