//! # Application Layer
//!
//! Collaborator interfaces and the recommendation use cases that orchestrate
//! them.

mod config;
pub mod interfaces;
pub mod use_cases;

pub use config::*;
pub use interfaces::*;
pub use use_cases::*;
