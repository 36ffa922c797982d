//! Liveness probing for containerized services
//!
//! Provides:
//! - The HTTP client abstraction and its ureq implementation
//! - Candidate-host probing with hint-first ordering

pub mod checker;
pub mod http;

pub use checker::{Liveness, probe};
pub use http::{HttpClient, UreqClient};
