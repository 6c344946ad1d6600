//! Domain layer for the research mission core
//!
//! This module contains the core models, the error taxonomy and the ports
//! through which external collaborators are reached.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
