//! Complaint intelligence inference engine.
//!
//! Classifies free-text academic complaints, finds similar resolved complaints, estimates
//! resolution time against a fixed SLA and flags resolutions that look anomalous. Models are
//! loaded from pre-trained artifacts; a missing artifact disables only the features that
//! depend on it.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
