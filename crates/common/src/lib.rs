//! Shared trust configuration for the completion-token verifier and issuer.

pub mod config;

pub use config::{ConfigError, MasterSecret, TrustConfig, MASTER_SECRET_ENV};
