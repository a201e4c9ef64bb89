//! Core types and shared functionality for revrest.
//!
//! This crate provides:
//! - The site-partitioned result cache and the in-flight request cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{FetchPromisesCache, SiteBasedCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
