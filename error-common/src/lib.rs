//! Common error handling for the clinic engine.
//!
//! Library crates own their domain errors (`DatabaseError`, `PushError`,
//! `ConfigError`); this crate holds the error type used at the process edge
//! by the server binary, where startup failures of any subsystem are folded
//! into a single enum before being reported.
//!
//! # Example
//!
//! ```rust
//! use error_common::{ClinicError, Result};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse()
//!         .map_err(|_| ClinicError::ConfigError(format!("invalid port: {raw}")))
//! }
//!
//! assert!(parse_port("8080").is_ok());
//! assert!(parse_port("eighty").is_err());
//! ```

pub mod types;

pub use types::*;
