//! # sllp-server
//!
//! Server side of SLLP.
//!
//! This crate provides:
//! - The command handler: one request packet in, one response packet out
//! - Layered configuration (defaults, YAML file, environment)
//! - A TCP transport serving the handler to many connections

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{Config, ConfigError, CurveConfig, NetworkConfig, RegistryConfig, VariableConfig};
pub use error::ServerError;
pub use handler::CommandHandler;
pub use server::{Server, ServerConfig, ServerStats};
