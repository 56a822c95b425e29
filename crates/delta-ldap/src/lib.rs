//! # delta-ldap
//!
//! The ldap3-backed [`DirectoryClient`] implementation for Delta Sync:
//! endpoint configuration, connection pooling, cookie-based paged
//! searches and failure classification.
//!
//! [`DirectoryClient`]: delta_core::DirectoryClient

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
mod connection;
pub mod error;

pub use client::LdapDirectory;
pub use config::EndpointConfig;
pub use error::LdapError;
