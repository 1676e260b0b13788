//! Storage infrastructure: the configuration file.
//!
//! The `config` sub-module reads the TOML file from the platform config
//! directory (or an explicit path) and falls back to defaults when it does
//! not exist yet.  The client never writes the file.

pub mod config;
