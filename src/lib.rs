//! mediadrop - drop-folder video ingest and streaming server
//!
//! This library crate exposes the core functionality for integration testing.

pub mod catalog;
pub mod config;
pub mod ingest;
pub mod probe;
pub mod server;
pub mod streaming;
pub mod tools;
pub mod transcode;
pub mod watch;
