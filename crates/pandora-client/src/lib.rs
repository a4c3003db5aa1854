// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pandora Client
//!
//! Writes batches of telemetry points to a Pandora pipeline repository.
//!
//! This crate provides:
//! - Tab-separated point encoding into a growable batch buffer
//! - HMAC-SHA1 request signing, or a pre-issued repo token
//! - Direct sends with bounded retry on transient failures
//! - Optional disk spill cache, flushed by size or by time
//! - Replay of spill files left behind by earlier runs
//!
//! # Overview
//!
//! ```text
//! PointEntry --> DataPoints --> Client::write --+--> Transport (POST, retry)
//!                                               |
//!                                               +--> spill file --> replay
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pandora_client::{Client, ClientConfig, DataPoints, PointEntry};
//!
//! # fn main() -> pandora_client::Result<()> {
//! let client = Client::new(ClientConfig::new("access-key", "secret-key"))?;
//!
//! let mut entry = PointEntry::new();
//! entry.append_string("host", "web-1")?.append_int64("latency_us", 1250)?;
//!
//! let mut batch = DataPoints::new();
//! batch.append(&entry)?;
//! client.write("myrepo", &batch)?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod buffer;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod point;
pub mod retry;
pub mod transport;

pub use auth::{Credentials, SignedHeaders, Signer};
pub use buffer::{Buffer, BufferError};
pub use cache::CachePolicy;
pub use client::Client;
pub use config::{CacheConfig, ClientConfig, ConfigError};
pub use error::{Error, Result};
pub use point::{DataPoints, FieldValue, PointEntry};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, PostRequest, Transport, TransportError};
