// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the Pandora client.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::config::ConfigError;
use crate::retry::SendFailure;
use crate::transport::TransportError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the client, the cache controller and the encoders.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or malformed input (key, entry, repo, credentials).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Growing a buffer failed to allocate.
    #[error("out of memory growing buffer to {requested} bytes")]
    OutOfMemory { requested: usize },

    /// A fixed-size buffer cannot hold the write.
    #[error("buffer full: need {needed} bytes, {remaining} remaining")]
    BufferFull { needed: usize, remaining: usize },

    /// `set_cache_policy` was already called on this client.
    #[error("cache policy already initialized")]
    CachePolicyInitialized,

    /// The cache directory is missing and could not be created.
    #[error("cache directory {} unavailable: {source}", .path.display())]
    NoCacheDir { path: PathBuf, source: io::Error },

    /// A spill file could not be created.
    #[error("cannot create cache file {}: {source}", .path.display())]
    CreateCache { path: PathBuf, source: io::Error },

    /// Appending to the open spill file failed.
    #[error("cannot write cache file: {0}")]
    WriteCache(#[source] io::Error),

    /// Caching is enabled but no spill file is open.
    #[error("no cache file open")]
    CacheNotOpen,

    /// A spill file could not be opened or read for replay.
    #[error("cannot read cache file {}: {source}", .path.display())]
    ReadCache { path: PathBuf, source: io::Error },

    /// A drained spill file could not be removed.
    #[error("cannot delete cache file {}: {source}", .path.display())]
    DeleteCache { path: PathBuf, source: io::Error },

    /// Every attempt of a direct send failed with a retryable outcome.
    #[error("write failed after {attempts} attempts: {cause}")]
    WriteFailed {
        attempts: u32,
        #[source]
        cause: SendFailure,
    },

    /// The endpoint answered with a non-2xx status that is not retried.
    #[error("server responded with HTTP {0}")]
    Status(u16),

    /// A transport failure that is not retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Loading the client configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::Full { needed, remaining } => Error::BufferFull { needed, remaining },
            BufferError::OutOfMemory { requested } => Error::OutOfMemory { requested },
        }
    }
}

impl Error {
    /// HTTP status carried by this error, if the endpoint produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status(code) => Some(*code),
            Error::WriteFailed {
                cause: SendFailure::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}
