// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write orchestration.
//!
//! Every [`Client::write`] takes the client lock, picks a [`Route`] from the
//! cache state and the pending batch, then acts on it:
//!
//! | Route   | Action                                                   |
//! |---------|----------------------------------------------------------|
//! | `Send`  | POST the batch with retry                                |
//! | `Cache` | append the batch to the current spill file               |
//! | `Flush` | rotate, persist the batch in the new file, replay the old |
//!
//! The lock is held across network attempts, so concurrent writers on one
//! client are serialized for the full retry budget of a send.

use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::auth::{data_path, Credentials};
use crate::cache::{replay, CacheControl, CachePolicy};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::point::DataPoints;
use crate::retry::{send_with_retry, RetryPolicy};
use crate::transport::{HttpTransport, PostRequest, Transport};

/// What a write does with its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Send,
    Cache,
    Flush,
}

/// Pick the route for a batch of `pending` bytes.
pub fn route(cache: &mut CacheControl, pending: u64) -> Route {
    if !cache.policy().is_caching() {
        Route::Send
    } else if cache.needs_flush(pending) {
        Route::Flush
    } else {
        Route::Cache
    }
}

/// Pandora data client.
///
/// Share across threads with `Arc<Client>`.
pub struct Client {
    host: String,
    replay_chunk_bytes: usize,
    credentials: Credentials,
    retry: RetryPolicy,
    transport: Box<dyn Transport>,
    cache: Mutex<CacheControl>,
}

impl Client {
    /// Client over HTTP. Applies `config.cache` when present.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout(), &config.user_agent)?;
        Self::with_transport(config, transport)
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Result<Self> {
        let credentials = config.credentials()?;
        let client = Self {
            host: config.host.trim_end_matches('/').to_string(),
            replay_chunk_bytes: config.replay_chunk_bytes,
            credentials,
            retry: config.retry_policy(),
            transport: Box::new(transport),
            cache: Mutex::new(CacheControl::new()),
        };

        if let Some(cache) = &config.cache {
            client.set_cache_policy(cache.policy(), &cache.dir)?;
        }

        tracing::debug!(
            host = %client.host,
            token = client.credentials.is_token(),
            max_retries = client.retry.max_retries,
            "client created"
        );
        Ok(client)
    }

    /// Enable caching. May be called once per client.
    pub fn set_cache_policy(&self, policy: CachePolicy, dir: impl AsRef<Path>) -> Result<()> {
        self.cache.lock().set_policy(policy, dir.as_ref())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache.lock().policy()
    }

    /// Path of the spill file currently being appended to.
    pub fn current_cache_file(&self) -> Option<PathBuf> {
        self.cache.lock().current_path().map(Path::to_path_buf)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Write a batch to `repo`, directly or through the spill cache.
    ///
    /// An empty batch succeeds without doing anything.
    pub fn write(&self, repo: &str, points: &DataPoints) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        validate_repo(repo)?;

        let body = points.as_bytes();
        let mut cache = self.cache.lock();
        match route(&mut cache, body.len() as u64) {
            Route::Send => self.send(repo, body),
            Route::Cache => {
                cache.append(body)?;
                tracing::trace!(repo, bytes = body.len(), "batch cached");
                Ok(())
            }
            Route::Flush => self.flush(&mut cache, repo, body),
        }
    }

    fn flush(&self, cache: &mut CacheControl, repo: &str, body: &[u8]) -> Result<()> {
        cache.rotate()?;
        let appended = cache.append(body);
        let drained = cache.drain_and_delete(self.replay_chunk_bytes, |chunk| self.send(repo, chunk));
        appended?;
        drained.map(|_| ())
    }

    fn send(&self, repo: &str, body: &[u8]) -> Result<()> {
        let url = format!("{}{}", self.host, data_path(repo));
        send_with_retry(&self.retry, |attempt| {
            tracing::debug!(repo, attempt, bytes = body.len(), "posting batch");
            let request = PostRequest::authorized(&url, &self.credentials, repo, body);
            self.transport.post(&request)
        })
    }

    /// Replay every leftover file in `dir` to `repo` and delete it.
    ///
    /// Subdirectories and this client's own live spill files are skipped.
    /// Files are replayed in name order. Returns the number of files sent.
    pub fn write_cached(&self, repo: &str, dir: impl AsRef<Path>) -> Result<usize> {
        validate_repo(repo)?;
        let dir = dir.as_ref();
        let cache = self.cache.lock();

        let entries = fs::read_dir(dir).map_err(|source| Error::NoCacheDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::ReadCache {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if cache.is_live(&path) {
                tracing::debug!(path = %path.display(), "skipping live cache file");
                continue;
            }
            files.push(path);
        }
        files.sort();

        let mut replayed = 0;
        for path in files {
            let file = File::open(&path).map_err(|source| Error::ReadCache {
                path: path.clone(),
                source,
            })?;
            let mut reader = BufReader::new(file);
            let bytes = replay(&mut reader, &path, self.replay_chunk_bytes, |chunk| {
                self.send(repo, chunk)
            })?;
            drop(reader);

            fs::remove_file(&path).map_err(|source| Error::DeleteCache {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), bytes, "cached file replayed");
            replayed += 1;
        }

        Ok(replayed)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn validate_repo(repo: &str) -> Result<()> {
    if repo.is_empty() {
        return Err(Error::InvalidArgument("repo name is empty".to_string()));
    }
    if repo.contains(&['/', '?', '#'][..]) || repo.chars().any(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!(
            "repo name '{}' is not a valid path segment",
            repo.escape_debug()
        )));
    }
    Ok(())
}
