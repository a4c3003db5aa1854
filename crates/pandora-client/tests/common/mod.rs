// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for the client integration tests.

#![allow(dead_code)]

use pandora_client::{
    ClientConfig, DataPoints, PointEntry, PostRequest, Transport, TransportError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// In-memory transport answering from a script, then with a fixed status.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<u16, TransportError>>>,
    fallback: u16,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedTransport {
    /// Always answers 200.
    pub fn ok() -> Arc<Self> {
        Self::always(200)
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::scripted(Vec::new(), status)
    }

    pub fn scripted(script: Vec<Result<u16, TransportError>>, fallback: u16) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            bodies: Mutex::new(Vec::new()),
        })
    }

    /// Bodies of every request seen, in order.
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().len()
    }

    /// All request bodies concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.bodies.lock().concat()
    }
}

impl Transport for ScriptedTransport {
    fn post(&self, request: &PostRequest<'_>) -> Result<u16, TransportError> {
        self.bodies.lock().push(request.body.to_vec());
        self.script.lock().pop_front().unwrap_or(Ok(self.fallback))
    }
}

/// Test configuration: no backoff, 3 retries.
pub fn config() -> ClientConfig {
    ClientConfig::new("test-ak", "test-sk")
        .with_host("http://pandora.test")
        .with_retry_backoff(Duration::ZERO)
}

/// One-point batch `seq=<n>`.
pub fn seq_batch(n: i64) -> DataPoints {
    let mut entry = PointEntry::new();
    entry.append_int64("seq", n).expect("field");
    let mut data = DataPoints::new();
    data.append(&entry).expect("append");
    data
}

/// Regular files in `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read_dir")
        .map(|e| e.expect("entry").path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
