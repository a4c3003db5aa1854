// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local spill cache.
//!
//! When caching is enabled, batches are appended to a spill file in the cache
//! directory instead of being sent right away. Once the policy trigger fires
//! the spill file is rotated: a fresh file becomes current and the old one is
//! replayed to the endpoint in bounded chunks, then deleted.
//!
//! Spill files are named `cache.<MMDDHHMMSS>` (UTC). A name that already
//! exists gets a counter suffix: `cache.1015083000.1`, `.2`, ...
//!
//! Files whose replay fails stay on disk and are picked up by a later
//! directory scan, so a batch may be delivered more than once but is never
//! dropped.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Prefix of every spill file name.
pub const CACHE_FILE_PREFIX: &str = "cache.";

/// Default upper bound of one replayed request body.
pub const DEFAULT_REPLAY_CHUNK_BYTES: usize = 2 * 1024 * 1024;

/// When buffered batches are flushed to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// No caching; every write is sent directly.
    #[default]
    None,

    /// Flush once the spill file plus the incoming batch reaches this many bytes.
    BySize(u64),

    /// Flush once this much time has passed since the last flush.
    ByTime(Duration),
}

impl CachePolicy {
    pub fn by_size(bytes: u64) -> Self {
        CachePolicy::BySize(bytes)
    }

    pub fn by_time_secs(secs: u64) -> Self {
        CachePolicy::ByTime(Duration::from_secs(secs))
    }

    /// True for policies that keep a spill file.
    pub fn is_caching(&self) -> bool {
        !matches!(self, CachePolicy::None)
    }
}

/// Spill file being appended to.
#[derive(Debug)]
struct SpillFile {
    path: PathBuf,
    file: File,
    size: u64,
}

/// Demoted spill file waiting to be replayed.
#[derive(Debug)]
struct DrainFile {
    path: PathBuf,
    reader: BufReader<File>,
}

/// Cache state of one client.
///
/// Not synchronized; the owning client serializes access.
#[derive(Debug)]
pub struct CacheControl {
    policy: CachePolicy,
    initialized: bool,
    dir: Option<PathBuf>,
    current: Option<SpillFile>,
    previous: Option<DrainFile>,
    window_start: Instant,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheControl {
    pub fn new() -> Self {
        Self {
            policy: CachePolicy::None,
            initialized: false,
            dir: None,
            current: None,
            previous: None,
            window_start: Instant::now(),
        }
    }

    /// Select the policy and cache directory. Allowed once.
    ///
    /// Caching policies create `dir` (with parents) if needed and open the
    /// first spill file.
    pub fn set_policy(&mut self, policy: CachePolicy, dir: &Path) -> Result<()> {
        if self.initialized {
            return Err(Error::CachePolicyInitialized);
        }

        if policy.is_caching() {
            fs::create_dir_all(dir).map_err(|source| Error::NoCacheDir {
                path: dir.to_path_buf(),
                source,
            })?;
            self.dir = Some(dir.to_path_buf());
            self.current = Some(self.open_spill()?);
            self.window_start = Instant::now();
        }

        self.policy = policy;
        self.initialized = true;
        tracing::info!(?policy, dir = %dir.display(), "cache policy set");
        Ok(())
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the next batch of `pending` bytes should trigger a flush.
    ///
    /// For [`CachePolicy::ByTime`] a `true` answer starts a new window.
    pub fn needs_flush(&mut self, pending: u64) -> bool {
        match self.policy {
            CachePolicy::None => false,
            CachePolicy::BySize(threshold) => {
                self.current_size().saturating_add(pending) >= threshold
            }
            CachePolicy::ByTime(period) => {
                if self.window_start.elapsed() >= period {
                    self.window_start = Instant::now();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Demote the current spill file for replay and open a new one.
    pub fn rotate(&mut self) -> Result<()> {
        if let Some(stale) = self.previous.take() {
            tracing::warn!(
                path = %stale.path.display(),
                "undrained cache file released, left for a later scan"
            );
        }

        if let Some(mut spill) = self.current.take() {
            let demote = spill
                .file
                .flush()
                .and_then(|()| spill.file.seek(SeekFrom::Start(0)));
            if let Err(source) = demote {
                tracing::warn!(
                    path = %spill.path.display(),
                    error = %source,
                    "cache file not demoted, left for a later scan"
                );
                return Err(Error::WriteCache(source));
            }
            tracing::debug!(path = %spill.path.display(), bytes = spill.size, "cache file demoted");
            self.previous = Some(DrainFile {
                path: spill.path,
                reader: BufReader::new(spill.file),
            });
        }

        match self.open_spill() {
            Ok(spill) => {
                self.current = Some(spill);
                Ok(())
            }
            Err(e) => {
                // Nothing will drain it now; let a directory scan pick it up.
                if let Some(demoted) = self.previous.take() {
                    tracing::warn!(
                        path = %demoted.path.display(),
                        "no new cache file, demoted file left for a later scan"
                    );
                }
                Err(e)
            }
        }
    }

    fn open_spill(&self) -> Result<SpillFile> {
        let dir = self.dir.as_deref().ok_or(Error::CacheNotOpen)?;
        let stem = format!("{}{}", CACHE_FILE_PREFIX, Utc::now().format("%m%d%H%M%S"));

        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                stem.clone()
            } else {
                format!("{}.{}", stem, suffix)
            };
            let path = dir.join(name);

            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), "cache file opened");
                    return Ok(SpillFile {
                        path,
                        file,
                        size: 0,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(source) => return Err(Error::CreateCache { path, source }),
            }
        }
    }

    /// Append a batch to the current spill file.
    ///
    /// If a previous rotation failed to open a new file, one is opened here.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.current.is_none() {
            self.current = Some(self.open_spill()?);
        }
        let spill = self.current.as_mut().ok_or(Error::CacheNotOpen)?;
        spill.file.write_all(bytes).map_err(Error::WriteCache)?;
        spill.size += bytes.len() as u64;
        Ok(())
    }

    /// Replay the demoted spill file through `send`, then delete it.
    ///
    /// Returns the number of bytes replayed. When `send` fails the file is
    /// closed and left on disk.
    pub fn drain_and_delete<F>(&mut self, chunk_bytes: usize, send: F) -> Result<usize>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let Some(DrainFile { path, mut reader }) = self.previous.take() else {
            return Ok(0);
        };

        let replayed = match replay(&mut reader, &path, chunk_bytes, send) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache replay failed, file kept");
                return Err(e);
            }
        };
        drop(reader);

        fs::remove_file(&path).map_err(|source| Error::DeleteCache {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = replayed, "cache file flushed");
        Ok(replayed)
    }

    /// Current and in-drain spill files.
    pub fn live_paths(&self) -> Vec<&Path> {
        self.current
            .as_ref()
            .map(|s| s.path.as_path())
            .into_iter()
            .chain(self.previous.as_ref().map(|d| d.path.as_path()))
            .collect()
    }

    /// Whether `path` is one of [`Self::live_paths`].
    pub fn is_live(&self, path: &Path) -> bool {
        let candidate = normalize(path);
        self.live_paths()
            .into_iter()
            .any(|live| normalize(live) == candidate)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|s| s.path.as_path())
    }

    /// Bytes appended to the current spill file.
    pub fn current_size(&self) -> u64 {
        self.current.as_ref().map_or(0, |s| s.size)
    }

    pub fn previous_path(&self) -> Option<&Path> {
        self.previous.as_ref().map(|d| d.path.as_path())
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Send the lines of `reader` in chunks of at most `chunk_bytes`.
///
/// A single line longer than `chunk_bytes` is sent on its own. Blank lines
/// are skipped and a missing final newline is added. Returns the number of
/// bytes sent.
pub(crate) fn replay<R, F>(reader: &mut R, path: &Path, chunk_bytes: usize, mut send: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(&[u8]) -> Result<()>,
{
    let read_error = |source: io::Error| Error::ReadCache {
        path: path.to_path_buf(),
        source,
    };

    let mut chunk = Vec::with_capacity(chunk_bytes.min(64 * 1024));
    let mut line = Vec::new();
    let mut sent = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(read_error)? == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }

        if !chunk.is_empty() && chunk.len() + line.len() > chunk_bytes {
            send(&chunk)?;
            sent += chunk.len();
            chunk.clear();
        }
        chunk.extend_from_slice(&line);
    }

    if !chunk.is_empty() {
        send(&chunk)?;
        sent += chunk.len();
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect_chunks(input: &[u8], chunk_bytes: usize) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        replay(&mut Cursor::new(input), Path::new("mem"), chunk_bytes, |c| {
            chunks.push(c.to_vec());
            Ok(())
        })
        .expect("replay");
        chunks
    }

    #[test]
    fn test_policy_helpers() {
        assert!(!CachePolicy::None.is_caching());
        assert!(CachePolicy::by_size(10).is_caching());
        assert_eq!(
            CachePolicy::by_time_secs(5),
            CachePolicy::ByTime(Duration::from_secs(5))
        );
        assert_eq!(CachePolicy::default(), CachePolicy::None);
    }

    #[test]
    fn test_set_policy_is_one_shot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), dir.path())
            .expect("first");
        assert!(cache.is_initialized());
        assert!(matches!(
            cache.set_policy(CachePolicy::None, dir.path()),
            Err(Error::CachePolicyInitialized)
        ));
    }

    #[test]
    fn test_set_policy_creates_directory_and_first_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("a").join("b");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), &dir)
            .expect("set");

        let current = cache.current_path().expect("current").to_path_buf();
        assert!(current.exists());
        assert_eq!(current.parent(), Some(dir.as_path()));
        let name = current.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with(CACHE_FILE_PREFIX));
        assert_eq!(name.len(), CACHE_FILE_PREFIX.len() + 10);
    }

    #[test]
    fn test_set_policy_fails_when_dir_is_a_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let blocker = root.path().join("blocker");
        fs::write(&blocker, b"x").expect("write");

        let mut cache = CacheControl::new();
        let err = cache
            .set_policy(CachePolicy::by_size(10), &blocker.join("cache"))
            .unwrap_err();
        assert!(matches!(err, Error::NoCacheDir { .. }));
        assert!(!cache.is_initialized());
    }

    #[test]
    fn test_none_policy_has_no_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache.set_policy(CachePolicy::None, dir.path()).expect("set");

        assert!(cache.current_path().is_none());
        assert!(!cache.needs_flush(u64::MAX));
        assert!(matches!(cache.append(b"a=1\n"), Err(Error::CacheNotOpen)));
    }

    #[test]
    fn test_needs_flush_by_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(10), dir.path())
            .expect("set");

        assert!(!cache.needs_flush(9));
        cache.append(b"abcdef").expect("append");
        assert_eq!(cache.current_size(), 6);
        assert!(!cache.needs_flush(3));
        assert!(cache.needs_flush(4));
    }

    #[test]
    fn test_needs_flush_by_time() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut always = CacheControl::new();
        always
            .set_policy(CachePolicy::by_time_secs(0), dir.path())
            .expect("set");
        assert!(always.needs_flush(1));
        assert!(always.needs_flush(1));

        let other = tempfile::tempdir().expect("tempdir");
        let mut never = CacheControl::new();
        never
            .set_policy(CachePolicy::by_time_secs(24 * 3600), other.path())
            .expect("set");
        assert!(!never.needs_flush(u64::MAX));
    }

    #[test]
    fn test_rotate_produces_distinct_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), dir.path())
            .expect("set");

        let first = cache.current_path().expect("current").to_path_buf();
        cache.append(b"a=1\n").expect("append");
        cache.rotate().expect("rotate");

        let second = cache.current_path().expect("current").to_path_buf();
        assert_ne!(first, second);
        assert_eq!(cache.previous_path(), Some(first.as_path()));
        assert_eq!(cache.current_size(), 0);
        assert!(cache.is_live(&first));
        assert!(cache.is_live(&second));
        assert_eq!(cache.live_paths().len(), 2);
    }

    #[test]
    fn test_failed_rotation_releases_demoted_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("spill");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), &dir)
            .expect("set");
        cache.append(b"a=1\n").expect("append");

        // The open file survives the unlink, the directory does not.
        let first = cache.current_path().expect("current").to_path_buf();
        fs::remove_file(&first).expect("unlink");
        fs::remove_dir(&dir).expect("rmdir");

        let err = cache.rotate().unwrap_err();
        assert!(matches!(err, Error::CreateCache { .. }), "{}", err);
        assert!(cache.previous_path().is_none());
        assert!(cache.current_path().is_none());
        assert!(cache.live_paths().is_empty());
        assert!(!cache.is_live(&first));
    }

    #[test]
    fn test_drain_and_delete_replays_then_removes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), dir.path())
            .expect("set");
        cache.append(b"a=1\n").expect("append");
        cache.append(b"a=2\n").expect("append");
        cache.rotate().expect("rotate");
        let old = cache.previous_path().expect("previous").to_path_buf();

        let mut bodies = Vec::new();
        let n = cache
            .drain_and_delete(DEFAULT_REPLAY_CHUNK_BYTES, |body| {
                bodies.push(body.to_vec());
                Ok(())
            })
            .expect("drain");

        assert_eq!(n, 8);
        assert_eq!(bodies, vec![b"a=1\na=2\n".to_vec()]);
        assert!(!old.exists());
        assert!(cache.previous_path().is_none());
    }

    #[test]
    fn test_failed_drain_keeps_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = CacheControl::new();
        cache
            .set_policy(CachePolicy::by_size(100), dir.path())
            .expect("set");
        cache.append(b"a=1\n").expect("append");
        cache.rotate().expect("rotate");
        let old = cache.previous_path().expect("previous").to_path_buf();

        let err = cache
            .drain_and_delete(1024, |_| Err(Error::Status(503)))
            .unwrap_err();
        assert!(matches!(err, Error::Status(503)));
        assert!(old.exists());
        assert!(!cache.is_live(&old));
        assert_eq!(fs::read(&old).expect("read"), b"a=1\n");
    }

    #[test]
    fn test_drain_without_previous_is_noop() {
        let mut cache = CacheControl::new();
        let n = cache
            .drain_and_delete(1024, |_| panic!("nothing to send"))
            .expect("drain");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_replay_chunks_on_line_boundaries() {
        let chunks = collect_chunks(b"aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec![b"aaaa\nbbbb\n".to_vec(), b"cccc\n".to_vec()]);
    }

    #[test]
    fn test_replay_oversized_line_goes_alone() {
        let chunks = collect_chunks(b"a\nbbbbbbbbbbbb\nc\n", 4);
        assert_eq!(
            chunks,
            vec![b"a\n".to_vec(), b"bbbbbbbbbbbb\n".to_vec(), b"c\n".to_vec()]
        );
    }

    #[test]
    fn test_replay_skips_blank_lines_and_terminates_last() {
        let chunks = collect_chunks(b"a=1\n\n  \na=2", 1024);
        assert_eq!(chunks, vec![b"a=1\na=2\n".to_vec()]);
    }

    #[test]
    fn test_replay_empty_input_sends_nothing() {
        assert!(collect_chunks(b"", 1024).is_empty());
        assert!(collect_chunks(b"\n\n", 1024).is_empty());
    }
}
