// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pandora CLI
//!
//! Send pre-formatted points to a Pandora repository.
//!
//! # Usage
//!
//! ```bash
//! # Send lines from a file, 500 points per request
//! pandora --config pandora.yaml write --repo myrepo1 --input points.txt --batch-lines 500
//!
//! # Pipe lines through a 1 MiB spill cache
//! tail -f app.log | pandora --access-key AK --secret-key SK \
//!     write --repo myrepo1 --cache-dir ./cache --cache-size 1M
//!
//! # Replay spill files left by an earlier run
//! pandora --config pandora.yaml flush-cache --repo myrepo1 --cache-dir ./cache
//!
//! # Show the headers a write would carry right now
//! pandora --access-key AK --secret-key SK sign --repo myrepo1
//!
//! # Authorize with a pre-issued repo token instead of a key pair
//! pandora --token "$PANDORA_TOKEN" write --repo myrepo1 --input points.txt
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pandora_client::auth::data_path;
use pandora_client::{CacheConfig, CachePolicy, Client, ClientConfig, Credentials, DataPoints};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

const ACCESS_KEY_VAR: &str = "PANDORA_ACCESS_KEY";
const SECRET_KEY_VAR: &str = "PANDORA_SECRET_KEY";
const TOKEN_VAR: &str = "PANDORA_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "pandora")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Write telemetry points to a Pandora pipeline repository")]
#[command(long_about = None)]
struct Cli {
    /// YAML client configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Endpoint base URL (overrides the configuration)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Access key (falls back to $PANDORA_ACCESS_KEY)
    #[arg(long, global = true)]
    access_key: Option<String>,

    /// Secret key (falls back to $PANDORA_SECRET_KEY)
    #[arg(long, global = true)]
    secret_key: Option<String>,

    /// Pre-issued repo token, used instead of the key pair
    #[arg(long, global = true, conflicts_with_all = ["access_key", "secret_key"])]
    token: Option<String>,

    /// Verbose mode (debug logs)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send pre-formatted point lines from a file or stdin
    Write {
        /// Target repository
        #[arg(short, long)]
        repo: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Points per request
        #[arg(long, default_value_t = 100)]
        batch_lines: usize,

        /// Spill cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Flush the spill file at this size (e.g., 512K, 1M)
        #[arg(long, requires = "cache_dir", conflicts_with = "cache_interval")]
        cache_size: Option<String>,

        /// Flush the spill file every N seconds
        #[arg(long, requires = "cache_dir")]
        cache_interval: Option<u64>,
    },

    /// Replay spill files left in a cache directory
    FlushCache {
        /// Target repository
        #[arg(short, long)]
        repo: String,

        /// Cache directory to scan
        #[arg(long)]
        cache_dir: PathBuf,
    },

    /// Print the Date and Authorization headers for a write issued now
    Sign {
        /// Target repository
        #[arg(short, long)]
        repo: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pandora=debug,pandora_client=debug"
    } else {
        "pandora=info,pandora_client=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = build_config(&cli)?;

    match &cli.command {
        Commands::Write {
            repo,
            input,
            batch_lines,
            cache_dir,
            cache_size,
            cache_interval,
        } => {
            apply_cache_flags(
                &mut config,
                cache_dir.as_deref(),
                cache_size.as_deref(),
                *cache_interval,
            )?;
            let client = Client::new(config).context("Failed to create client")?;

            let reader: Box<dyn BufRead> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                )),
                None => Box::new(io::stdin().lock()),
            };

            let stats = write_lines(&client, repo, reader, *batch_lines)?;
            tracing::info!(
                repo = %repo,
                points = stats.points,
                batches = stats.batches,
                failed = stats.failed,
                "Write complete"
            );
            if stats.failed > 0 {
                bail!("{} of {} batches failed", stats.failed, stats.batches);
            }
        }
        Commands::FlushCache { repo, cache_dir } => {
            let client = Client::new(config).context("Failed to create client")?;
            let replayed = client
                .write_cached(repo, cache_dir)
                .with_context(|| format!("Failed to replay {}", cache_dir.display()))?;
            tracing::info!(repo = %repo, files = replayed, "Cache flushed");
        }
        Commands::Sign { repo } => {
            let credentials = config.credentials().context("Invalid credentials")?;
            println!(
                "POST {}{}",
                config.host.trim_end_matches('/'),
                data_path(repo)
            );
            match credentials {
                Credentials::Keys(signer) => {
                    let headers = signer.sign_now(repo);
                    println!("Date: {}", headers.date);
                    println!("Authorization: {}", headers.authorization);
                }
                Credentials::Token(token) => println!("Authorization: {}", token),
            }
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match token_from(cli.token.as_deref()) {
            Some(token) => ClientConfig::from_token(token),
            None => {
                let access_key = credential(cli.access_key.as_deref(), ACCESS_KEY_VAR)?;
                let secret_key = credential(cli.secret_key.as_deref(), SECRET_KEY_VAR)?;
                ClientConfig::new(access_key, secret_key)
            }
        },
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    // A key flag switches a token config back to signing.
    if let Some(ak) = &cli.access_key {
        config.access_key = ak.clone();
        config.token = None;
    }
    if let Some(sk) = &cli.secret_key {
        config.secret_key = sk.clone();
        config.token = None;
    }
    Ok(config)
}

fn token_from(flag: Option<&str>) -> Option<String> {
    match flag {
        Some(token) => Some(token.to_string()),
        None => std::env::var(TOKEN_VAR).ok().filter(|t| !t.is_empty()),
    }
}

fn credential(flag: Option<&str>, var: &str) -> Result<String> {
    match flag {
        Some(value) => Ok(value.to_string()),
        None => std::env::var(var).with_context(|| {
            format!(
                "No credentials: pass --config, --token, the key flags or set ${}",
                var
            )
        }),
    }
}

/// Replace the configuration's cache section with the one given by flags.
fn apply_cache_flags(
    config: &mut ClientConfig,
    dir: Option<&Path>,
    size: Option<&str>,
    interval: Option<u64>,
) -> Result<()> {
    if let Some(dir) = dir {
        let policy = cache_policy(size, interval)?;
        config.cache = Some(CacheConfig::new(policy, dir));
    }
    Ok(())
}

fn cache_policy(size: Option<&str>, interval: Option<u64>) -> Result<CachePolicy> {
    match (size, interval) {
        (Some(size), _) => match parse_size(size) {
            Some(bytes) => Ok(CachePolicy::by_size(bytes)),
            None => bail!("Invalid cache size: {}", size),
        },
        (None, Some(secs)) => Ok(CachePolicy::by_time_secs(secs)),
        (None, None) => bail!("--cache-dir needs --cache-size or --cache-interval"),
    }
}

/// Parse size string like "10M", "100K", "1G".
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();

    let (num, unit) = if let Some(num) = s.strip_suffix('K') {
        (num, 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('G') {
        (num, 1024 * 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };
    num.parse::<u64>().ok()?.checked_mul(unit)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct WriteStats {
    points: usize,
    batches: usize,
    failed: usize,
}

/// Batch non-blank lines of `reader` into writes of at most `batch_lines`
/// points. A failed batch is logged and counted; reading continues.
fn write_lines<R: BufRead>(
    client: &Client,
    repo: &str,
    reader: R,
    batch_lines: usize,
) -> Result<WriteStats> {
    let batch_lines = batch_lines.max(1);
    let mut stats = WriteStats::default();
    let mut data = DataPoints::new();

    for line in reader.lines() {
        let line = line.context("Failed to read input")?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut point = Vec::with_capacity(line.len() + 1);
        point.extend_from_slice(line.as_bytes());
        point.push(b'\n');
        data.append_raw(&point)?;
        stats.points += 1;

        if stats.points % batch_lines == 0 {
            send_batch(client, repo, &mut data, &mut stats);
        }
    }
    if !data.is_empty() {
        send_batch(client, repo, &mut data, &mut stats);
    }

    Ok(stats)
}

fn send_batch(client: &Client, repo: &str, data: &mut DataPoints, stats: &mut WriteStats) {
    stats.batches += 1;
    if let Err(e) = client.write(repo, data) {
        tracing::error!(batch = stats.batches, error = %e, "Batch failed");
        stats.failed += 1;
    }
    data.clear();
}
