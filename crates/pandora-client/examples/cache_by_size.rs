// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Write points through a size-based spill cache.
// Run with: PANDORA_AK=... PANDORA_SK=... cargo run --example cache_by_size

use pandora_client::{CachePolicy, Client, ClientConfig, DataPoints, PointEntry};

const REPO: &str = "myrepo1";
const CACHE_DIR: &str = "./cache";

fn main() -> pandora_client::Result<()> {
    let access_key = std::env::var("PANDORA_AK").unwrap_or_else(|_| "<access key>".to_string());
    let secret_key = std::env::var("PANDORA_SK").unwrap_or_else(|_| "<secret key>".to_string());

    let client = Client::new(ClientConfig::new(access_key, secret_key).with_fail_retry(3))?;

    // Flush the spill file to the repo once it reaches 1 MiB.
    client.set_cache_policy(CachePolicy::by_size(1024 * 1024), CACHE_DIR)?;

    // Send whatever an earlier run left behind.
    let replayed = client.write_cached(REPO, CACHE_DIR)?;
    println!("replayed {} cached file(s)", replayed);

    let mut data = DataPoints::new();
    let mut entry = PointEntry::new();
    for i in 0..100_000 {
        entry.append_string("f1", "abc")?.append_int32("f2", 123)?;
        data.append(&entry)?;
        entry.clear();

        entry.append_string("f1", "xyz")?.append_int32("f2", 456)?;
        data.append(&entry)?;
        entry.clear();

        if let Err(e) = client.write(REPO, &data) {
            eprintln!("write {} failed: {}", i, e);
        }
        data.clear();
    }

    Ok(())
}
