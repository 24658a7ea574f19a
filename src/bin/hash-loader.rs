use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use hash_loader::{init_logging, DedupConfig, HashLoader, LoaderConfig};
use log::{error, info};

/// 将帧哈希归档去重后写入索引集群
#[derive(Parser, Debug)]
#[command(name = "hash-loader", about = "Deduplicate frame hash archives and publish them to the index")]
struct Cli {
    /// Root directory holding `<relative_path>.xml.xz` archives
    #[arg(long, env = "HASH_LOADER_HASH_PATH")]
    hash_path: PathBuf,

    /// Cluster base URL, e.g. http://localhost:8983/solr/
    #[arg(long, env = "HASH_LOADER_ENDPOINT")]
    endpoint: String,

    /// Shard family name; shards are named `<core_prefix>_<n>`
    #[arg(long, env = "HASH_LOADER_CORE_PREFIX")]
    core_prefix: String,

    /// Frames closer than this (seconds) are compared
    #[arg(long, env = "HASH_LOADER_WINDOW_SECONDS", default_value_t = 2.0)]
    window_seconds: f64,

    /// Number of recently kept frames compared against
    #[arg(long, env = "HASH_LOADER_WINDOW_SIZE", default_value_t = 24)]
    window_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "HASH_LOADER_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Archives loaded in parallel (defaults to CPU count)
    #[arg(long, short = 'j', env = "HASH_LOADER_JOBS")]
    jobs: Option<usize>,

    /// Archive paths relative to --hash-path, without `.xml.xz`
    #[arg(required = true)]
    relative_paths: Vec<String>,
}

impl Cli {
    fn into_config(self) -> (LoaderConfig, Vec<String>) {
        let mut config = LoaderConfig::new(self.hash_path, self.endpoint, self.core_prefix)
            .with_dedup(DedupConfig {
                window_seconds: self.window_seconds,
                window_size: self.window_size,
            });
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.jobs = self.jobs;
        (config, self.relative_paths)
    }
}

fn main() -> ExitCode {
    init_logging();
    let (config, paths) = Cli::parse().into_config();

    let loader = match HashLoader::from_config(config) {
        Ok(loader) => loader,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let config = loader.config();
    info!(
        "publishing to {} (shards `{}_*`, window {}s / {} frames)",
        config.base_url(),
        config.core_prefix,
        config.dedup.window_seconds,
        config.dedup.window_size
    );

    let results = match loader.load_batch(&paths) {
        Ok(results) => results,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!("completed {}/{} archives", results.len() - failed, results.len());
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
