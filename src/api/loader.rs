//! 归档加载流水线
//!
//! 单个归档：读取 → 解码 → 排序 → 去重 → 构建更新包 → 读取集群状态 →
//! 选择分片 → 上传 → 提交。任一步失败即终止该归档，不做恢复。

use std::fs;
use std::sync::Arc;

use log::{error, info};
use rayon::prelude::*;
use serde::Serialize;

use super::config::LoaderConfig;
use super::events::{LoadEvent, LogSink, ProgressSink};
use crate::core::error::LoadError;
use crate::core::frame::{dedupe, FrameDecoder, FrameSequence};
use crate::core::index::{ClusterStatus, FeedBuilder, HttpTransport, IndexTransport, Publisher, ShardLedger};

/// 单个归档的加载结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source_id: String,
    pub shard: String,
    pub frames_decoded: usize,
    pub frames_kept: usize,
    pub documents_published: usize,
    pub id_collisions: usize,
}

pub struct HashLoader<T: IndexTransport = HttpTransport> {
    config: LoaderConfig,
    base_url: String,
    transport: T,
    decoder: FrameDecoder,
    ledger: ShardLedger,
    sink: Arc<dyn ProgressSink>,
}

impl HashLoader<HttpTransport> {
    pub fn from_config(config: LoaderConfig) -> Result<Self, LoadError> {
        let transport = HttpTransport::new(config.request_timeout)
            .map_err(|e| LoadError::Config(format!("failed to build HTTP client: {}", e)))?;
        Self::with_transport(config, transport)
    }
}

impl<T: IndexTransport> HashLoader<T> {
    pub fn with_transport(config: LoaderConfig, transport: T) -> Result<Self, LoadError> {
        config.validate()?;
        Ok(Self {
            base_url: config.base_url(),
            config,
            transport,
            decoder: FrameDecoder::new(),
            ledger: ShardLedger::new(),
            sink: Arc::new(LogSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// 加载 `<hash_path>/<relative_path>.xml.xz`，relative_path 同时作为文档 id 前缀
    pub fn load(&self, relative_path: &str) -> Result<LoadReport, LoadError> {
        let path = self.config.archive_path(relative_path);
        self.sink.emit(&LoadEvent::ArchiveOpened {
            source_id: relative_path,
            path: &path,
        });

        let archive = fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        self.load_archive(relative_path, &archive)
    }

    pub fn load_archive(&self, source_id: &str, archive: &[u8]) -> Result<LoadReport, LoadError> {
        let records = self.decoder.decode(archive)?;
        let frames_decoded = records.len();
        self.sink.emit(&LoadEvent::FramesDecoded {
            source_id,
            frames: frames_decoded,
        });

        let sequence = FrameSequence::from_unsorted(records);
        let dedup = self.config.dedup;
        let deduped = dedupe(&sequence, dedup.window_seconds, dedup.window_size);
        self.sink.emit(&LoadEvent::FramesDeduplicated {
            source_id,
            before: frames_decoded,
            after: deduped.len(),
        });

        let feed = FeedBuilder::build(source_id, &deduped);
        self.sink.emit(&LoadEvent::FeedBuilt {
            source_id,
            documents: feed.len(),
            collisions: feed.collisions(),
        });

        let status = ClusterStatus::fetch(&self.transport, &self.base_url)?;
        let reservation =
            self.ledger
                .reserve(&status.shards, &self.config.core_prefix, feed.len() as u64)?;
        let shard = reservation.shard();
        self.sink.emit(&LoadEvent::ShardSelected {
            source_id,
            shard: &shard.name,
            document_count: shard.document_count,
        });

        let receipt = Publisher::new(&self.transport, &self.base_url).publish(shard, &feed)?;
        self.sink.emit(&LoadEvent::Completed {
            source_id,
            shard: &receipt.shard,
            documents: receipt.documents,
        });

        Ok(LoadReport {
            source_id: source_id.to_string(),
            shard: receipt.shard,
            frames_decoded,
            frames_kept: deduped.len(),
            documents_published: receipt.documents,
            id_collisions: feed.collisions(),
        })
    }

    /// 并行加载多个归档，结果与输入顺序一致
    pub fn load_batch(
        &self,
        relative_paths: &[String],
    ) -> Result<Vec<(String, Result<LoadReport, LoadError>)>, LoadError> {
        let jobs = self.config.jobs.unwrap_or_else(num_cpus::get).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| LoadError::Config(format!("failed to build thread pool: {}", e)))?;
        info!("loading {} archives with {} workers", relative_paths.len(), jobs);

        let results: Vec<_> = pool.install(|| {
            relative_paths
                .par_iter()
                .map(|path| {
                    let result = self.load(path);
                    if let Err(err) = &result {
                        if err.is_partial_publish() {
                            error!("[{}] partially published: {}", path, err);
                        } else {
                            error!("[{}] failed: {}", path, err);
                        }
                    }
                    (path.clone(), result)
                })
                .collect()
        });
        Ok(results)
    }
}
