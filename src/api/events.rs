//! 加载进度事件

use std::path::Path;

use log::info;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent<'a> {
    ArchiveOpened { source_id: &'a str, path: &'a Path },
    FramesDecoded { source_id: &'a str, frames: usize },
    FramesDeduplicated { source_id: &'a str, before: usize, after: usize },
    FeedBuilt { source_id: &'a str, documents: usize, collisions: usize },
    ShardSelected { source_id: &'a str, shard: &'a str, document_count: u64 },
    Completed { source_id: &'a str, shard: &'a str, documents: usize },
}

/// 进度输出，核心逻辑不依赖它
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &LoadEvent<'_>);
}

/// 写入 `log`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: &LoadEvent<'_>) {
        match event {
            LoadEvent::ArchiveOpened { source_id, path } => {
                info!("[{}] loading {}", source_id, path.display())
            }
            LoadEvent::FramesDecoded { source_id, frames } => {
                info!("[{}] decoded {} frames", source_id, frames)
            }
            LoadEvent::FramesDeduplicated {
                source_id,
                before,
                after,
            } => info!("[{}] kept {}/{} frames after dedup", source_id, after, before),
            LoadEvent::FeedBuilt {
                source_id,
                documents,
                collisions,
            } => {
                if *collisions > 0 {
                    log::warn!(
                        "[{}] {} document ids collided at 2-decimal precision, suffixed",
                        source_id,
                        collisions
                    );
                }
                info!("[{}] built feed with {} documents", source_id, documents)
            }
            LoadEvent::ShardSelected {
                source_id,
                shard,
                document_count,
            } => info!("[{}] uploading to {} ({} docs)", source_id, shard, document_count),
            LoadEvent::Completed {
                source_id,
                shard,
                documents,
            } => info!("[{}] committed {} documents to {}", source_id, documents, shard),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &LoadEvent<'_>) {}
}
