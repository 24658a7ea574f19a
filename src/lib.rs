pub mod api;
pub mod core;

pub use api::config::LoaderConfig;
pub use api::events::{LoadEvent, LogSink, NullSink, ProgressSink};
pub use api::loader::{HashLoader, LoadReport};
pub use crate::core::error::LoadError;
pub use crate::core::frame::{dedupe, DedupConfig, FrameDecoder, FrameDeduplicator, FrameRecord, FrameSequence};
pub use crate::core::index::{
    FeedBuilder, HttpTransport, IndexTransport, PublishError, Publisher, ShardDescriptor,
    ShardLedger, UpdateFeed,
};

/// 初始化日志，重复调用是安全的
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
