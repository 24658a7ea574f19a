//! 帧哈希记录 - 解码、排序与时间窗口去重
//!
//! 归档解压后得到 XML 记录列表，按时间排序后只保留
//! 时间窗口内首次出现的指纹。

pub mod decoder;
pub mod deduplicator;
pub mod record;

pub use decoder::FrameDecoder;
pub use deduplicator::{dedupe, DedupConfig, DedupDecision, FrameDeduplicator};
pub use record::{FrameRecord, FrameSequence};
