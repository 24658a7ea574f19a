use super::record::{FrameRecord, FrameSequence};
use crate::core::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 时间窗口去重参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// 比较窗口（秒），只和时间差严格小于该值的帧比较
    pub window_seconds: f64,
    /// 最近保留帧的缓冲容量
    pub window_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            window_size: 24,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), LoadError> {
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(LoadError::Config(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if self.window_size == 0 {
            return Err(LoadError::Config("window_size must be positive".into()));
        }
        Ok(())
    }
}

/// 去重决策结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DedupDecision {
    /// 窗口内没有相同指纹，保留
    Unique,
    /// 与 `of_time` 处保留的帧指纹相同，丢弃
    Duplicate { of_time: f64 },
}

impl DedupDecision {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupDecision::Duplicate { .. })
    }
}

/// 时序去重器 - 单遍贪心
/// 只和最近保留的 `window_size` 帧中时间差小于 `window_seconds` 的帧比较 cl_hi
pub struct FrameDeduplicator {
    /// 最近保留帧（时间, cl_hi）
    history: VecDeque<(f64, String)>,
    config: DedupConfig,
}

impl FrameDeduplicator {
    pub fn new() -> Self {
        Self::with_config(DedupConfig::default())
    }

    pub fn with_config(config: DedupConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.window_size.max(1)),
            config,
        }
    }

    /// 判断当前帧是否重复，非重复帧会进入历史缓冲
    /// 调用方需保证按时间升序传入
    pub fn check(&mut self, record: &FrameRecord) -> DedupDecision {
        let duplicate_of = self
            .history
            .iter()
            .filter(|(time, _)| record.time - time < self.config.window_seconds)
            .find(|(_, hash)| *hash == record.fingerprint_primary)
            .map(|(time, _)| *time);

        match duplicate_of {
            Some(of_time) => DedupDecision::Duplicate { of_time },
            None => {
                self.add_keyframe(record);
                DedupDecision::Unique
            }
        }
    }

    fn add_keyframe(&mut self, record: &FrameRecord) {
        self.history
            .push_back((record.time, record.fingerprint_primary.clone()));
        if self.history.len() > self.config.window_size {
            self.history.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for FrameDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

/// 对已排序序列去重，返回保留帧（保持原顺序，内容不变）
pub fn dedupe(sequence: &FrameSequence, window_seconds: f64, window_size: usize) -> Vec<FrameRecord> {
    let mut dedup = FrameDeduplicator::with_config(DedupConfig {
        window_seconds,
        window_size,
    });

    sequence
        .records()
        .iter()
        .filter(|record| !dedup.check(record).is_duplicate())
        .cloned()
        .collect()
}
