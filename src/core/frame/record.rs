use serde::{Deserialize, Serialize};

/// 单帧哈希记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 帧时间（秒）
    pub time: f64,
    /// cl_hi，去重依据
    pub fingerprint_primary: String,
    /// cl_ha，仅透传
    pub fingerprint_secondary: String,
}

impl FrameRecord {
    pub fn new(
        time: f64,
        fingerprint_primary: impl Into<String>,
        fingerprint_secondary: impl Into<String>,
    ) -> Self {
        Self {
            time,
            fingerprint_primary: fingerprint_primary.into(),
            fingerprint_secondary: fingerprint_secondary.into(),
        }
    }
}

/// 按时间升序排列的帧序列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSequence {
    records: Vec<FrameRecord>,
}

impl FrameSequence {
    /// 构造时强制排序（稳定排序，相同时间保持原顺序）
    pub fn from_unsorted(mut records: Vec<FrameRecord>) -> Self {
        records.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { records }
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FrameRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<FrameRecord>> for FrameSequence {
    fn from(records: Vec<FrameRecord>) -> Self {
        Self::from_unsorted(records)
    }
}
