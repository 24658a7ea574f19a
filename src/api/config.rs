use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::LoadError;
use crate::core::frame::DedupConfig;

/// 加载器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// 哈希归档根目录
    pub hash_path: PathBuf,
    /// 集群地址，例如 `http://localhost:8983/solr/`
    pub endpoint: String,
    /// 分片族名，匹配 `<core_prefix>_*`
    pub core_prefix: String,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
    /// 批量加载的并行度，None 时使用 CPU 核数
    #[serde(default)]
    pub jobs: Option<usize>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl LoaderConfig {
    pub fn new(
        hash_path: impl Into<PathBuf>,
        endpoint: impl Into<String>,
        core_prefix: impl Into<String>,
    ) -> Self {
        Self {
            hash_path: hash_path.into(),
            endpoint: endpoint.into(),
            core_prefix: core_prefix.into(),
            dedup: DedupConfig::default(),
            request_timeout: default_timeout(),
            jobs: None,
        }
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(LoadError::Config(format!(
                "endpoint must be an http(s) URL, got `{}`",
                self.endpoint
            )));
        }
        if self.core_prefix.trim().is_empty() {
            return Err(LoadError::Config("core_prefix is empty".into()));
        }
        if self.jobs == Some(0) {
            return Err(LoadError::Config("jobs must be at least 1".into()));
        }
        self.dedup.validate()
    }

    /// 以 `/` 结尾的集群地址，后面直接拼接路径
    pub fn base_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        format!("{}/", trimmed)
    }

    /// `<hash_path>/<relative_path>.xml.xz`
    pub fn archive_path(&self, relative_path: &str) -> PathBuf {
        let mut file = self.hash_path.join(relative_path).into_os_string();
        file.push(".xml.xz");
        PathBuf::from(file)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
