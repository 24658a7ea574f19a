use std::path::PathBuf;

use thiserror::Error;

use crate::core::index::PublishError;

/// 单个归档处理过程中的错误，全部视为致命错误，不重试
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("archive decode failed: {0}")]
    Decode(String),
    #[error("frame record parse failed: {0}")]
    Parse(String),
    #[error("no shard matches prefix `{0}_`")]
    NoMatchingShard(String),
    #[error("cluster status request failed: {0}")]
    ClusterStatus(String),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoadError {
    /// 文档已上传但未提交
    pub fn is_partial_publish(&self) -> bool {
        matches!(self, LoadError::Publish(err) if err.is_partial())
    }
}

impl From<quick_xml::Error> for LoadError {
    fn from(err: quick_xml::Error) -> Self {
        LoadError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_publish_only_for_commit_failure() {
        let upload = LoadError::from(PublishError::UploadFailed {
            shard: "video_0".into(),
            reason: "status 500".into(),
        });
        let commit = LoadError::from(PublishError::CommitFailed {
            shard: "video_0".into(),
            documents: 3,
            reason: "empty response".into(),
        });

        assert!(!upload.is_partial_publish());
        assert!(commit.is_partial_publish());
        assert!(!LoadError::NoMatchingShard("video".into()).is_partial_publish());
    }

    #[test]
    fn test_no_matching_shard_message() {
        let err = LoadError::NoMatchingShard("video".into());
        assert_eq!(err.to_string(), "no shard matches prefix `video_`");
    }
}
