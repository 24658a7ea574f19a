use log::{info, warn};
use thiserror::Error;

use super::feed::{UpdateFeed, COMMIT_BODY};
use super::shard::ShardDescriptor;
use super::transport::{IndexTransport, TransportError, TransportResponse};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("upload to shard {shard} failed: {reason}")]
    UploadFailed { shard: String, reason: String },
    /// 文档已上传但提交失败，索引中留有未提交数据
    #[error("commit on shard {shard} failed after uploading {documents} documents: {reason}")]
    CommitFailed {
        shard: String,
        documents: usize,
        reason: String,
    },
}

impl PublishError {
    pub fn is_partial(&self) -> bool {
        matches!(self, PublishError::CommitFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Uploading,
    Uploaded,
    UploadFailed,
    Committing,
    Committed,
    CommitFailed,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishState::Committed | PublishState::UploadFailed | PublishState::CommitFailed
        )
    }

    /// 根据当前步骤的结果推进状态
    fn transition(self, ok: bool) -> PublishState {
        match (self, ok) {
            (PublishState::Idle, _) => PublishState::Uploading,
            (PublishState::Uploading, true) => PublishState::Uploaded,
            (PublishState::Uploading, false) => PublishState::UploadFailed,
            (PublishState::Uploaded, _) => PublishState::Committing,
            (PublishState::Committing, true) => PublishState::Committed,
            (PublishState::Committing, false) => PublishState::CommitFailed,
            (terminal, _) => terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub shard: String,
    pub documents: usize,
}

/// 上传 + 提交，单次使用，不重试
pub struct Publisher<'a> {
    transport: &'a dyn IndexTransport,
    endpoint: &'a str,
    state: PublishState,
}

impl<'a> Publisher<'a> {
    pub fn new(transport: &'a dyn IndexTransport, endpoint: &'a str) -> Self {
        Self {
            transport,
            endpoint,
            state: PublishState::Idle,
        }
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    pub fn update_url(endpoint: &str, shard: &str) -> String {
        format!("{}{}/update?wt=json", endpoint, shard)
    }

    pub fn publish(
        &mut self,
        shard: &ShardDescriptor,
        feed: &UpdateFeed,
    ) -> Result<PublishReceipt, PublishError> {
        let url = Self::update_url(self.endpoint, &shard.name);

        self.state = self.state.transition(true);
        let uploaded = check(self.transport.post_xml(&url, &feed.to_xml()));
        self.state = self.state.transition(uploaded.is_ok());
        if let Err(reason) = uploaded {
            warn!("upload to {} failed: {}", shard.name, reason);
            return Err(PublishError::UploadFailed {
                shard: shard.name.clone(),
                reason,
            });
        }
        info!("uploaded {} documents to {}", feed.len(), shard.name);

        self.state = self.state.transition(true);
        let committed = check(self.transport.post_xml(&url, COMMIT_BODY));
        self.state = self.state.transition(committed.is_ok());
        if let Err(reason) = committed {
            warn!("commit on {} failed, documents left uncommitted: {}", shard.name, reason);
            return Err(PublishError::CommitFailed {
                shard: shard.name.clone(),
                documents: feed.len(),
                reason,
            });
        }

        Ok(PublishReceipt {
            shard: shard.name.clone(),
            documents: feed.len(),
        })
    }
}

/// 空响应体与非 2xx 都算失败
fn check(response: Result<TransportResponse, TransportError>) -> Result<(), String> {
    match response {
        Ok(resp) if resp.is_success() => Ok(()),
        Ok(resp) if resp.body.trim().is_empty() => Err(format!("empty response (status {})", resp.status)),
        Ok(resp) => Err(format!("status {}: {}", resp.status, resp.body.trim())),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FrameRecord;
    use crate::core::index::feed::FeedBuilder;
    use crate::core::index::transport::tests::FakeTransport;

    const ENDPOINT: &str = "http://solr:8983/solr/";

    fn feed() -> UpdateFeed {
        FeedBuilder::build("rec", &[FrameRecord::new(0.0, "A", "x"), FrameRecord::new(3.0, "A", "z")])
    }

    #[test]
    fn test_upload_then_commit() {
        let fake = FakeTransport::default();
        let mut publisher = Publisher::new(&fake, ENDPOINT);

        let receipt = publisher.publish(&ShardDescriptor::new("video_1", 5), &feed()).unwrap();
        assert_eq!(receipt, PublishReceipt { shard: "video_1".into(), documents: 2 });
        assert_eq!(publisher.state(), PublishState::Committed);

        let requests = fake.recorded();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1, "http://solr:8983/solr/video_1/update?wt=json");
        assert!(requests[0].2.starts_with("<add>"));
        assert_eq!(requests[1].1, requests[0].1);
        assert_eq!(requests[1].2, "<commit/>");
    }

    #[test]
    fn test_empty_upload_response_fails_before_commit() {
        let fake = FakeTransport::default();
        fake.push_post(TransportResponse::new(200, ""));
        let mut publisher = Publisher::new(&fake, ENDPOINT);

        let err = publisher.publish(&ShardDescriptor::new("video_1", 5), &feed()).unwrap_err();
        assert!(matches!(err, PublishError::UploadFailed { .. }));
        assert!(!err.is_partial());
        assert_eq!(publisher.state(), PublishState::UploadFailed);
        assert_eq!(fake.recorded().len(), 1);
    }

    #[test]
    fn test_transport_error_on_upload() {
        let fake = FakeTransport::default();
        fake.push_post_failure();
        let mut publisher = Publisher::new(&fake, ENDPOINT);

        match publisher.publish(&ShardDescriptor::new("video_0", 0), &feed()) {
            Err(PublishError::UploadFailed { shard, reason }) => {
                assert_eq!(shard, "video_0");
                assert!(reason.contains("HTTP"));
            }
            other => panic!("expected upload failure, got {:?}", other),
        }
    }

    #[test]
    fn test_commit_failure_is_partial() {
        let fake = FakeTransport::default();
        fake.push_post(TransportResponse::new(200, "{}"));
        fake.push_post(TransportResponse::new(503, "busy"));
        let mut publisher = Publisher::new(&fake, ENDPOINT);

        let err = publisher.publish(&ShardDescriptor::new("video_1", 5), &feed()).unwrap_err();
        assert!(err.is_partial());
        assert_eq!(publisher.state(), PublishState::CommitFailed);
        match err {
            PublishError::CommitFailed { documents, reason, .. } => {
                assert_eq!(documents, 2);
                assert!(reason.contains("503"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(PublishState::Idle.transition(true), PublishState::Uploading);
        assert_eq!(PublishState::Uploading.transition(false), PublishState::UploadFailed);
        assert_eq!(PublishState::Uploaded.transition(true), PublishState::Committing);
        assert_eq!(PublishState::Committing.transition(true), PublishState::Committed);
        assert_eq!(PublishState::CommitFailed.transition(true), PublishState::CommitFailed);
        assert!(PublishState::Committed.is_terminal());
        assert!(!PublishState::Uploaded.is_terminal());
    }
}
