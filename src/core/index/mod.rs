//! 分片索引 - 文档构建、分片选择与发布

pub mod feed;
pub mod publisher;
pub mod shard;
pub mod transport;

pub use feed::{FeedBuilder, IndexDocument, UpdateFeed};
pub use publisher::{PublishError, PublishReceipt, PublishState, Publisher};
pub use shard::{ClusterStatus, ShardDescriptor, ShardLedger, ShardReservation};
pub use transport::{HttpTransport, IndexTransport, TransportError, TransportResponse};
