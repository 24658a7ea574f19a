use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};

use super::transport::IndexTransport;
use crate::core::error::LoadError;

/// 集群状态中的一个分片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub name: String,
    pub document_count: u64,
}

impl ShardDescriptor {
    pub fn new(name: impl Into<String>, document_count: u64) -> Self {
        Self {
            name: name.into(),
            document_count,
        }
    }
}

/// `admin/cores?wt=json` 的响应
#[derive(Debug, Deserialize)]
struct CoreAdminResponse {
    status: BTreeMap<String, CoreStatusEntry>,
}

#[derive(Debug, Deserialize)]
struct CoreStatusEntry {
    name: Option<String>,
    #[serde(default)]
    index: CoreIndex,
}

#[derive(Debug, Default, Deserialize)]
struct CoreIndex {
    #[serde(rename = "numDocs", default)]
    num_docs: u64,
}

/// 一次发布前读取的分片列表，每次发布都重新获取
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    pub shards: Vec<ShardDescriptor>,
}

impl ClusterStatus {
    pub fn status_url(endpoint: &str) -> String {
        format!("{}admin/cores?wt=json", endpoint)
    }

    pub fn fetch(transport: &dyn IndexTransport, endpoint: &str) -> Result<Self, LoadError> {
        let url = Self::status_url(endpoint);
        let resp = transport
            .get(&url)
            .map_err(|e| LoadError::ClusterStatus(e.to_string()))?;
        if !resp.is_success() {
            return Err(LoadError::ClusterStatus(format!(
                "{} returned status {} with {} byte body",
                url,
                resp.status,
                resp.body.len()
            )));
        }
        Self::from_json(&resp.body)
    }

    pub fn from_json(body: &str) -> Result<Self, LoadError> {
        let parsed: CoreAdminResponse = serde_json::from_str(body)
            .map_err(|e| LoadError::ClusterStatus(format!("invalid status body: {}", e)))?;

        let shards = parsed
            .status
            .into_iter()
            .map(|(key, entry)| ShardDescriptor {
                name: entry.name.unwrap_or(key),
                document_count: entry.index.num_docs,
            })
            .collect();
        Ok(Self { shards })
    }

    pub fn select(&self, core_prefix: &str) -> Result<&ShardDescriptor, LoadError> {
        select(&self.shards, core_prefix)
    }
}

/// 选择 `<core_prefix>_` 前缀下文档数最少的分片
/// 文档数相同时取名字字典序最小的，保证结果确定
pub fn select<'a>(shards: &'a [ShardDescriptor], core_prefix: &str) -> Result<&'a ShardDescriptor, LoadError> {
    let family = format!("{}_", core_prefix);
    shards
        .iter()
        .filter(|s| s.name.starts_with(&family))
        .min_by(|a, b| {
            a.document_count
                .cmp(&b.document_count)
                .then_with(|| a.name.cmp(&b.name))
        })
        .ok_or_else(|| LoadError::NoMatchingShard(core_prefix.to_string()))
}

/// 进程内分片预留表
///
/// 并发加载时，已选中但尚未提交的文档数会计入分片负载，
/// 避免多个任务同时看到同一个最空的分片。
#[derive(Debug, Clone, Default)]
pub struct ShardLedger {
    pending: Arc<Mutex<HashMap<String, u64>>>,
}

impl ShardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // 表内只有计数，中毒后的数据仍然可用
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pending(&self, shard: &str) -> u64 {
        self.lock().get(shard).copied().unwrap_or(0)
    }

    /// 按 `文档数 + 预留数` 选择分片并登记本次文档数，
    /// 返回的 guard 释放时撤销登记
    pub fn reserve(
        &self,
        shards: &[ShardDescriptor],
        core_prefix: &str,
        documents: u64,
    ) -> Result<ShardReservation, LoadError> {
        let mut pending = self.lock();

        let effective: Vec<ShardDescriptor> = shards
            .iter()
            .map(|s| {
                let reserved = pending.get(&s.name).copied().unwrap_or(0);
                ShardDescriptor::new(s.name.clone(), s.document_count.saturating_add(reserved))
            })
            .collect();
        let chosen = select(&effective, core_prefix)?;

        let shard = shards
            .iter()
            .find(|s| s.name == chosen.name)
            .cloned()
            .unwrap_or_else(|| chosen.clone());

        *pending.entry(shard.name.clone()).or_insert(0) += documents;
        debug!(
            "reserved {} documents on {} (load {} incl. pending)",
            documents, shard.name, chosen.document_count
        );

        Ok(ShardReservation {
            ledger: self.clone(),
            shard,
            documents,
        })
    }

    fn release(&self, shard: &str, documents: u64) {
        let mut pending = self.lock();
        if let Some(count) = pending.get_mut(shard) {
            *count = count.saturating_sub(documents);
            if *count == 0 {
                pending.remove(shard);
            }
        }
    }
}

/// 已登记的分片选择
#[derive(Debug)]
pub struct ShardReservation {
    ledger: ShardLedger,
    shard: ShardDescriptor,
    documents: u64,
}

impl ShardReservation {
    pub fn shard(&self) -> &ShardDescriptor {
        &self.shard
    }
}

impl Drop for ShardReservation {
    fn drop(&mut self) {
        self.ledger.release(&self.shard.name, self.documents);
    }
}
