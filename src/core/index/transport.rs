use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

/// 阻塞式请求的响应：状态码 + 原始响应体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx 且响应体非空
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && !self.body.trim().is_empty()
    }
}

/// 索引集群的 HTTP 调用，测试中可替换
pub trait IndexTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;

    fn post_xml(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError>;
}

/// 基于 reqwest blocking 的实现
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("hash-loader/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl IndexTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let resp = self.client.get(url).send()?;
        let status = resp.status().as_u16();
        Ok(TransportResponse::new(status, resp.text()?))
    }

    fn post_xml(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body.to_owned())
            .send()?;
        let status = resp.status().as_u16();
        Ok(TransportResponse::new(status, resp.text()?))
    }
}
