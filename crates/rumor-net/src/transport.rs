//! HTTP push transport
//!
//! A push is a single `POST` of a JSON snapshot. The status code says whether
//! the receiver learned something; a non-empty body carries the receiver's
//! newer state back to the sender.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use rumor_core::MEDIA_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {address}")]
    Status { address: String, status: u16 },
}

/// Receiver's verdict on a push
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushStatus {
    /// Receiver already knew everything we sent
    Unchanged,
    /// Receiver learned something from our push
    Updated,
}

impl PushStatus {
    pub fn from_http(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::OK => Some(Self::Unchanged),
            StatusCode::CREATED => Some(Self::Updated),
            _ => None,
        }
    }

    pub fn as_http(self) -> StatusCode {
        match self {
            Self::Unchanged => StatusCode::OK,
            Self::Updated => StatusCode::CREATED,
        }
    }
}

/// Successful push response
#[derive(Clone, Debug)]
pub struct PushReply {
    pub status: PushStatus,
    /// Empty unless the receiver had newer data for us
    pub body: Vec<u8>,
}

impl PushReply {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

/// HTTP client for pushing snapshots to peers
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Push an encoded snapshot to `address`
    pub async fn push(&self, address: &str, body: Vec<u8>) -> Result<PushReply, TransportError> {
        let response = self
            .client
            .post(address)
            .header(CONTENT_TYPE, MEDIA_TYPE)
            .body(body)
            .send()
            .await?;

        let status = PushStatus::from_http(response.status()).ok_or_else(|| {
            TransportError::Status {
                address: address.to_string(),
                status: response.status().as_u16(),
            }
        })?;

        let body = response.bytes().await?.to_vec();
        debug!(%address, ?status, reply_bytes = body.len(), "push acknowledged");

        Ok(PushReply { status, body })
    }
}
