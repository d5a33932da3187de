//! Paginated message history over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use chatsync_shared::HistoryPage;

use crate::endpoint;
use crate::error::NetError;

/// Source of older history pages for one room.
///
/// Page 1 is the most recent batch; higher pages go further back.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<HistoryPage, NetError>;
}

/// [`HistorySource`] backed by `GET /api/messages/{room}/`.
#[derive(Debug, Clone)]
pub struct HttpHistoryClient {
    http: Client,
    base_url: String,
    room: String,
}

impl HttpHistoryClient {
    pub fn new(base_url: &str, room: &str) -> Self {
        Self::with_client(Client::new(), base_url, room)
    }

    /// Share an existing `reqwest::Client` (and its connection pool).
    pub fn with_client(http: Client, base_url: &str, room: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            room: room.to_string(),
        }
    }

    pub fn endpoint(&self) -> Result<Url, NetError> {
        endpoint::join_segments(&self.base_url, &["api", "messages", self.room.as_str()])
    }
}

#[async_trait]
impl HistorySource for HttpHistoryClient {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<HistoryPage, NetError> {
        let url = self.endpoint()?;
        debug!(url = %url, page, per_page, "Fetching history page");

        let resp = self
            .http
            .get(url)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let history: HistoryPage = resp.json().await?;
        debug!(
            page,
            count = history.messages.len(),
            num_pages = ?history.num_pages,
            "History page received"
        );
        Ok(history)
    }
}
