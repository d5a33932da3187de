//! Attachment upload.
//!
//! Files are posted as a multipart form to `POST /rooms/{room}/upload/`.
//! The server stores the attachment as a new message and answers with that
//! message, server-assigned id included.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::info;

use chatsync_shared::constants::{CSRF_HEADER, MAX_FILE_SIZE};
use chatsync_shared::Message;

use crate::endpoint;
use crate::error::NetError;

#[derive(Debug, Clone)]
pub struct UploadClient {
    http: Client,
    base_url: String,
    room: String,
    csrf_token: Option<String>,
}

impl UploadClient {
    pub fn new(base_url: &str, room: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.to_string(),
            room: room.to_string(),
            csrf_token: None,
        }
    }

    /// Token sent in the `X-CSRFToken` header of every upload.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> Result<Url, NetError> {
        endpoint::join_segments(&self.base_url, &["rooms", self.room.as_str(), "upload"])
    }

    /// Upload `bytes` as `file_name` with an optional caption `text`.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        text: &str,
    ) -> Result<Message, NetError> {
        let size = bytes.len();
        if size > MAX_FILE_SIZE {
            return Err(NetError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("text", text.to_string());

        let mut req = self.http.post(self.endpoint()?).multipart(form);
        if let Some(ref token) = self.csrf_token {
            req = req.header(CSRF_HEADER, token.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let message: Message = resp.json().await?;
        info!(
            msg_id = %message.id,
            file_name = %file_name,
            size,
            "Attachment uploaded"
        );
        Ok(message)
    }

    /// Read `path` from disk and upload it under its file name.
    pub async fn upload_file(&self, path: &Path, text: &str) -> Result<Message, NetError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let size = tokio::fs::metadata(path).await?.len() as usize;
        if size > MAX_FILE_SIZE {
            return Err(NetError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        self.upload(&file_name, bytes, text).await
    }
}
