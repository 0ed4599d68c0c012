use crate::error::StoreError;
use crate::store::document_store::{DocumentStore, StoredDocument};
use async_trait::async_trait;
use reqwest::StatusCode;
use tandem_core::{RoomId, SessionContext};
use tracing::debug;

/// Reads documents from the REST API, `GET {base}/documents/{id}`.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    ctx: SessionContext,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>, ctx: SessionContext) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            ctx,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn document_url(&self, room_id: &RoomId) -> String {
        format!("{}/documents/{}", self.base_url, room_id)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, room_id: &RoomId) -> Result<StoredDocument, StoreError> {
        let url = self.document_url(room_id);
        debug!("Fetching {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.ctx.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(room_id.clone()));
        }

        let body = response.error_for_status()?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
