use crate::error::StoreError;
use crate::store::document_store::{DocumentStore, StoredDocument};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{RoomId, Snapshot};
use tracing::debug;

/// In-process store. Saving keeps the latest snapshot per room.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<DashMap<RoomId, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: StoredDocument) {
        self.documents.insert(document.id.clone(), document);
    }

    /// Last write wins, in receipt order.
    pub fn save(&self, snapshot: Snapshot) {
        debug!("Saving snapshot of {}", snapshot.room_id);
        self.documents
            .entry(snapshot.room_id.clone())
            .or_insert_with(|| StoredDocument::empty(snapshot.room_id.clone()))
            .content = Some(snapshot.content);
    }

    pub fn get(&self, room_id: &RoomId) -> Option<StoredDocument> {
        self.documents.get(room_id).map(|doc| doc.clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, room_id: &RoomId) -> Result<StoredDocument, StoreError> {
        self.get(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))
    }
}
