use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tandem_core::{Delta, RoomId};

/// A document as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(rename = "_id")]
    pub id: RoomId,
    #[serde(default)]
    pub title: String,
    /// `None` when nothing has been saved yet, or the stored value is not
    /// a delta.
    #[serde(default, deserialize_with = "lenient_delta")]
    pub content: Option<Delta>,
    /// Owner user id. Accepts either the bare id or a populated user.
    #[serde(default, deserialize_with = "owner_id")]
    pub owner: Option<String>,
}

impl StoredDocument {
    pub fn empty(id: RoomId) -> Self {
        Self {
            id,
            title: String::new(),
            content: None,
            owner: None,
        }
    }
}

/// Where persisted snapshots are read from on startup.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn fetch(&self, room_id: &RoomId) -> Result<StoredDocument, StoreError>;
}

fn lenient_delta<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Delta>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.get("ops").is_some())
        .and_then(|v| serde_json::from_value(v).ok()))
}

fn owner_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) => Some(id),
        Some(Value::Object(user)) => user
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    })
}
