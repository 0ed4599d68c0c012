use std::time::Duration;
use tandem_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("relay channel is not connected")]
    NotConnected,

    #[error("relay channel has been closed")]
    Closed,

    #[error("relay handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("invalid relay url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("relay connection failed: {0}")]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(RoomId),

    #[error("document store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid document payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("camera or microphone access was denied")]
    PermissionDenied,

    #[error("no usable media device: {0}")]
    Unavailable(String),

    #[error("local media has been stopped")]
    Stopped,

    #[error("failed to write media sample: {0}")]
    Write(#[from] webrtc::Error),
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("could not access local media: {0}")]
    Media(#[from] MediaError),

    #[error("signaling channel unavailable: {0}")]
    Channel(#[from] ChannelError),

    #[error("already in the call of room {0}")]
    AlreadyInCall(RoomId),

    #[error("peer mesh has shut down")]
    Stopped,
}
