use crate::error::MediaError;
use crate::media::local_media::{LocalMedia, LocalTrack, TrackKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Which tracks a call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Where local capture comes from (camera, microphone, a file, a test
/// pattern). Acquisition may fail, e.g. when the user denies access.
#[async_trait]
pub trait MediaSource: Send + Sync + 'static {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MediaError>;
}

/// Opus audio and VP8 video tracks fed by the caller with encoded samples.
#[derive(Debug, Clone, Default)]
pub struct SyntheticMediaSource;

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MediaError> {
        let stream_id = format!("tandem-{}", uuid::Uuid::new_v4().simple());
        let mut tracks = Vec::new();

        if constraints.audio {
            tracks.push(static_track(TrackKind::Audio, MIME_TYPE_OPUS, &stream_id));
        }
        if constraints.video {
            tracks.push(static_track(TrackKind::Video, MIME_TYPE_VP8, &stream_id));
        }
        if tracks.is_empty() {
            return Err(MediaError::Unavailable("no track requested".to_owned()));
        }

        info!("Acquired synthetic media {} ({} tracks)", stream_id, tracks.len());
        Ok(LocalMedia::new(stream_id, tracks))
    }
}

fn static_track(kind: TrackKind, mime_type: &str, stream_id: &str) -> LocalTrack {
    let track = TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        kind.to_string(),
        stream_id.to_owned(),
    );
    LocalTrack::new(kind, Arc::new(track))
}
