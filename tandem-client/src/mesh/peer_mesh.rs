use crate::channel::{HandlerId, SessionChannel};
use crate::config::MeshConfig;
use crate::error::MeshError;
use crate::media::{LocalMedia, MediaSource, TrackKind};
use crate::mesh::mesh_command::MeshCommand;
use crate::mesh::mesh_observer::MeshObserver;
use crate::mesh::peer_link::{LinkInfo, LinkState, PeerLink};
use crate::mesh::signal_sink::SignalSink;
use crate::transport::{LinkKey, PeerTransportFactory, TransportEvent, TransportState};
use std::collections::HashMap;
use std::sync::Arc;
use tandem_core::{CandidateSignal, ParticipantId, RoomId, SdpSignal, SessionDescription, SignalMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

struct ActiveCall {
    room_id: RoomId,
    media: Arc<LocalMedia>,
}

/// Full-mesh call manager: one peer link per remote participant of the
/// room's call.
///
/// Runs as an actor; every signal, transport event and command is handled
/// to completion before the next one. Drive it with [`PeerMesh::run`] and
/// talk to it through the [`MeshHandle`].
pub struct PeerMesh {
    config: MeshConfig,
    signaling: Arc<dyn SignalSink>,
    media_source: Arc<dyn MediaSource>,
    transports: Arc<dyn PeerTransportFactory>,
    observer: Arc<dyn MeshObserver>,
    links: HashMap<ParticipantId, PeerLink>,
    call: Option<ActiveCall>,
    next_serial: u64,
    command_rx: mpsc::Receiver<MeshCommand>,
    signal_rx: mpsc::UnboundedReceiver<SignalMessage>,
    event_rx: mpsc::Receiver<TransportEvent>,
    event_tx: mpsc::Sender<TransportEvent>,
}

impl PeerMesh {
    pub fn new(
        config: MeshConfig,
        signaling: Arc<dyn SignalSink>,
        media_source: Arc<dyn MediaSource>,
        transports: Arc<dyn PeerTransportFactory>,
        observer: Arc<dyn MeshObserver>,
    ) -> (Self, MeshHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(256);

        let mesh = Self {
            config,
            signaling,
            media_source,
            transports,
            observer,
            links: HashMap::new(),
            call: None,
            next_serial: 0,
            command_rx,
            signal_rx,
            event_rx,
            event_tx,
        };
        let handle = MeshHandle {
            command_tx,
            signal_tx,
        };

        (mesh, handle)
    }

    /// Main loop. Ends, leaving any call, once every handle is dropped.
    pub async fn run(mut self) {
        info!("Peer mesh event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down mesh.");
                            break;
                        }
                    }
                }

                Some(signal) = self.signal_rx.recv() => {
                    self.handle_signal(signal).await;
                }

                Some(event) = self.event_rx.recv() => {
                    self.handle_transport_event(event).await;
                }
            }
        }

        self.leave_call().await;
        info!("Peer mesh event loop finished");
    }

    async fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::JoinCall { room_id, reply } => {
                let result = self.join_call(room_id).await;
                let _ = reply.send(result);
            }
            MeshCommand::LeaveCall { reply } => {
                self.leave_call().await;
                let _ = reply.send(());
            }
            MeshCommand::SetTrackEnabled {
                kind,
                enabled,
                reply,
            } => {
                let applied = self
                    .call
                    .as_ref()
                    .is_some_and(|call| call.media.set_enabled(kind, enabled));
                let _ = reply.send(applied);
            }
            MeshCommand::Links { reply } => {
                let mut links: Vec<LinkInfo> = self.links.values().map(PeerLink::info).collect();
                links.sort_by(|a, b| a.remote.as_str().cmp(b.remote.as_str()));
                let _ = reply.send(links);
            }
            MeshCommand::LocalMedia { reply } => {
                let _ = reply.send(self.call.as_ref().map(|call| call.media.clone()));
            }
        }
    }

    async fn join_call(&mut self, room_id: RoomId) -> Result<(), MeshError> {
        if let Some(call) = &self.call {
            return Err(MeshError::AlreadyInCall(call.room_id.clone()));
        }

        let media = match self.media_source.acquire(&self.config.constraints).await {
            Ok(media) => Arc::new(media),
            Err(e) => {
                warn!("Cannot join call of {}: {}", room_id, e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.signaling.send_signal(SignalMessage::JoinVideo {
            room_id: room_id.clone(),
        }) {
            media.stop();
            return Err(e.into());
        }

        info!("Joined call of room {}", room_id);
        self.call = Some(ActiveCall { room_id, media });
        Ok(())
    }

    /// Closes every link first, then stops the shared tracks.
    async fn leave_call(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };

        let remotes: Vec<ParticipantId> = self.links.keys().cloned().collect();
        for remote in remotes {
            self.close_link(&remote).await;
        }

        if self.config.announce_leave {
            let leave = SignalMessage::LeaveVideo {
                room_id: call.room_id.clone(),
            };
            if let Err(e) = self.signaling.send_signal(leave) {
                debug!("Could not announce leave: {}", e);
            }
        }

        call.media.stop();
        info!("Left call of room {}", call.room_id);
    }

    async fn handle_signal(&mut self, signal: SignalMessage) {
        let Some(media) = self.call.as_ref().map(|c| c.media.clone()) else {
            debug!("Not in a call, ignoring {:?}", signal);
            return;
        };

        match signal {
            SignalMessage::AllUsers { users } => {
                let local = self.signaling.local_id();
                for remote in users {
                    if Some(&remote) == local.as_ref() || self.links.contains_key(&remote) {
                        continue;
                    }
                    self.call_participant(remote, &media).await;
                }
            }

            SignalMessage::Offer(SdpSignal { target, caller, sdp }) => {
                if !self.addressed_to_me(&target) {
                    return;
                }
                if self.links.contains_key(&caller) {
                    info!("New offer from {}, rebuilding its link", caller);
                    self.close_link(&caller).await;
                }
                self.answer_participant(caller, sdp, &media).await;
            }

            SignalMessage::Answer(SdpSignal { target, caller, sdp }) => {
                if !self.addressed_to_me(&target) {
                    return;
                }
                self.accept_answer(caller, sdp).await;
            }

            SignalMessage::IceCandidate(CandidateSignal {
                target,
                caller,
                candidate,
            }) => {
                if !self.addressed_to_me(&target) {
                    return;
                }
                let Some(link) = self.links.get_mut(&caller) else {
                    debug!("Discarding candidate from unknown participant {}", caller);
                    return;
                };
                if !link.remote_description_set {
                    link.pending_candidates.push_back(candidate);
                    return;
                }
                if let Err(e) = link.transport.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate from {}: {:?}", caller, e);
                }
            }

            SignalMessage::UserLeft { id } => {
                if self.config.announce_leave && self.links.contains_key(&id) {
                    info!("{} left the call", id);
                    self.close_link(&id).await;
                }
            }

            SignalMessage::JoinVideo { .. } | SignalMessage::LeaveVideo { .. } => {
                debug!("Ignoring echoed {:?}", signal);
            }
        }
    }

    fn addressed_to_me(&self, target: &ParticipantId) -> bool {
        match self.signaling.local_id() {
            Some(local) if local != *target => {
                debug!("Discarding signal addressed to {}", target);
                false
            }
            _ => true,
        }
    }

    async fn create_link(&mut self, remote: &ParticipantId, media: &LocalMedia) -> Option<PeerLink> {
        self.next_serial += 1;
        let key = LinkKey::new(remote.clone(), self.next_serial);

        match self
            .transports
            .create(key.clone(), media, self.event_tx.clone())
            .await
        {
            Ok(transport) => Some(PeerLink::new(key, transport)),
            Err(e) => {
                error!("Failed to create transport for {}: {:?}", remote, e);
                None
            }
        }
    }

    async fn call_participant(&mut self, remote: ParticipantId, media: &LocalMedia) {
        let Some(mut link) = self.create_link(&remote, media).await else {
            return;
        };

        self.set_state(&mut link, LinkState::Offering).await;
        let sdp = match link.transport.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                error!("Failed to create offer for {}: {:?}", remote, e);
                self.discard(link).await;
                return;
            }
        };

        let Some(caller) = self.signaling.local_id() else {
            warn!("No connection id yet, cannot offer to {}", remote);
            self.discard(link).await;
            return;
        };
        let offer = SignalMessage::Offer(SdpSignal {
            target: remote.clone(),
            caller,
            sdp,
        });
        if let Err(e) = self.signaling.send_signal(offer) {
            warn!("Failed to send offer to {}: {}", remote, e);
            self.discard(link).await;
            return;
        }

        self.set_state(&mut link, LinkState::AnswerPending).await;
        info!("Offer sent to {}", remote);
        self.links.insert(remote, link);
    }

    async fn answer_participant(
        &mut self,
        remote: ParticipantId,
        sdp: SessionDescription,
        media: &LocalMedia,
    ) {
        let Some(mut link) = self.create_link(&remote, media).await else {
            return;
        };

        if let Err(e) = link.transport.set_remote_description(sdp).await {
            error!("SDP error for {}: {:?}", remote, e);
            self.discard(link).await;
            return;
        }
        link.remote_description_set = true;
        self.set_state(&mut link, LinkState::AnswerRequired).await;
        flush_candidates(&mut link).await;

        let sdp = match link.transport.create_answer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                error!("Failed to create answer for {}: {:?}", remote, e);
                self.discard(link).await;
                return;
            }
        };

        let Some(caller) = self.signaling.local_id() else {
            warn!("No connection id yet, cannot answer {}", remote);
            self.discard(link).await;
            return;
        };
        let answer = SignalMessage::Answer(SdpSignal {
            target: remote.clone(),
            caller,
            sdp,
        });
        if let Err(e) = self.signaling.send_signal(answer) {
            warn!("Failed to send answer to {}: {}", remote, e);
            self.discard(link).await;
            return;
        }

        self.set_state(&mut link, LinkState::Connected).await;
        info!("Answered {}", remote);
        self.links.insert(remote, link);
    }

    async fn accept_answer(&mut self, remote: ParticipantId, sdp: SessionDescription) {
        let Some(mut link) = self.links.remove(&remote) else {
            debug!("Discarding answer from unknown participant {}", remote);
            return;
        };
        if link.state != LinkState::AnswerPending {
            debug!(
                "Discarding answer from {}, link is {:?}",
                remote, link.state
            );
            self.links.insert(remote, link);
            return;
        }

        if let Err(e) = link.transport.set_remote_description(sdp).await {
            error!("Failed to apply answer from {}: {:?}", remote, e);
            self.discard(link).await;
            return;
        }
        link.remote_description_set = true;
        flush_candidates(&mut link).await;
        self.set_state(&mut link, LinkState::Connected).await;
        self.links.insert(remote, link);
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(key, candidate) => {
                if !self.is_current(&key) {
                    return;
                }
                let Some(caller) = self.signaling.local_id() else {
                    return;
                };
                let signal = SignalMessage::IceCandidate(CandidateSignal {
                    target: key.remote.clone(),
                    caller,
                    candidate,
                });
                if let Err(e) = self.signaling.send_signal(signal) {
                    debug!("Dropping local candidate for {}: {}", key.remote, e);
                }
            }

            TransportEvent::StateChanged(key, state) => {
                if !self.is_current(&key) {
                    return;
                }
                if state.is_terminal() {
                    info!("Transport to {} is {:?}, closing link", key.remote, state);
                    self.close_link(&key.remote).await;
                } else if state == TransportState::Connected {
                    info!("Media flowing with {}", key.remote);
                }
            }

            TransportEvent::RemoteTrack(key, track) => {
                let Some(link) = self.links.get_mut(&key.remote) else {
                    return;
                };
                if link.key != key {
                    return;
                }
                link.remote_tracks.push(track.clone());
                self.observer.on_remote_track(&key.remote, track).await;
            }
        }
    }

    fn is_current(&self, key: &LinkKey) -> bool {
        self.links.get(&key.remote).is_some_and(|link| link.key == *key)
    }

    async fn set_state(&self, link: &mut PeerLink, next: LinkState) {
        if link.transition(next) {
            debug!("Link to {} is now {:?}", link.remote(), next);
            self.observer.on_link_state(link.remote(), next).await;
        }
    }

    async fn close_link(&mut self, remote: &ParticipantId) {
        let Some(link) = self.links.remove(remote) else {
            return;
        };
        self.discard(link).await;
    }

    async fn discard(&self, mut link: PeerLink) {
        link.pending_candidates.clear();
        link.remote_tracks.clear();
        if let Err(e) = link.transport.close().await {
            debug!("Error closing transport to {}: {:?}", link.remote(), e);
        }
        self.set_state(&mut link, LinkState::Closed).await;
    }
}

async fn flush_candidates(link: &mut PeerLink) {
    while let Some(candidate) = link.pending_candidates.pop_front() {
        if let Err(e) = link.transport.add_ice_candidate(candidate).await {
            warn!(
                "Failed to add buffered candidate for {}: {:?}",
                link.remote(),
                e
            );
        }
    }
}

/// Cloneable handle to a running [`PeerMesh`].
#[derive(Clone)]
pub struct MeshHandle {
    command_tx: mpsc::Sender<MeshCommand>,
    signal_tx: mpsc::UnboundedSender<SignalMessage>,
}

impl MeshHandle {
    /// Acquires local media and announces readiness for the call of `room_id`.
    pub async fn join_call(&self, room_id: RoomId) -> Result<(), MeshError> {
        let (reply, rx) = oneshot::channel();
        self.command(MeshCommand::JoinCall { room_id, reply })
            .await?;
        rx.await.map_err(|_| MeshError::Stopped)?
    }

    pub async fn leave_call(&self) -> Result<(), MeshError> {
        let (reply, rx) = oneshot::channel();
        self.command(MeshCommand::LeaveCall { reply }).await?;
        rx.await.map_err(|_| MeshError::Stopped)
    }

    /// Mutes or unmutes the microphone. False when not in a call.
    pub async fn set_audio_enabled(&self, enabled: bool) -> Result<bool, MeshError> {
        self.set_track_enabled(TrackKind::Audio, enabled).await
    }

    /// Turns the camera on or off. False when not in a call.
    pub async fn set_video_enabled(&self, enabled: bool) -> Result<bool, MeshError> {
        self.set_track_enabled(TrackKind::Video, enabled).await
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<bool, MeshError> {
        let (reply, rx) = oneshot::channel();
        self.command(MeshCommand::SetTrackEnabled {
            kind,
            enabled,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MeshError::Stopped)
    }

    pub async fn links(&self) -> Result<Vec<LinkInfo>, MeshError> {
        let (reply, rx) = oneshot::channel();
        self.command(MeshCommand::Links { reply }).await?;
        rx.await.map_err(|_| MeshError::Stopped)
    }

    /// The local stream of the current call, for feeding samples.
    pub async fn local_media(&self) -> Result<Option<Arc<LocalMedia>>, MeshError> {
        let (reply, rx) = oneshot::channel();
        self.command(MeshCommand::LocalMedia { reply }).await?;
        rx.await.map_err(|_| MeshError::Stopped)
    }

    /// Hands an inbound signal to the mesh.
    pub fn deliver(&self, signal: SignalMessage) {
        if self.signal_tx.send(signal).is_err() {
            debug!("Peer mesh stopped, dropping signal");
        }
    }

    /// Routes the signals received by `channel` into the mesh.
    pub fn listen(&self, channel: &SessionChannel) -> HandlerId {
        let signal_tx = self.signal_tx.clone();
        channel.on_signal(move |signal| {
            let _ = signal_tx.send(signal);
        })
    }

    async fn command(&self, cmd: MeshCommand) -> Result<(), MeshError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| MeshError::Stopped)
    }
}
