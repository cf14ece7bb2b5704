//! Media ports — what the call driver needs from a WebRTC stack.
//!
//! The crate ships no media engine. Browser clients do the real audio work;
//! in-process callers plug an engine in through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::CallError;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An offer or answer, stored as `{type, sdp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

/// One ICE candidate in its JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    #[serde(default)]
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Entries without a candidate line or media id carry nothing to apply.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.candidate.is_empty() || self.sdp_mid.as_deref().is_some_and(|mid| !mid.is_empty())
    }
}

/// Peer connection settings. Exactly one STUN server, no TURN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub ice_servers: Vec<String>,
}

impl PeerConfig {
    #[must_use]
    pub fn with_stun(url: &str) -> Self {
        Self { ice_servers: vec![url.to_owned()] }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self::with_stun(DEFAULT_STUN_URL)
    }
}

/// A remote audio track announced by the peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
}

/// Things a peer connection reports on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
}

/// Local microphone capture.
pub trait AudioCapture: Send + Sync {
    fn track_ids(&self) -> Vec<String>;

    /// Stop every captured track and release the device.
    fn stop(&self);
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_local_audio(&self, capture: &dyn AudioCapture) -> Result<(), CallError>;

    async fn create_offer(&self) -> Result<SessionDescription, CallError>;

    async fn create_answer(&self) -> Result<SessionDescription, CallError>;

    async fn set_local_description(&self, description: &SessionDescription) -> Result<(), CallError>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<(), CallError>;

    fn has_remote_description(&self) -> bool;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), CallError>;

    fn close(&self);
}

/// Entry point to a media engine.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Ask for microphone access.
    async fn capture_audio(&self) -> Result<Box<dyn AudioCapture>, CallError>;

    /// Create a peer connection plus the stream of events it reports.
    async fn create_peer(
        &self,
        config: &PeerConfig,
    ) -> Result<(Box<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerEvent>), CallError>;

    /// Route a remote track to local playback.
    fn play_remote(&self, track: RemoteTrack);
}
