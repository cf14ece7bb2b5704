//! Call — two-party voice call negotiation over the shared state tree.
//!
//! ARCHITECTURE
//! ============
//! The room's `call` node holds one offer, one answer and every
//! participant's ICE candidates. Whoever joins first finds no offer and
//! offers; whoever joins next answers. `machine` decides, `negotiator`
//! performs the I/O, `media` is the port to the WebRTC stack.
//!
//! LIMITATIONS
//! ===========
//! The call node is never cleared. A participant joining after two others
//! answers the stale offer and overwrites the answer; the first offerer
//! keeps talking to the first answerer.

pub mod machine;
pub mod media;
pub mod negotiator;

use crate::frame::ErrorCode;
use crate::store::StoreError;

pub use machine::{CallAction, CallEvent, CallMachine, CallState};
pub use media::{
    AudioCapture, DEFAULT_STUN_URL, IceCandidate, MediaBackend, PeerConfig, PeerConnection, PeerEvent, RemoteTrack, SdpType,
    SessionDescription,
};
pub use negotiator::CallNegotiator;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("media unavailable: {0}")]
    Media(String),
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("malformed call data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for CallError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Media(_) => "E_CALL_MEDIA",
            Self::Negotiation(_) => "E_CALL_NEGOTIATION",
            Self::Malformed(_) => "E_CALL_MALFORMED",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Media(_) | Self::Negotiation(_))
    }
}
