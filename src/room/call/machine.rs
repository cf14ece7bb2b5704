//! Call negotiation state machine.
//!
//! Pure: events in, actions out. No I/O happens here; the driver in
//! `negotiator` performs the actions and feeds their outcomes back.
//!
//! ```text
//! Idle ──join──▶ Connecting ──no offer──▶ OfferingWaitingForAnswer ──answer applied──▶ InCall
//!                     │
//!                     └──offer exists──▶ Answering ──answer published──▶ InCall
//!
//! any non-idle ──failure──▶ Error        any ──leave──▶ Idle
//! ```

use std::collections::HashSet;

use super::media::{IceCandidate, SessionDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Connecting,
    OfferingWaitingForAnswer,
    Answering,
    InCall,
    Error,
}

impl CallState {
    #[must_use]
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Idle => "Not in call",
            Self::Connecting => "Connecting...",
            Self::OfferingWaitingForAnswer => "Waiting for answer...",
            Self::Answering => "Answering...",
            Self::InCall => "In call",
            Self::Error => "Error",
        }
    }

    /// True while a call attempt holds media resources.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    JoinRequested { authorized: bool },
    /// The room's call record was read; `offer` is the stored offer, if any.
    SessionRead { offer: Option<SessionDescription> },
    AnswerReceived(SessionDescription),
    RemoteDescriptionApplied,
    AnswerPublished,
    /// A candidate entry seen in the room, keyed `"{participant}/{candidate}"`.
    CandidateReceived { key: String, candidate: IceCandidate },
    Failed(String),
    LeaveRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallAction {
    /// Capture audio, create the peer connection, read the call record.
    OpenMedia,
    /// Create and publish an offer, then watch for answers and candidates.
    BeginOffer,
    /// Apply the offer, publish an answer, then watch for candidates.
    BeginAnswer(SessionDescription),
    ApplyAnswer(SessionDescription),
    AddCandidate(IceCandidate),
    /// Stop background work, close the peer, release capture.
    Teardown,
}

#[derive(Debug)]
pub struct CallMachine {
    state: CallState,
    remote_applied: bool,
    answer_in_flight: bool,
    seen_candidates: HashSet<String>,
    pending_candidates: Vec<IceCandidate>,
}

impl CallMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            remote_applied: false,
            answer_in_flight: false,
            seen_candidates: HashSet::new(),
            pending_candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Candidates held until a remote description exists.
    #[must_use]
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn handle(&mut self, event: CallEvent) -> Vec<CallAction> {
        match event {
            CallEvent::JoinRequested { authorized } => {
                if !authorized || self.state.is_active() {
                    return Vec::new();
                }
                self.reset();
                self.state = CallState::Connecting;
                vec![CallAction::OpenMedia]
            }
            CallEvent::SessionRead { offer } => {
                if self.state != CallState::Connecting {
                    return Vec::new();
                }
                match offer {
                    None => {
                        self.state = CallState::OfferingWaitingForAnswer;
                        vec![CallAction::BeginOffer]
                    }
                    Some(offer) => {
                        self.state = CallState::Answering;
                        vec![CallAction::BeginAnswer(offer)]
                    }
                }
            }
            CallEvent::AnswerReceived(answer) => {
                if self.state != CallState::OfferingWaitingForAnswer || self.remote_applied || self.answer_in_flight {
                    return Vec::new();
                }
                self.answer_in_flight = true;
                vec![CallAction::ApplyAnswer(answer)]
            }
            CallEvent::RemoteDescriptionApplied => {
                if !self.state.is_active() {
                    return Vec::new();
                }
                self.remote_applied = true;
                self.answer_in_flight = false;
                if self.state == CallState::OfferingWaitingForAnswer {
                    self.state = CallState::InCall;
                }
                self.pending_candidates.drain(..).map(CallAction::AddCandidate).collect()
            }
            CallEvent::AnswerPublished => {
                if self.state == CallState::Answering {
                    self.state = CallState::InCall;
                }
                Vec::new()
            }
            CallEvent::CandidateReceived { key, candidate } => {
                if !self.state.is_active() || !self.seen_candidates.insert(key) {
                    return Vec::new();
                }
                if self.remote_applied {
                    vec![CallAction::AddCandidate(candidate)]
                } else {
                    self.pending_candidates.push(candidate);
                    Vec::new()
                }
            }
            CallEvent::Failed(_) => {
                if !self.state.is_active() {
                    return Vec::new();
                }
                self.reset();
                self.state = CallState::Error;
                vec![CallAction::Teardown]
            }
            CallEvent::LeaveRequested => {
                let was_active = self.state.is_active();
                self.reset();
                self.state = CallState::Idle;
                if was_active { vec![CallAction::Teardown] } else { Vec::new() }
            }
        }
    }

    fn reset(&mut self) {
        self.remote_applied = false;
        self.answer_in_flight = false;
        self.seen_candidates.clear();
        self.pending_candidates.clear();
    }
}

impl Default for CallMachine {
    fn default() -> Self {
        Self::new()
    }
}
