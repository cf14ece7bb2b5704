//! Call driver — performs the machine's actions against the store and the
//! media backend.
//!
//! DESIGN
//! ======
//! One driver task per join attempt. It owns an event funnel (mpsc) fed by
//! the answer and candidate watchers, runs each `CallAction` to completion,
//! and turns the outcome back into `CallEvent`s. Background work (watchers,
//! the peer event forwarder) is tracked in `Resources` so that `leave()`
//! can abort it synchronously and release media. Each join and leave bumps
//! an attempt counter; a driver still running for an older attempt on
//! another worker exits and stops whatever media it opened.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::CallError;
use super::machine::{CallAction, CallEvent, CallMachine, CallState};
use super::media::{AudioCapture, IceCandidate, MediaBackend, PeerConfig, PeerConnection, PeerEvent, SessionDescription};
use crate::room::paths::RoomPaths;
use crate::store::{SharedState, StoreEvent, WatchMode};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SHARED STATE
// =============================================================================

struct CallContext {
    store: Arc<dyn SharedState>,
    paths: RoomPaths,
    participant_id: String,
    media: Arc<dyn MediaBackend>,
    peer_config: PeerConfig,
}

#[derive(Default)]
struct Resources {
    peer: Option<Arc<dyn PeerConnection>>,
    capture: Option<Arc<dyn AudioCapture>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Resources {
    fn release(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(peer) = self.peer.take() {
            peer.close();
        }
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
    }
}

struct CallShared {
    ctx: CallContext,
    machine: Mutex<CallMachine>,
    state: watch::Sender<CallState>,
    resources: Mutex<Resources>,
    /// Bumped by every join and leave; a driver only adopts resources for
    /// the attempt it was started for.
    attempt: AtomicU64,
}

impl CallShared {
    fn handle(&self, event: CallEvent) -> Vec<CallAction> {
        let mut machine = lock(&self.machine);
        let before = machine.state();
        let actions = machine.handle(event);
        let after = machine.state();
        if before != after {
            info!(
                room_id = %self.ctx.paths.room_id(),
                participant = %self.ctx.participant_id,
                status = after.status_text(),
                "call: state changed"
            );
        }
        self.state.send_replace(after);
        actions
    }

    fn state(&self) -> CallState {
        lock(&self.machine).state()
    }

    fn peer(&self) -> Result<Arc<dyn PeerConnection>, CallError> {
        lock(&self.resources)
            .peer
            .clone()
            .ok_or_else(|| CallError::Negotiation("no peer connection".into()))
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == attempt && self.state().is_active()
    }

    // Adoption checks the attempt under the resources lock: a concurrent
    // leave() either sees the stored resource in release() or the driver
    // drops it here.

    fn track(&self, attempt: u64, task: JoinHandle<()>) {
        let mut resources = lock(&self.resources);
        if self.is_current(attempt) {
            resources.tasks.push(task);
        } else {
            task.abort();
        }
    }

    fn keep_capture(&self, attempt: u64, capture: &Arc<dyn AudioCapture>) -> bool {
        let mut resources = lock(&self.resources);
        if !self.is_current(attempt) {
            capture.stop();
            return false;
        }
        resources.capture = Some(Arc::clone(capture));
        true
    }

    fn keep_peer(&self, attempt: u64, peer: &Arc<dyn PeerConnection>) -> bool {
        let mut resources = lock(&self.resources);
        if !self.is_current(attempt) {
            peer.close();
            return false;
        }
        resources.peer = Some(Arc::clone(peer));
        true
    }

    fn release(&self) {
        lock(&self.resources).release();
    }
}

// =============================================================================
// NEGOTIATOR
// =============================================================================

/// One participant's side of the room's voice call.
pub struct CallNegotiator {
    shared: Arc<CallShared>,
    driver: Option<JoinHandle<()>>,
}

impl CallNegotiator {
    #[must_use]
    pub fn new(
        store: Arc<dyn SharedState>,
        paths: RoomPaths,
        participant_id: &str,
        media: Arc<dyn MediaBackend>,
        peer_config: PeerConfig,
    ) -> Self {
        let (state, _) = watch::channel(CallState::Idle);
        let ctx = CallContext { store, paths, participant_id: participant_id.to_owned(), media, peer_config };
        Self {
            shared: Arc::new(CallShared {
                ctx,
                machine: Mutex::new(CallMachine::new()),
                state,
                resources: Mutex::new(Resources::default()),
                attempt: AtomicU64::new(0),
            }),
            driver: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.state().status_text()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.shared.state.subscribe()
    }

    /// Start joining the call. Returns at once; progress shows up in
    /// [`CallNegotiator::watch_state`]. Does nothing when already in a call
    /// or when the session is not authorized.
    pub fn join(&mut self, authorized: bool) -> CallState {
        let actions = self.shared.handle(CallEvent::JoinRequested { authorized });
        if actions.is_empty() {
            return self.state();
        }
        if let Some(stale) = self.driver.take() {
            stale.abort();
        }
        let (events, rx) = mpsc::unbounded_channel();
        let attempt = self.shared.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let driver = Driver { shared: Arc::clone(&self.shared), events, attempt };
        self.driver = Some(tokio::spawn(driver.run(actions, rx)));
        self.state()
    }

    /// Hang up: stop background work, close the peer, release the microphone.
    pub fn leave(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.shared.attempt.fetch_add(1, Ordering::SeqCst);
        let actions = self.shared.handle(CallEvent::LeaveRequested);
        if actions.contains(&CallAction::Teardown) {
            self.shared.release();
        }
    }
}

impl Drop for CallNegotiator {
    fn drop(&mut self) {
        self.leave();
    }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver {
    shared: Arc<CallShared>,
    events: mpsc::UnboundedSender<CallEvent>,
    attempt: u64,
}

impl Driver {
    async fn run(self, initial: Vec<CallAction>, mut rx: mpsc::UnboundedReceiver<CallEvent>) {
        let mut actions: VecDeque<CallAction> = initial.into();
        loop {
            while let Some(action) = actions.pop_front() {
                if self.is_stale() {
                    return;
                }
                if !self.shared.state().is_active() && action != CallAction::Teardown {
                    continue;
                }
                let follow = match self.perform(action).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(room_id = %self.shared.ctx.paths.room_id(), error = %e, "call: join failed");
                        vec![CallEvent::Failed(e.to_string())]
                    }
                };
                if self.is_stale() {
                    return;
                }
                for event in follow {
                    actions.extend(self.shared.handle(event));
                }
            }
            if !self.shared.state().is_active() {
                break;
            }
            let Some(event) = rx.recv().await else {
                break;
            };
            if self.is_stale() {
                return;
            }
            actions.extend(self.shared.handle(event));
        }
        debug!(room_id = %self.shared.ctx.paths.room_id(), "call: driver finished");
    }

    /// A leave or a newer join has superseded this driver.
    fn is_stale(&self) -> bool {
        self.shared.attempt.load(Ordering::SeqCst) != self.attempt
    }

    async fn perform(&self, action: CallAction) -> Result<Vec<CallEvent>, CallError> {
        match action {
            CallAction::OpenMedia => self.open_media().await,
            CallAction::BeginOffer => self.begin_offer().await,
            CallAction::BeginAnswer(offer) => self.begin_answer(&offer).await,
            CallAction::ApplyAnswer(answer) => self.apply_answer(&answer).await,
            CallAction::AddCandidate(candidate) => {
                self.add_candidate(&candidate).await;
                Ok(Vec::new())
            }
            CallAction::Teardown => {
                self.shared.release();
                Ok(Vec::new())
            }
        }
    }

    async fn open_media(&self) -> Result<Vec<CallEvent>, CallError> {
        let ctx = &self.shared.ctx;

        let capture: Arc<dyn AudioCapture> = Arc::from(ctx.media.capture_audio().await?);
        if !self.shared.keep_capture(self.attempt, &capture) {
            return Ok(Vec::new());
        }

        let (peer, peer_events) = ctx.media.create_peer(&ctx.peer_config).await?;
        let peer: Arc<dyn PeerConnection> = Arc::from(peer);
        if !self.shared.keep_peer(self.attempt, &peer) {
            return Ok(Vec::new());
        }
        self.shared
            .track(self.attempt, tokio::spawn(forward_peer_events(Arc::clone(&self.shared), peer_events)));

        peer.add_local_audio(capture.as_ref()).await?;

        let offer = match ctx.store.read(&ctx.paths.call_offer()).await? {
            Some(value) => Some(decode_description(value)?),
            None => None,
        };
        Ok(vec![CallEvent::SessionRead { offer }])
    }

    async fn begin_offer(&self) -> Result<Vec<CallEvent>, CallError> {
        let ctx = &self.shared.ctx;
        let peer = self.shared.peer()?;
        let offer = peer.create_offer().await?;
        peer.set_local_description(&offer).await?;
        ctx.store.write(&ctx.paths.call_offer(), encode(&offer)?).await?;

        self.shared
            .track(self.attempt, tokio::spawn(watch_answer(Arc::clone(&self.shared), self.events.clone())));
        self.shared
            .track(self.attempt, tokio::spawn(watch_candidates(Arc::clone(&self.shared), self.events.clone())));
        Ok(Vec::new())
    }

    async fn begin_answer(&self, offer: &SessionDescription) -> Result<Vec<CallEvent>, CallError> {
        let ctx = &self.shared.ctx;
        let peer = self.shared.peer()?;
        peer.set_remote_description(offer).await?;
        let answer = peer.create_answer().await?;
        peer.set_local_description(&answer).await?;
        ctx.store.write(&ctx.paths.call_answer(), encode(&answer)?).await?;

        self.shared
            .track(self.attempt, tokio::spawn(watch_candidates(Arc::clone(&self.shared), self.events.clone())));
        Ok(vec![CallEvent::RemoteDescriptionApplied, CallEvent::AnswerPublished])
    }

    async fn apply_answer(&self, answer: &SessionDescription) -> Result<Vec<CallEvent>, CallError> {
        let peer = self.shared.peer()?;
        if peer.has_remote_description() {
            return Ok(Vec::new());
        }
        peer.set_remote_description(answer).await?;
        Ok(vec![CallEvent::RemoteDescriptionApplied])
    }

    async fn add_candidate(&self, candidate: &IceCandidate) {
        let result = match self.shared.peer() {
            Ok(peer) => peer.add_ice_candidate(candidate).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(room_id = %self.shared.ctx.paths.room_id(), error = %e, "call: skipping candidate");
        }
    }
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

/// Publish local candidates as they are discovered; route remote audio.
async fn forward_peer_events(shared: Arc<CallShared>, mut rx: mpsc::UnboundedReceiver<PeerEvent>) {
    let ctx = &shared.ctx;
    while let Some(event) = rx.recv().await {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                let published = match (ctx.paths.call_candidates_for(&ctx.participant_id), encode(&candidate)) {
                    (Ok(path), Ok(value)) => ctx.store.push(&path, value).await.map(|_| ()).map_err(CallError::from),
                    (Err(e), _) => Err(CallError::from(e)),
                    (_, Err(e)) => Err(e),
                };
                if let Err(e) = published {
                    warn!(room_id = %ctx.paths.room_id(), error = %e, "call: candidate publish failed");
                }
            }
            PeerEvent::RemoteTrack(track) => {
                debug!(room_id = %ctx.paths.room_id(), track = %track.id, "call: remote audio attached");
                ctx.media.play_remote(track);
            }
        }
    }
}

/// Feed every non-empty answer into the driver.
async fn watch_answer(shared: Arc<CallShared>, events: mpsc::UnboundedSender<CallEvent>) {
    let ctx = &shared.ctx;
    let mut subscription = match ctx.store.subscribe(&ctx.paths.call_answer(), WatchMode::Value).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = events.send(CallEvent::Failed(e.to_string()));
            return;
        }
    };
    while let Some(event) = subscription.next().await {
        let StoreEvent::Value(Some(value)) = event else {
            continue;
        };
        match decode_description(value) {
            Ok(answer) => {
                if events.send(CallEvent::AnswerReceived(answer)).is_err() {
                    return;
                }
            }
            Err(e) => warn!(room_id = %ctx.paths.room_id(), error = %e, "call: ignoring malformed answer"),
        }
    }
}

/// Feed every candidate entry of every participant into the driver.
/// The machine drops keys it has already seen.
async fn watch_candidates(shared: Arc<CallShared>, events: mpsc::UnboundedSender<CallEvent>) {
    let ctx = &shared.ctx;
    let mut subscription = match ctx.store.subscribe(&ctx.paths.call_candidates(), WatchMode::Value).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = events.send(CallEvent::Failed(e.to_string()));
            return;
        }
    };
    while let Some(event) = subscription.next().await {
        let StoreEvent::Value(Some(Value::Object(by_participant))) = event else {
            continue;
        };
        for (participant, entries) in by_participant {
            let Value::Object(entries) = entries else {
                continue;
            };
            for (candidate_id, raw) in entries {
                let key = format!("{participant}/{candidate_id}");
                match serde_json::from_value::<IceCandidate>(raw) {
                    Ok(candidate) if candidate.is_usable() => {
                        if events.send(CallEvent::CandidateReceived { key, candidate }).is_err() {
                            return;
                        }
                    }
                    Ok(_) => debug!(%key, "call: empty candidate entry"),
                    Err(e) => warn!(%key, error = %e, "call: ignoring malformed candidate"),
                }
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, CallError> {
    serde_json::to_value(value).map_err(|e| CallError::Malformed(e.to_string()))
}

fn decode_description(value: Value) -> Result<SessionDescription, CallError> {
    serde_json::from_value(value).map_err(|e| CallError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "negotiator_test.rs"]
mod tests;
