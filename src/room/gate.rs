//! Room access gate.
//!
//! The gate starts in `Loading` until the room settings arrive. Rooms with
//! no password (or no settings at all) open immediately; otherwise the gate
//! waits for a password attempt. Wrong attempts can be retried forever.

use super::registry::RoomSettings;

/// Error text shown next to the password prompt after a wrong attempt.
pub const INCORRECT_PASSWORD: &str = "Incorrect password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    AwaitingPassword { error: bool },
    Authorized,
}

/// True if `attempt` opens a room with these settings.
///
/// The comparison is exact: case-sensitive and untrimmed.
#[must_use]
pub fn password_matches(settings: Option<&RoomSettings>, attempt: &str) -> bool {
    match settings {
        Some(settings) if !settings.password().is_empty() => settings.password() == attempt,
        _ => true,
    }
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    state: GateState,
    settings: Option<RoomSettings>,
}

impl AccessGate {
    #[must_use]
    pub fn new() -> Self {
        Self { state: GateState::Loading, settings: None }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.state == GateState::Authorized
    }

    /// Feed the room settings as read from the store.
    ///
    /// Once authorized the gate stays open for the rest of the session, even
    /// if a password is set later.
    pub fn on_settings(&mut self, settings: Option<RoomSettings>) -> GateState {
        if self.state == GateState::Authorized {
            self.settings = settings;
            return self.state;
        }
        let open = settings.as_ref().is_none_or(|s| s.password().is_empty());
        self.settings = settings;
        if open {
            self.state = GateState::Authorized;
        } else if self.state == GateState::Loading {
            self.state = GateState::AwaitingPassword { error: false };
        }
        self.state
    }

    /// Try a password. Ignored unless the gate is waiting for one.
    pub fn submit(&mut self, attempt: &str) -> GateState {
        if let GateState::AwaitingPassword { .. } = self.state {
            self.state = if password_matches(self.settings.as_ref(), attempt) {
                GateState::Authorized
            } else {
                GateState::AwaitingPassword { error: true }
            };
        }
        self.state
    }

    /// Error text to display, if the last attempt was wrong.
    #[must_use]
    pub fn error_message(&self) -> Option<&'static str> {
        match self.state {
            GateState::AwaitingPassword { error: true } => Some(INCORRECT_PASSWORD),
            _ => None,
        }
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private(password: &str) -> Option<RoomSettings> {
        Some(RoomSettings::new(Some(password)))
    }

    #[test]
    fn starts_loading() {
        let gate = AccessGate::new();
        assert_eq!(gate.state(), GateState::Loading);
        assert!(!gate.is_authorized());
    }

    #[test]
    fn public_room_opens_immediately() {
        let mut gate = AccessGate::new();
        assert_eq!(gate.on_settings(Some(RoomSettings::new(None))), GateState::Authorized);
    }

    #[test]
    fn missing_settings_open_immediately() {
        let mut gate = AccessGate::new();
        assert_eq!(gate.on_settings(None), GateState::Authorized);
    }

    #[test]
    fn private_room_waits_for_password() {
        let mut gate = AccessGate::new();
        assert_eq!(gate.on_settings(private("pw")), GateState::AwaitingPassword { error: false });
        assert_eq!(gate.error_message(), None);
    }

    #[test]
    fn wrong_password_then_right_password() {
        let mut gate = AccessGate::new();
        gate.on_settings(private("Secret"));

        assert_eq!(gate.submit("secret"), GateState::AwaitingPassword { error: true });
        assert_eq!(gate.error_message(), Some("Incorrect password"));
        assert_eq!(gate.submit(" Secret"), GateState::AwaitingPassword { error: true });
        assert_eq!(gate.submit("Secret"), GateState::Authorized);
        assert_eq!(gate.error_message(), None);
    }

    #[test]
    fn submit_while_loading_is_ignored() {
        let mut gate = AccessGate::new();
        assert_eq!(gate.submit("anything"), GateState::Loading);
    }

    #[test]
    fn authorized_gate_stays_open() {
        let mut gate = AccessGate::new();
        gate.on_settings(None);
        assert_eq!(gate.on_settings(private("late")), GateState::Authorized);
    }

    #[test]
    fn password_matches_is_exact() {
        assert!(password_matches(None, ""));
        assert!(password_matches(Some(&RoomSettings::new(None)), "whatever"));
        assert!(password_matches(private("a").as_ref(), "a"));
        assert!(!password_matches(private("a").as_ref(), "A"));
        assert!(!password_matches(private("a").as_ref(), ""));
    }
}
