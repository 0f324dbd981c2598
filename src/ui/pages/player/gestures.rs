use tracing::{debug, trace};

use super::{PlayerInput, PlayerPage};
use crate::utils::timer::TimerHandle;

/// Horizontal third of the player surface a tap landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapZone {
    Left,
    Center,
    Right,
}

impl TapZone {
    pub fn from_position(x: f64, width: f64) -> Self {
        if !width.is_finite() || width <= 0.0 || !x.is_finite() {
            return TapZone::Center;
        }
        let third = width / 3.0;
        if x < third {
            TapZone::Left
        } else if x >= width - third {
            TapZone::Right
        } else {
            TapZone::Center
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    TogglePlayback,
    SkipBackward,
    SkipForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Idle,
    /// A side tap waiting out the double-tap window. `seq` identifies the
    /// window timer that may commit it.
    PendingSingleTap { zone: TapZone, seq: u64 },
}

/// Result of feeding one tap into the tracker.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TapOutcome {
    pub actions: Vec<GestureAction>,
    /// Start a double-tap window for this sequence number.
    pub arm_window: Option<u64>,
}

/// Disambiguates single taps (toggle) from double taps (skip) on the side
/// zones. Center taps never wait.
#[derive(Debug)]
pub struct TapTracker {
    state: TapState,
    next_seq: u64,
}

impl Default for TapTracker {
    fn default() -> Self {
        Self {
            state: TapState::Idle,
            next_seq: 0,
        }
    }
}

impl TapTracker {
    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn pending_zone(&self) -> Option<TapZone> {
        match self.state {
            TapState::PendingSingleTap { zone, .. } => Some(zone),
            TapState::Idle => None,
        }
    }

    pub fn tap(&mut self, zone: TapZone) -> TapOutcome {
        let mut outcome = TapOutcome::default();

        if let TapState::PendingSingleTap { zone: pending, .. } = self.state {
            self.state = TapState::Idle;
            if pending == zone {
                outcome.actions.push(match zone {
                    TapZone::Left => GestureAction::SkipBackward,
                    _ => GestureAction::SkipForward,
                });
                return outcome;
            }
            // A tap elsewhere ends the window early.
            outcome.actions.push(GestureAction::TogglePlayback);
        }

        match zone {
            TapZone::Center => outcome.actions.push(GestureAction::TogglePlayback),
            TapZone::Left | TapZone::Right => {
                self.next_seq += 1;
                self.state = TapState::PendingSingleTap {
                    zone,
                    seq: self.next_seq,
                };
                outcome.arm_window = Some(self.next_seq);
            }
        }
        outcome
    }

    /// The double-tap window `seq` ran out. Commits the pending single tap if it
    /// is still the one that armed this window.
    pub fn window_elapsed(&mut self, seq: u64) -> Option<GestureAction> {
        match self.state {
            TapState::PendingSingleTap { seq: pending, .. } if pending == seq => {
                self.state = TapState::Idle;
                Some(GestureAction::TogglePlayback)
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = TapState::Idle;
    }
}

impl PlayerPage {
    pub(super) async fn handle_tap(&mut self, x: f64, width: f64) {
        let zone = TapZone::from_position(x, width);
        trace!("Tap at {:.0}/{:.0} in {:?} zone", x, width, zone);
        self.transition_to_visible();

        let outcome = self.taps.tap(zone);
        if let Some(seq) = outcome.arm_window {
            let sender = self.sender.clone();
            self.tap_timer = Some(TimerHandle::once(
                "double-tap-window",
                self.context.config.playback.double_tap_window(),
                move || {
                    let _ = sender.send(PlayerInput::TapWindowElapsed { seq });
                },
            ));
        } else if self.taps.pending_zone().is_none()
            && let Some(timer) = self.tap_timer.take()
        {
            timer.cancel();
        }

        for action in outcome.actions {
            self.apply_gesture(action).await;
        }
    }

    pub(super) async fn handle_tap_window_elapsed(&mut self, seq: u64) {
        if let Some(action) = self.taps.window_elapsed(seq) {
            self.tap_timer = None;
            self.apply_gesture(action).await;
        }
    }

    async fn apply_gesture(&mut self, action: GestureAction) {
        debug!("Gesture: {:?}", action);
        let skip = self.context.config.playback.skip_seconds;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match action {
            GestureAction::TogglePlayback => session.toggle_playback().await,
            GestureAction::SkipBackward => session.skip(-skip).await,
            GestureAction::SkipForward => session.skip(skip).await,
        }
    }
}
