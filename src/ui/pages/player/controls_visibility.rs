use tracing::{debug, trace};

use super::{PlayerInput, PlayerPage};
use crate::utils::timer::TimerHandle;

/// Control visibility state machine states
#[derive(Debug)]
pub(super) enum ControlState {
    /// Controls are hidden
    Hidden,
    /// Controls are visible; the auto-hide timer runs only while playing
    Visible { timer: Option<TimerHandle> },
    /// Controls are visible because the pointer rests on them
    Hovering,
}

/// Control visibility state machine implementation
impl PlayerPage {
    /// Whether the auto-hide timer may run right now.
    pub(super) fn can_auto_hide(&self) -> bool {
        if self.open_popover.is_some() {
            return false;
        }
        self.session
            .as_ref()
            .is_some_and(|s| s.state().is_playing && !s.state().needs_attention())
    }

    /// Transition to the Hidden state
    pub(super) fn transition_to_hidden(&mut self) {
        if !self.can_auto_hide() {
            debug!("Playback needs attention or a popover is open, keeping controls visible");
            return;
        }
        self.control_state = ControlState::Hidden;
    }

    /// Transition to the Visible state, rescheduling auto-hide
    pub(super) fn transition_to_visible(&mut self) {
        if matches!(self.control_state, ControlState::Hovering) {
            return;
        }
        // Replacing the state drops (and aborts) any previous timer.
        self.control_state = ControlState::Visible {
            timer: self.arm_hide_timer(),
        };
    }

    /// Transition to the Hovering state
    pub(super) fn transition_to_hovering(&mut self) {
        self.control_state = ControlState::Hovering;
    }

    fn arm_hide_timer(&mut self) -> Option<TimerHandle> {
        if !self.can_auto_hide() {
            return None;
        }
        self.hide_epoch += 1;
        let epoch = self.hide_epoch;
        let sender = self.sender.clone();
        trace!("Arming auto-hide (epoch {})", epoch);
        Some(TimerHandle::once(
            "auto-hide",
            self.context.config.playback.auto_hide_delay(),
            move || {
                let _ = sender.send(PlayerInput::HideControls { epoch });
            },
        ))
    }

    /// Re-evaluate visibility after playback or popover state changed.
    pub(super) fn sync_controls(&mut self) {
        let can_hide = self.can_auto_hide();
        match &self.control_state {
            ControlState::Hidden if !can_hide => {
                self.control_state = ControlState::Visible { timer: None };
            }
            ControlState::Visible { timer: Some(_) } if !can_hide => {
                self.control_state = ControlState::Visible { timer: None };
            }
            ControlState::Visible { timer: None } if can_hide => self.transition_to_visible(),
            _ => {}
        }
    }

    pub(super) fn handle_hide_timeout(&mut self, epoch: u64) {
        if epoch != self.hide_epoch {
            trace!("Ignoring stale auto-hide (epoch {})", epoch);
            return;
        }
        // Only hide from Visible, never while hovering.
        if matches!(self.control_state, ControlState::Visible { .. }) {
            self.transition_to_hidden();
        }
    }

    pub(super) fn handle_pointer_moved(&mut self) {
        match self.control_state {
            ControlState::Hidden | ControlState::Visible { .. } => self.transition_to_visible(),
            ControlState::Hovering => {}
        }
    }

    pub(super) fn handle_pointer_left_controls(&mut self) {
        if matches!(self.control_state, ControlState::Hovering) {
            self.control_state = ControlState::Visible { timer: None };
            self.transition_to_visible();
        }
    }

    /// Check if controls should be visible
    pub(super) fn controls_visible(&self) -> bool {
        !matches!(self.control_state, ControlState::Hidden)
    }

    pub(super) fn auto_hide_armed(&self) -> bool {
        matches!(self.control_state, ControlState::Visible { timer: Some(_) })
    }
}
