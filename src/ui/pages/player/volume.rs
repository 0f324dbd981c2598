use tracing::debug;

use super::PlayerPage;
use crate::player::types::PlaybackState;

/// Step applied by the volume up/down buttons, in percent.
pub const VOLUME_STEP: u8 = 10;

/// Tracks volume popover logic: stepping and the level to restore on unmute.
#[derive(Debug)]
pub struct VolumeControl {
    last_audible: u8,
}

impl VolumeControl {
    pub fn new(initial: u8) -> Self {
        Self {
            last_audible: if initial == 0 { 100 } else { initial.min(100) },
        }
    }

    /// Sync from canonical state. Remembers the last non-zero level.
    pub fn sync_from_player(&mut self, state: &PlaybackState) {
        if state.volume_percent > 0 {
            self.last_audible = state.volume_percent;
        }
    }

    pub fn last_audible(&self) -> u8 {
        self.last_audible
    }

    /// Increase volume by one step, capped at 100%
    pub fn volume_up(current: u8) -> u8 {
        current.saturating_add(VOLUME_STEP).min(100)
    }

    /// Decrease volume by one step, capped at 0%
    pub fn volume_down(current: u8) -> u8 {
        current.saturating_sub(VOLUME_STEP)
    }

    /// Level to restore when unmuting. A forced mute (after a rejected
    /// autoplay) also zeroes the volume, which would otherwise stay silent.
    pub fn unmute_level(&self, state: &PlaybackState) -> Option<u8> {
        (state.volume_percent == 0).then_some(self.last_audible)
    }
}

impl PlayerPage {
    pub(super) async fn handle_toggle_mute(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let state = session.state();
        if state.effective_volume() > 0 {
            debug!("Muting");
            session.set_muted(true).await;
            return;
        }

        debug!("Unmuting");
        let restore = self.volume.unmute_level(state);
        session.set_muted(false).await;
        if let Some(level) = restore {
            session.set_volume(level).await;
        }
    }

    pub(super) async fn handle_volume_step(&mut self, up: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let current = session.state().effective_volume();
        let next = if up {
            VolumeControl::volume_up(current)
        } else {
            VolumeControl::volume_down(current)
        };
        session.set_volume(next).await;
        self.volume.sync_from_player(session.state());
    }

    pub(super) async fn handle_set_volume(&mut self, percent: u8) {
        if let Some(session) = self.session.as_mut() {
            session.set_volume(percent).await;
            self.volume.sync_from_player(session.state());
        }
    }
}
