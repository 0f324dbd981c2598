//! Canonical playback state shared by both backends

use crate::utils::errors::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Provisioning dependencies or waiting for the backend to load.
    Loading,
    /// Backend is usable; playing or paused is tracked by `is_playing`.
    Ready,
    /// Backend reported it is starved for data.
    Buffering,
    /// Terminal until a new reference is supplied.
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub buffered_fraction: f64,
    pub volume_percent: u8,
    pub muted: bool,
    pub playback_rate: f64,
    pub last_error: Option<PlayerError>,
    pub render_state: RenderState,
}

pub const PLAYBACK_RATES: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

impl PlaybackState {
    pub fn new(volume_percent: u8) -> Self {
        Self {
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: None,
            buffered_fraction: 0.0,
            volume_percent: volume_percent.min(100),
            muted: false,
            playback_rate: 1.0,
            last_error: None,
            render_state: RenderState::Loading,
        }
    }

    /// Clamp a target position into `[0, duration]` (or `[0, ∞)` before the
    /// duration is known).
    pub fn clamp_position(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        match self.duration_seconds {
            Some(duration) => seconds.min(duration),
            None => seconds,
        }
    }

    pub fn set_position(&mut self, seconds: f64) {
        self.position_seconds = self.clamp_position(seconds);
    }

    pub fn set_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.duration_seconds = Some(seconds);
            self.position_seconds = self.clamp_position(self.position_seconds);
        }
    }

    pub fn set_buffered_end(&mut self, end: f64) {
        if let Some(duration) = self.duration_seconds
            && end.is_finite()
        {
            self.buffered_fraction = (end / duration).clamp(0.0, 1.0);
        }
    }

    pub fn is_errored(&self) -> bool {
        self.render_state == RenderState::Errored
    }

    /// Loading, buffering and errored states keep the controls on screen.
    pub fn needs_attention(&self) -> bool {
        self.render_state != RenderState::Ready
    }

    /// Volume as heard, accounting for mute.
    pub fn effective_volume(&self) -> u8 {
        if self.muted { 0 } else { self.volume_percent }
    }
}

/// Snap a requested rate to the closest supported choice.
pub fn nearest_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 1.0;
    }
    PLAYBACK_RATES
        .iter()
        .copied()
        .min_by(|a, b| (a - rate).abs().total_cmp(&(b - rate).abs()))
        .unwrap_or(1.0)
}
