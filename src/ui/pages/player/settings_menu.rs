use tracing::debug;

use super::PlayerPage;
use crate::player::types::{PLAYBACK_RATES, nearest_rate};

/// Popovers attached to the control bar. At most one is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popover {
    Settings,
    Volume,
}

/// One entry of the playback-rate menu.
#[derive(Debug, Clone, PartialEq)]
pub struct RateItem {
    pub rate: f64,
    pub label: String,
    pub selected: bool,
}

pub fn rate_label(rate: f64) -> String {
    if (rate - 1.0).abs() < f64::EPSILON {
        "Normal".to_string()
    } else {
        format!("{}x", rate)
    }
}

/// Build the rate menu with a checkmark on the entry closest to `current`.
pub fn rate_items(current: f64) -> Vec<RateItem> {
    let selected = nearest_rate(current);
    PLAYBACK_RATES
        .iter()
        .map(|&rate| RateItem {
            rate,
            label: rate_label(rate),
            selected: (rate - selected).abs() < 0.01,
        })
        .collect()
}

impl PlayerPage {
    pub(super) fn toggle_popover(&mut self, popover: Popover) {
        if self.open_popover == Some(popover) {
            self.open_popover = None;
        } else {
            // Opening one closes the other.
            self.open_popover = Some(popover);
        }
        debug!("Popover now {:?}", self.open_popover);
        self.transition_to_visible();
    }

    pub(super) fn close_popovers(&mut self) {
        if self.open_popover.take().is_some() {
            debug!("Closing popover");
            self.sync_controls();
        }
    }

    /// Clicks anywhere in the document dismiss an open popover unless they
    /// land inside it.
    pub(super) fn handle_document_click(&mut self, inside_popover: bool) {
        if !inside_popover {
            self.close_popovers();
        }
    }

    pub(super) async fn handle_select_rate(&mut self, rate: f64) {
        let rate = nearest_rate(rate);
        debug!("Selected playback rate {}", rate_label(rate));
        if let Some(session) = self.session.as_mut() {
            session.set_rate(rate).await;
        }
        self.close_popovers();
    }
}
