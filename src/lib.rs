//! Adaptive media playback controller for lesson pages.
//!
//! One player surface drives either the locally decoded media element (with an
//! optional segmented-stream demuxer underneath) or a remotely hosted player
//! widget, behind a single canonical playback state.

pub mod config;
pub mod player;
pub mod ui;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use player::{BackendKind, PlaybackSession, PlaybackState, classify};
pub use ui::pages::player::{NavigationCallbacks, PlayerInput, PlayerPage};
pub use utils::errors::PlayerError;
