//! Platform primitives and external runtimes the controller drives.
//!
//! Everything in here is provided by the embedding environment. The controller
//! only ever talks to these traits, which keeps the playback logic testable
//! against recording fakes.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ScriptSpec;

/// Events the native media element emits.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate { current_time: f64 },
    /// More data was buffered; query `buffered()` for the ranges.
    Progress,
    Play,
    Pause,
    Waiting,
    Playing,
    Seeked,
    Ended,
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Reason a programmatic `play()` was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayRejection {
    /// Autoplay policy refused unmuted playback without a user gesture.
    NotAllowed,
    Other(String),
}

#[async_trait]
pub trait NativeMediaElement: Send + Sync {
    fn set_src(&self, src: &str);
    /// Remove the source and release the decoder.
    fn clear_src(&self);
    fn can_play_type(&self, mime: &str) -> bool;
    async fn play(&self) -> Result<(), PlayRejection>;
    fn pause(&self);
    fn set_current_time(&self, seconds: f64);
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    /// Volume in `[0, 1]`.
    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
    fn set_playback_rate(&self, rate: f64);
    /// Buffered time ranges as `(start, end)` pairs in seconds.
    fn buffered(&self) -> Vec<(f64, f64)>;
    fn add_listener(&self, listener: mpsc::UnboundedSender<ElementEvent>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLoadError {
    Network(String),
}

/// Loader for dynamically injected scripts.
pub trait ScriptLoader: Send + Sync {
    /// Whether a global symbol (e.g. `YT.Player`) is already installed.
    fn global_present(&self, global: &str) -> bool;
    /// Inject the script node and, if configured, its ready callback. The future
    /// resolves on the ready callback (or load event) and rejects on load error.
    /// It may never resolve.
    fn inject(&self, script: &ScriptSpec) -> BoxFuture<'static, Result<(), ScriptLoadError>>;
    /// Remove the script node and any global callback installed for it.
    /// Must be safe to call when nothing was injected.
    fn remove(&self, script: &ScriptSpec);
}

/// State codes delivered by the remote widget's state-change callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl RemoteState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(RemoteState::Unstarted),
            0 => Some(RemoteState::Ended),
            1 => Some(RemoteState::Playing),
            2 => Some(RemoteState::Paused),
            3 => Some(RemoteState::Buffering),
            5 => Some(RemoteState::Cued),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Ready,
    StateChange(RemoteState),
    Error { code: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetOptions {
    pub autoplay: bool,
    pub chromeless: bool,
    pub suppress_branding: bool,
}

/// Remote-control surface of a hosted player widget.
pub trait RemoteWidget: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn seek_to(&self, seconds: f64);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    /// Volume in percent, `0..=100`.
    fn volume(&self) -> u8;
    fn set_volume(&self, percent: u8);
    fn mute(&self);
    fn unmute(&self);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    fn destroy(&self);
}

/// The remote SDK's constructor entry point, usable once the SDK is provisioned.
pub trait RemoteWidgetRuntime: Send + Sync {
    fn create(
        &self,
        content_id: &str,
        options: &WidgetOptions,
        events: mpsc::UnboundedSender<WidgetEvent>,
    ) -> Result<Arc<dyn RemoteWidget>, String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DemuxEvent {
    ManifestParsed,
    Error { fatal: bool, details: String },
}

pub trait Demuxer: Send + Sync {
    fn load_source(&self, url: &str);
    fn attach_media(&self, element: &Arc<dyn NativeMediaElement>);
    fn destroy(&self);
}

pub trait DemuxRuntime: Send + Sync {
    /// Runtime feature check (MediaSource support and friends).
    fn is_supported(&self) -> bool;
    fn create(&self, events: mpsc::UnboundedSender<DemuxEvent>) -> Arc<dyn Demuxer>;
}

/// One vendor variant of the fullscreen request/exit API.
pub trait FullscreenEntryPoint: Send + Sync {
    fn name(&self) -> &str;
    fn request(&self) -> Result<(), String>;
    fn exit(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

pub trait OrientationLock: Send + Sync {
    fn lock(&self, orientation: Orientation) -> Result<(), String>;
    fn unlock(&self);
}

/// Everything the player needs from its environment.
#[derive(Clone)]
pub struct Platform {
    pub element: Arc<dyn NativeMediaElement>,
    pub scripts: Arc<dyn ScriptLoader>,
    pub remote_widgets: Arc<dyn RemoteWidgetRuntime>,
    pub demux: Arc<dyn DemuxRuntime>,
    pub fullscreen: Vec<Arc<dyn FullscreenEntryPoint>>,
    pub orientation: Arc<dyn OrientationLock>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("fullscreen_variants", &self.fullscreen.len())
            .finish_non_exhaustive()
    }
}
