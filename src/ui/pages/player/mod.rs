use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::player::bootstrap::{Bootstrapper, DEPENDENCY_REGISTRY};
use crate::player::platform::Platform;
use crate::player::session::{PlaybackSession, SessionContext, SessionMessage, SessionNotice};
use crate::player::source::SourceClassifier;
use crate::player::traits::Deliver;
use crate::player::types::PlaybackState;
use crate::utils::timer::TimerHandle;

mod controls_visibility;
use controls_visibility::ControlState;
pub mod fullscreen;
use fullscreen::FullscreenAdapter;
pub mod gestures;
use gestures::{TapTracker, TapZone};
mod playlist_navigation;
pub use playlist_navigation::NavigationCallbacks;
pub mod settings_menu;
use settings_menu::Popover;
pub mod volume;
use volume::VolumeControl;


/// The embeddable player surface. Owns the playback session for the current
/// reference and all ephemeral UI state around it.
pub struct PlayerPage {
    context: SessionContext,
    session: Option<PlaybackSession>,
    next_generation: u64,
    navigation: NavigationCallbacks,
    sender: mpsc::UnboundedSender<PlayerInput>,
    receiver: mpsc::UnboundedReceiver<PlayerInput>,
    // UI state - Control visibility state machine
    control_state: ControlState,
    hide_epoch: u64,
    open_popover: Option<Popover>,
    // Gesture disambiguation
    taps: TapTracker,
    tap_timer: Option<TimerHandle>,
    volume: VolumeControl,
    fullscreen: FullscreenAdapter,
    unmounted: bool,
}

impl std::fmt::Debug for PlayerPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerPage")
            .field("reference", &self.session.as_ref().map(|s| s.reference()))
            .field("control_state", &self.control_state)
            .field("open_popover", &self.open_popover)
            .field("unmounted", &self.unmounted)
            .finish()
    }
}

#[derive(Debug)]
pub enum PlayerInput {
    /// Result routed back from the current (or a stale) session.
    Session(SessionMessage),
    PlayPause,
    Play,
    Pause,
    Seek(f64),
    SkipForward,
    SkipBackward,
    SetVolume(u8),
    VolumeUp,
    VolumeDown,
    ToggleMute,
    SelectRate(f64),
    Previous,
    Next,
    PointerMoved,
    PointerEnteredControls,
    PointerLeftControls,
    Tap { x: f64, width: f64 },
    TapWindowElapsed { seq: u64 },
    HideControls { epoch: u64 }, // Triggered by inactivity timeout
    ToggleSettingsMenu,
    ToggleVolumePopover,
    DocumentClick { inside_popover: bool },
    ToggleFullscreen,
    FullscreenChanged(bool),
    Unmount,
}

/// Snapshot of the ephemeral UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffordanceState {
    pub controls_visible: bool,
    pub settings_menu_open: bool,
    pub volume_popover_open: bool,
    pub pending_tap_side: Option<TapZone>,
}

impl PlayerPage {
    /// Build a page over `platform`, sharing the process-wide dependency
    /// registry with every other page.
    pub fn new(platform: Platform, config: Config) -> Self {
        let bootstrapper = Bootstrapper::new(
            DEPENDENCY_REGISTRY.clone(),
            platform.scripts.clone(),
            platform.element.clone(),
            platform.demux.clone(),
            config.bootstrap.clone(),
        );
        let classifier = SourceClassifier::new(&config.sources);
        Self::with_context(SessionContext {
            platform,
            bootstrapper,
            classifier,
            config,
        })
    }

    pub fn with_context(context: SessionContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let fullscreen = FullscreenAdapter::new(
            context.platform.fullscreen.clone(),
            context.platform.orientation.clone(),
        );
        let volume = VolumeControl::new(context.config.playback.default_volume);
        Self {
            context,
            session: None,
            next_generation: 0,
            navigation: NavigationCallbacks::noop(),
            sender,
            receiver,
            control_state: ControlState::Visible { timer: None },
            hide_epoch: 0,
            open_popover: None,
            taps: TapTracker::default(),
            tap_timer: None,
            volume,
            fullscreen,
            unmounted: false,
        }
    }

    /// Handle for posting input from the embedding environment.
    pub fn sender(&self) -> mpsc::UnboundedSender<PlayerInput> {
        self.sender.clone()
    }

    /// Supply the reference to play and the navigation callbacks. A new
    /// reference replaces the current session; the same reference only
    /// rebuilds a session that has errored.
    pub async fn render(&mut self, reference: &str, navigation: NavigationCallbacks) {
        if self.unmounted {
            debug!("Ignoring render after unmount");
            return;
        }
        self.navigation = navigation;

        if let Some(session) = &self.session
            && session.reference() == reference
            && !session.state().is_errored()
        {
            trace!("Reference unchanged, keeping session");
            return;
        }

        self.teardown_session().await;

        self.next_generation += 1;
        let sender = self.sender.clone();
        let deliver: Deliver = Arc::new(move |message: SessionMessage| {
            let _ = sender.send(PlayerInput::Session(message));
        });
        let session =
            PlaybackSession::start(self.next_generation, reference, &self.context, deliver);
        self.volume.sync_from_player(session.state());
        self.session = Some(session);
        self.sync_controls();
    }

    async fn teardown_session(&mut self) {
        self.taps.reset();
        self.tap_timer = None;
        if let Some(mut session) = self.session.take() {
            session.destroy().await;
        }
    }

    pub async fn update(&mut self, msg: PlayerInput) {
        if self.unmounted {
            trace!("Ignoring {:?} after unmount", msg);
            return;
        }

        match msg {
            PlayerInput::Session(message) => {
                let Some(session) = self.session.as_mut() else {
                    trace!("No session for message of generation {}", message.generation());
                    return;
                };
                let notice = session.handle(message).await;
                self.volume.sync_from_player(session.state());
                match notice {
                    Some(SessionNotice::Ended) => self.handle_next_navigation(),
                    Some(SessionNotice::Errored) => info!("Playback errored, showing error state"),
                    None => {}
                }
                self.sync_controls();
            }
            PlayerInput::PlayPause => {
                if let Some(session) = self.session.as_mut() {
                    session.toggle_playback().await;
                }
            }
            PlayerInput::Play => {
                if let Some(session) = self.session.as_mut() {
                    session.play().await;
                }
            }
            PlayerInput::Pause => {
                if let Some(session) = self.session.as_mut() {
                    session.pause().await;
                }
            }
            PlayerInput::Seek(target) => {
                if let Some(session) = self.session.as_mut() {
                    session.seek(target).await;
                }
            }
            PlayerInput::SkipForward => {
                let delta = self.context.config.playback.skip_seconds;
                self.handle_skip(delta).await;
            }
            PlayerInput::SkipBackward => {
                let delta = -self.context.config.playback.skip_seconds;
                self.handle_skip(delta).await;
            }
            PlayerInput::SetVolume(percent) => self.handle_set_volume(percent).await,
            PlayerInput::VolumeUp => self.handle_volume_step(true).await,
            PlayerInput::VolumeDown => self.handle_volume_step(false).await,
            PlayerInput::ToggleMute => self.handle_toggle_mute().await,
            PlayerInput::SelectRate(rate) => self.handle_select_rate(rate).await,
            PlayerInput::Previous => self.handle_previous_navigation(),
            PlayerInput::Next => self.handle_next_navigation(),
            PlayerInput::PointerMoved => self.handle_pointer_moved(),
            PlayerInput::PointerEnteredControls => self.transition_to_hovering(),
            PlayerInput::PointerLeftControls => self.handle_pointer_left_controls(),
            PlayerInput::Tap { x, width } => self.handle_tap(x, width).await,
            PlayerInput::TapWindowElapsed { seq } => self.handle_tap_window_elapsed(seq).await,
            PlayerInput::HideControls { epoch } => self.handle_hide_timeout(epoch),
            PlayerInput::ToggleSettingsMenu => self.toggle_popover(Popover::Settings),
            PlayerInput::ToggleVolumePopover => self.toggle_popover(Popover::Volume),
            PlayerInput::DocumentClick { inside_popover } => {
                self.handle_document_click(inside_popover)
            }
            PlayerInput::ToggleFullscreen => {
                self.fullscreen.toggle();
            }
            PlayerInput::FullscreenChanged(is_fullscreen) => {
                self.fullscreen.on_change(is_fullscreen)
            }
            PlayerInput::Unmount => self.unmount().await,
        }
    }

    async fn handle_skip(&mut self, delta: f64) {
        if let Some(session) = self.session.as_mut() {
            session.skip(delta).await;
        }
        self.transition_to_visible();
    }

    /// Destroy the session and cancel every timer the page owns.
    pub async fn unmount(&mut self) {
        if self.unmounted {
            return;
        }
        info!("Unmounting player");
        self.teardown_session().await;
        self.control_state = ControlState::Visible { timer: None };
        self.open_popover = None;
        self.unmounted = true;
    }

    /// Process inputs until the page is unmounted.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            self.update(msg).await;
            if self.unmounted {
                break;
            }
        }
        debug!("Player input loop finished");
    }

    /// Apply every input that is already queued, without waiting.
    pub async fn process_pending(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            self.update(msg).await;
        }
    }

    pub fn playback_state(&self) -> Option<&PlaybackState> {
        self.session.as_ref().map(|s| s.state())
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_fullscreen()
    }

    pub fn affordance_state(&self) -> AffordanceState {
        AffordanceState {
            controls_visible: self.controls_visible(),
            settings_menu_open: self.open_popover == Some(Popover::Settings),
            volume_popover_open: self.open_popover == Some(Popover::Volume),
            pending_tap_side: self.taps.pending_zone(),
        }
    }

    pub fn is_auto_hide_armed(&self) -> bool {
        self.auto_hide_armed()
    }
}
