use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use super::bootstrap::{BootstrapState, Bootstrapper, Provisioned};
use super::factory::create_backend;
use super::platform::Platform;
use super::source::{BackendKind, SourceClassifier};
use super::traits::{BackendEvent, Deliver, EventSink, MediaBackend, PositionSource};
use super::types::{PlaybackState, RenderState};
use crate::config::Config;
use crate::utils::errors::{PlayerError, PlayerResult};
use crate::utils::timer::{ControlFlow, TimerHandle};

const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 4.0;

/// Asynchronous results flowing back into a session. Each carries the
/// generation of the session it belongs to.
#[derive(Debug)]
pub enum SessionMessage {
    BootstrapFinished {
        generation: u64,
        result: PlayerResult<Provisioned>,
    },
    Backend {
        generation: u64,
        event: BackendEvent,
    },
    PollTick {
        generation: u64,
    },
    SeekSettled {
        generation: u64,
        seek_id: u64,
    },
}

impl SessionMessage {
    pub fn generation(&self) -> u64 {
        match self {
            SessionMessage::BootstrapFinished { generation, .. }
            | SessionMessage::Backend { generation, .. }
            | SessionMessage::PollTick { generation }
            | SessionMessage::SeekSettled { generation, .. } => *generation,
        }
    }
}

/// What the host needs to react to after a session handled a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    Ended,
    Errored,
}

/// Shared collaborators every session is built from.
#[derive(Clone)]
pub struct SessionContext {
    pub platform: Platform,
    pub bootstrapper: Bootstrapper,
    pub classifier: SourceClassifier,
    pub config: Config,
}

/// One reference being played. Owns at most one backend and every timer and
/// task it started; `destroy` releases all of them.
pub struct PlaybackSession {
    generation: u64,
    reference: String,
    kind: BackendKind,
    alive: bool,
    backend: Option<Box<dyn MediaBackend>>,
    provisioned: Option<Provisioned>,
    state: PlaybackState,
    bootstrap: BootstrapState,
    bootstrap_task: Option<AbortHandle>,
    poll_timer: Option<TimerHandle>,
    seek_timer: Option<TimerHandle>,
    seeking: bool,
    seek_seq: u64,
    /// Set by the end of media, cleared by playing or seeking again.
    ended: bool,
    sink: EventSink,
    context: SessionContext,
}

impl PlaybackSession {
    /// Classify `reference` and start provisioning its backend.
    pub fn start(
        generation: u64,
        reference: &str,
        context: &SessionContext,
        deliver: Deliver,
    ) -> Self {
        let kind = context.classifier.classify(reference);
        info!(
            "Starting playback session {} for {} ({})",
            generation, reference, kind
        );

        let sink = EventSink::new(generation, deliver);
        let mut bootstrap = BootstrapState::default();
        bootstrap.begin();

        let bootstrapper = context.bootstrapper.clone();
        let task_sink = sink.clone();
        let bootstrap_task = tokio::spawn(async move {
            let result = bootstrapper.provision(kind).await;
            task_sink.post(SessionMessage::BootstrapFinished { generation, result });
        })
        .abort_handle();

        Self {
            generation,
            reference: reference.to_string(),
            kind,
            alive: true,
            backend: None,
            provisioned: None,
            state: PlaybackState::new(context.config.playback.default_volume),
            bootstrap,
            bootstrap_task: Some(bootstrap_task),
            poll_timer: None,
            seek_timer: None,
            seeking: false,
            seek_seq: 0,
            ended: false,
            sink,
            context: context.clone(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn bootstrap(&self) -> &BootstrapState {
        &self.bootstrap
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_some()
    }

    /// Apply an asynchronous result. Messages for another generation, or
    /// arriving after `destroy`, are dropped without touching state.
    pub async fn handle(&mut self, message: SessionMessage) -> Option<SessionNotice> {
        if !self.alive || message.generation() != self.generation {
            trace!(
                "Dropping stale message for generation {} (current {}, alive {})",
                message.generation(),
                self.generation,
                self.alive
            );
            return None;
        }

        match message {
            SessionMessage::BootstrapFinished { result, .. } => {
                self.bootstrap_task = None;
                self.on_bootstrap_finished(result).await
            }
            SessionMessage::Backend { event, .. } => self.apply_event(event),
            SessionMessage::PollTick { .. } => {
                self.poll_position().await;
                None
            }
            SessionMessage::SeekSettled { seek_id, .. } => {
                if seek_id == self.seek_seq {
                    trace!("Seek {} settled, resuming position polling", seek_id);
                    self.seeking = false;
                    self.seek_timer = None;
                }
                None
            }
        }
    }

    async fn on_bootstrap_finished(
        &mut self,
        result: PlayerResult<Provisioned>,
    ) -> Option<SessionNotice> {
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());
        if !self.bootstrap.settle(outcome) {
            debug!("Bootstrap for session {} already settled", self.generation);
            return None;
        }

        let provisioned = match result {
            Ok(provisioned) => provisioned,
            Err(e) => return Some(self.fail(e)),
        };

        let backend = create_backend(
            &provisioned,
            &self.reference,
            &self.context.platform,
            &self.context.classifier,
            &self.context.config,
            self.sink.clone(),
        );

        match backend {
            Ok(backend) => {
                // Leases on the loaded dependencies live as long as the backend.
                self.provisioned = Some(provisioned);
                self.backend = Some(backend);
                self.apply_pending_settings().await;
                if self.context.config.playback.autoplay {
                    self.start_initial_playback().await;
                }
                None
            }
            Err(e) => Some(self.fail(e)),
        }
    }

    /// Volume and rate chosen before the backend existed.
    async fn apply_pending_settings(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if self.state.volume_percent != 100
            && let Err(e) = backend.set_volume(self.state.volume_percent).await
        {
            warn!("Applying pending volume failed: {}", e);
        }
        if self.state.muted
            && let Err(e) = backend.set_muted(true).await
        {
            warn!("Applying pending mute failed: {}", e);
        }
        if self.state.playback_rate != 1.0
            && let Err(e) = backend.set_rate(self.state.playback_rate).await
        {
            warn!("Applying pending rate failed: {}", e);
        }
    }

    async fn start_initial_playback(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if backend.autoplays_itself() {
            return;
        }

        match backend.play().await {
            Ok(()) => {}
            Err(PlayerError::AutoplayRejected(reason)) => {
                info!("Autoplay rejected ({}), retrying muted", reason);
                if let Err(e) = backend.set_muted(true).await {
                    warn!("Muting for autoplay retry failed: {}", e);
                }
                if let Err(e) = backend.set_volume(0).await {
                    warn!("Zeroing volume for autoplay retry failed: {}", e);
                }
                self.state.muted = true;
                self.state.volume_percent = 0;
                if let Err(e) = backend.play().await {
                    warn!("Muted autoplay retry failed: {}", e);
                }
            }
            Err(e) => warn!("Initial playback failed: {}", e),
        }
    }

    fn apply_event(&mut self, event: BackendEvent) -> Option<SessionNotice> {
        if self.state.is_errored() {
            trace!("Ignoring {:?} on errored session", event);
            return None;
        }

        match event {
            BackendEvent::Ready {
                duration,
                volume,
                rate,
            } => {
                if let Some(duration) = duration {
                    self.state.set_duration(duration);
                }
                if let Some(volume) = volume {
                    self.state.volume_percent = volume.min(100);
                }
                if let Some(rate) = rate {
                    self.state.playback_rate = rate;
                }
                self.state.render_state = RenderState::Ready;
            }
            BackendEvent::Position(position) => self.state.set_position(position),
            BackendEvent::BufferedUpTo(end) => self.state.set_buffered_end(end),
            BackendEvent::Playing => {
                self.ended = false;
                self.state.is_playing = true;
                self.state.render_state = RenderState::Ready;
                self.start_polling();
            }
            BackendEvent::Paused => {
                self.state.is_playing = false;
                self.stop_polling();
            }
            BackendEvent::Buffering => self.state.render_state = RenderState::Buffering,
            BackendEvent::SeekCompleted => self.arm_seek_grace(),
            BackendEvent::Ended => {
                if self.ended {
                    trace!("Ignoring repeated end of {}", self.reference);
                    return None;
                }
                self.ended = true;
                info!("Playback of {} ended", self.reference);
                self.state.is_playing = false;
                if let Some(duration) = self.state.duration_seconds {
                    self.state.position_seconds = duration;
                }
                self.stop_polling();
                return Some(SessionNotice::Ended);
            }
            BackendEvent::Error(e) if e.is_terminal() => return Some(self.fail(e)),
            BackendEvent::Error(e) => warn!("Recoverable backend error: {}", e),
        }
        None
    }

    fn fail(&mut self, error: PlayerError) -> SessionNotice {
        warn!("Session {} failed: {}", self.generation, error);
        self.state.last_error = Some(error);
        self.state.render_state = RenderState::Errored;
        self.state.is_playing = false;
        self.stop_polling();
        self.seeking = false;
        self.seek_timer = None;
        SessionNotice::Errored
    }

    fn start_polling(&mut self) {
        let polls = self
            .backend
            .as_ref()
            .is_some_and(|b| b.position_source() == PositionSource::Polling);
        if !polls || self.poll_timer.is_some() {
            return;
        }
        let sink = self.sink.clone();
        let generation = self.generation;
        self.poll_timer = Some(TimerHandle::interval(
            "position-poll",
            self.context.config.playback.poll_interval(),
            move || {
                sink.post(SessionMessage::PollTick { generation });
                ControlFlow::Continue
            },
        ));
    }

    fn stop_polling(&mut self) {
        if let Some(timer) = self.poll_timer.take() {
            timer.cancel();
        }
    }

    async fn poll_position(&mut self) {
        if self.seeking || !self.state.is_playing {
            return;
        }
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Some(position) = backend.current_time().await {
            self.state.set_position(position);
        }
    }

    fn arm_seek_grace(&mut self) {
        if !self.seeking {
            return;
        }
        let sink = self.sink.clone();
        let generation = self.generation;
        let seek_id = self.seek_seq;
        self.seek_timer = Some(TimerHandle::once(
            "seek-grace",
            self.context.config.playback.seek_grace(),
            move || sink.post(SessionMessage::SeekSettled { generation, seek_id }),
        ));
    }

    fn transport_ready(&self, operation: &str) -> bool {
        if !self.alive || self.state.is_errored() {
            trace!("Ignoring {} on inactive session", operation);
            return false;
        }
        if self.backend.is_none() {
            debug!("Ignoring {} before the backend is ready", operation);
            return false;
        }
        true
    }

    pub async fn play(&mut self) {
        if !self.transport_ready("play") {
            return;
        }
        if let Some(backend) = self.backend.as_mut()
            && let Err(e) = backend.play().await
        {
            warn!("Play request failed: {}", e);
        }
    }

    pub async fn pause(&mut self) {
        if !self.transport_ready("pause") {
            return;
        }
        if let Some(backend) = self.backend.as_mut()
            && let Err(e) = backend.pause().await
        {
            warn!("Pause request failed: {}", e);
        }
    }

    pub async fn toggle_playback(&mut self) {
        if self.state.is_playing {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    /// Seek to `target` seconds, clamped into `[0, duration]`. Position is
    /// updated optimistically and polling is suspended until the seek settles.
    pub async fn seek(&mut self, target: f64) {
        if !self.transport_ready("seek") {
            return;
        }
        let target = self.state.clamp_position(target);
        self.state.position_seconds = target;
        self.ended = false;
        self.seeking = true;
        self.seek_seq += 1;
        trace!("Seek {} to {:.2}s", self.seek_seq, target);

        if let Some(backend) = self.backend.as_mut()
            && let Err(e) = backend.seek(target).await
        {
            warn!("Seek request failed: {}", e);
        }
        // Backends without a completion event settle after the grace period;
        // a later SeekCompleted re-arms it.
        self.arm_seek_grace();
    }

    pub async fn skip(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        let target = self.state.position_seconds + delta;
        self.seek(target).await;
    }

    /// Set volume in percent. Before the backend exists the value is kept and
    /// applied on attach.
    pub async fn set_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.state.volume_percent = percent;
        let unmute = self.state.muted && percent > 0;
        if unmute {
            self.state.muted = false;
        }
        if !self.alive {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.set_volume(percent).await {
                warn!("Volume change failed: {}", e);
            }
            if unmute && let Err(e) = backend.set_muted(false).await {
                warn!("Unmute failed: {}", e);
            }
        }
    }

    pub async fn set_muted(&mut self, muted: bool) {
        self.state.muted = muted;
        if !self.alive {
            return;
        }
        if let Some(backend) = self.backend.as_mut()
            && let Err(e) = backend.set_muted(muted).await
        {
            warn!("Mute change failed: {}", e);
        }
    }

    pub async fn set_rate(&mut self, rate: f64) {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        };
        self.state.playback_rate = rate;
        if !self.alive {
            return;
        }
        if let Some(backend) = self.backend.as_mut()
            && let Err(e) = backend.set_rate(rate).await
        {
            warn!("Rate change failed: {}", e);
        }
    }

    /// Release the backend, cancel the bootstrap, poll and seek timers. Safe to
    /// call more than once.
    pub async fn destroy(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        info!("Destroying playback session {}", self.generation);

        if let Some(task) = self.bootstrap_task.take() {
            task.abort();
            self.bootstrap.settle(Err(PlayerError::BootstrapLoadFailure {
                dependency: self.kind.to_string(),
                reason: "session destroyed before provisioning finished".to_string(),
            }));
        }
        self.stop_polling();
        self.seek_timer = None;
        self.seeking = false;
        self.state.is_playing = false;

        if let Some(mut backend) = self.backend.take() {
            backend.destroy().await;
        }
        self.provisioned = None;
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(task) = self.bootstrap_task.take() {
            task.abort();
        }
    }
}
