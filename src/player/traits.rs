use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::session::SessionMessage;
use super::source::BackendKind;
use crate::utils::errors::{PlayerError, PlayerResult};

/// Backend-neutral events a backend reports to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The backend finished loading. Remote widgets report their duration,
    /// volume and rate here once; native elements only know the duration.
    Ready {
        duration: Option<f64>,
        volume: Option<u8>,
        rate: Option<f64>,
    },
    Position(f64),
    /// End of the last buffered range, in seconds.
    BufferedUpTo(f64),
    Playing,
    Paused,
    Buffering,
    Ended,
    SeekCompleted,
    Error(PlayerError),
}

/// How canonical position is obtained from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// The backend pushes position updates as events.
    Events,
    /// The session has to poll `current_time` while playing.
    Polling,
}

pub type Deliver = Arc<dyn Fn(SessionMessage) + Send + Sync>;

/// Where a backend sends its events. Every event is stamped with the generation
/// of the session that created the backend, so late events from a torn-down
/// backend can be recognized and dropped.
#[derive(Clone)]
pub struct EventSink {
    generation: u64,
    deliver: Deliver,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .finish()
    }
}

impl EventSink {
    pub fn new(generation: u64, deliver: Deliver) -> Self {
        Self {
            generation,
            deliver,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: BackendEvent) {
        (self.deliver)(SessionMessage::Backend {
            generation: self.generation,
            event,
        });
    }

    pub(crate) fn post(&self, message: SessionMessage) {
        (self.deliver)(message);
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn position_source(&self) -> PositionSource;
    /// Backends that start playback on their own (via construction flags)
    /// instead of through an initial programmatic `play()`.
    fn autoplays_itself(&self) -> bool {
        false
    }
    async fn play(&mut self) -> PlayerResult<()>;
    async fn pause(&mut self) -> PlayerResult<()>;
    async fn seek(&mut self, position: f64) -> PlayerResult<()>;
    /// Volume in percent, `0..=100`.
    async fn set_volume(&mut self, percent: u8) -> PlayerResult<()>;
    async fn set_muted(&mut self, muted: bool) -> PlayerResult<()>;
    async fn set_rate(&mut self, rate: f64) -> PlayerResult<()>;
    async fn current_time(&self) -> Option<f64>;
    /// Release everything the backend holds. Safe to call more than once.
    async fn destroy(&mut self);
}
