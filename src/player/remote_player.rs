use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, trace};

use super::platform::{RemoteState, RemoteWidget, RemoteWidgetRuntime, WidgetEvent, WidgetOptions};
use super::source::BackendKind;
use super::traits::{BackendEvent, EventSink, MediaBackend, PositionSource};
use crate::utils::errors::{PlayerError, PlayerResult};

/// Backend over the remotely hosted player widget.
///
/// The widget only reports coarse state changes, so position is polled by the
/// session while playing.
pub struct RemoteWidgetBackend {
    widget: Arc<dyn RemoteWidget>,
    forwarder: Option<AbortHandle>,
    autoplay: bool,
    destroyed: bool,
}

impl RemoteWidgetBackend {
    pub fn create(
        runtime: &Arc<dyn RemoteWidgetRuntime>,
        content_id: &str,
        options: &WidgetOptions,
        sink: EventSink,
    ) -> PlayerResult<Self> {
        info!("Creating remote widget for content {}", content_id);
        let (tx, rx) = mpsc::unbounded_channel();
        let widget = runtime
            .create(content_id, options, tx)
            .map_err(PlayerError::BackendRuntime)?;
        let forwarder = tokio::spawn(forward_widget_events(rx, widget.clone(), sink)).abort_handle();

        Ok(Self {
            widget,
            forwarder: Some(forwarder),
            autoplay: options.autoplay,
            destroyed: false,
        })
    }
}

async fn forward_widget_events(
    mut events: mpsc::UnboundedReceiver<WidgetEvent>,
    widget: Arc<dyn RemoteWidget>,
    sink: EventSink,
) {
    while let Some(event) = events.recv().await {
        let translated = match event {
            WidgetEvent::Ready => {
                // Read once; position is polled afterwards.
                let duration = widget.duration();
                BackendEvent::Ready {
                    duration: (duration.is_finite() && duration > 0.0).then_some(duration),
                    volume: Some(widget.volume().min(100)),
                    rate: Some(widget.playback_rate()),
                }
            }
            WidgetEvent::StateChange(state) => match state {
                RemoteState::Playing => BackendEvent::Playing,
                RemoteState::Paused => BackendEvent::Paused,
                RemoteState::Ended => BackendEvent::Ended,
                RemoteState::Buffering => BackendEvent::Buffering,
                RemoteState::Unstarted | RemoteState::Cued => {
                    trace!("Ignoring remote state {:?}", state);
                    continue;
                }
            },
            WidgetEvent::Error { code } => {
                let message = describe_widget_error(code);
                error!("Remote widget error {}: {}", code, message);
                BackendEvent::Error(PlayerError::BackendRuntime(message))
            }
        };
        sink.emit(translated);
    }
}

/// Readable message for the widget's numeric error codes.
pub fn describe_widget_error(code: i32) -> String {
    match code {
        2 => "the content identifier is invalid".to_string(),
        5 => "the hosted player cannot play this content".to_string(),
        100 => "the content was removed or is private".to_string(),
        101 | 150 => "the owner does not allow embedded playback".to_string(),
        other => format!("remote player error {}", other),
    }
}

#[async_trait]
impl MediaBackend for RemoteWidgetBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteWidget
    }

    fn position_source(&self) -> PositionSource {
        PositionSource::Polling
    }

    fn autoplays_itself(&self) -> bool {
        self.autoplay
    }

    async fn play(&mut self) -> PlayerResult<()> {
        if !self.destroyed {
            self.widget.play();
        }
        Ok(())
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        if !self.destroyed {
            self.widget.pause();
        }
        Ok(())
    }

    async fn seek(&mut self, position: f64) -> PlayerResult<()> {
        if !self.destroyed {
            self.widget.seek_to(position);
        }
        Ok(())
    }

    async fn set_volume(&mut self, percent: u8) -> PlayerResult<()> {
        if !self.destroyed {
            self.widget.set_volume(percent.min(100));
        }
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> PlayerResult<()> {
        if !self.destroyed {
            if muted {
                self.widget.mute();
            } else {
                self.widget.unmute();
            }
        }
        Ok(())
    }

    async fn set_rate(&mut self, rate: f64) -> PlayerResult<()> {
        if !self.destroyed {
            self.widget.set_playback_rate(rate);
        }
        Ok(())
    }

    async fn current_time(&self) -> Option<f64> {
        if self.destroyed {
            return None;
        }
        let t = self.widget.current_time();
        t.is_finite().then_some(t)
    }

    async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        debug!("Destroying remote widget");
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        self.widget.destroy();
    }
}

impl Drop for RemoteWidgetBackend {
    fn drop(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        if !self.destroyed {
            self.destroyed = true;
            debug!("Remote widget dropped without destroy, destroying it");
            self.widget.destroy();
        }
    }
}
