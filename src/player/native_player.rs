use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, trace, warn};

use super::platform::{
    DemuxEvent, DemuxRuntime, Demuxer, ElementEvent, ListenerId, NativeMediaElement,
    PlayRejection,
};
use super::source::BackendKind;
use super::traits::{BackendEvent, EventSink, MediaBackend, PositionSource};
use crate::utils::errors::{PlayerError, PlayerResult};

/// Backend over the locally decoded media element, optionally with the
/// segmented-stream demuxer layered underneath it.
pub struct NativeBackend {
    kind: BackendKind,
    element: Arc<dyn NativeMediaElement>,
    demuxer: Option<Arc<dyn Demuxer>>,
    listener: Option<ListenerId>,
    element_forwarder: Option<AbortHandle>,
    demux_forwarder: Option<AbortHandle>,
    destroyed: bool,
}

impl NativeBackend {
    /// Attach listeners and load `reference` into the element. With a demux
    /// runtime the demuxer feeds the element instead of setting `src`.
    pub fn attach(
        kind: BackendKind,
        reference: &str,
        element: Arc<dyn NativeMediaElement>,
        demux: Option<&Arc<dyn DemuxRuntime>>,
        sink: EventSink,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = element.add_listener(tx);
        let element_forwarder =
            tokio::spawn(forward_element_events(rx, element.clone(), sink.clone()))
                .abort_handle();

        let (demuxer, demux_forwarder) = match demux {
            Some(runtime) => {
                info!("Loading {} through the demuxer", reference);
                let (demux_tx, demux_rx) = mpsc::unbounded_channel();
                let demuxer = runtime.create(demux_tx);
                demuxer.load_source(reference);
                demuxer.attach_media(&element);
                let forwarder = tokio::spawn(forward_demux_events(demux_rx, sink)).abort_handle();
                (Some(demuxer), Some(forwarder))
            }
            None => {
                info!("Loading {} into the native element", reference);
                element.set_src(reference);
                (None, None)
            }
        };

        Self {
            kind,
            element,
            demuxer,
            listener: Some(listener),
            element_forwarder: Some(element_forwarder),
            demux_forwarder,
            destroyed: false,
        }
    }

    fn stop_forwarders(&mut self) {
        if let Some(handle) = self.element_forwarder.take() {
            handle.abort();
        }
        if let Some(handle) = self.demux_forwarder.take() {
            handle.abort();
        }
    }
}

async fn forward_element_events(
    mut events: mpsc::UnboundedReceiver<ElementEvent>,
    element: Arc<dyn NativeMediaElement>,
    sink: EventSink,
) {
    while let Some(event) = events.recv().await {
        trace!("Element event: {:?}", event);
        let translated = match event {
            ElementEvent::LoadedMetadata { duration } => BackendEvent::Ready {
                duration: Some(duration),
                volume: None,
                rate: None,
            },
            ElementEvent::TimeUpdate { current_time } => BackendEvent::Position(current_time),
            ElementEvent::Progress => match element.buffered().last() {
                Some(&(_, end)) => BackendEvent::BufferedUpTo(end),
                None => continue,
            },
            ElementEvent::Play | ElementEvent::Playing => BackendEvent::Playing,
            ElementEvent::Pause => BackendEvent::Paused,
            ElementEvent::Waiting => BackendEvent::Buffering,
            ElementEvent::Seeked => BackendEvent::SeekCompleted,
            ElementEvent::Ended => BackendEvent::Ended,
            ElementEvent::Error { message } => {
                error!("Media element error: {}", message);
                BackendEvent::Error(PlayerError::BackendRuntime(message))
            }
        };
        sink.emit(translated);
    }
}

async fn forward_demux_events(mut events: mpsc::UnboundedReceiver<DemuxEvent>, sink: EventSink) {
    while let Some(event) = events.recv().await {
        match event {
            DemuxEvent::ManifestParsed => debug!("Segmented manifest parsed"),
            DemuxEvent::Error {
                fatal: true,
                details,
            } => {
                error!("Fatal demuxer error: {}", details);
                sink.emit(BackendEvent::Error(PlayerError::BackendRuntime(details)));
            }
            DemuxEvent::Error {
                fatal: false,
                details,
            } => {
                // The demuxer recovers from these on its own.
                debug!("Recoverable demuxer error: {}", details);
            }
        }
    }
}

#[async_trait]
impl MediaBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn position_source(&self) -> PositionSource {
        PositionSource::Events
    }

    async fn play(&mut self) -> PlayerResult<()> {
        if self.destroyed {
            return Ok(());
        }
        self.element.play().await.map_err(|rejection| match rejection {
            PlayRejection::NotAllowed => {
                PlayerError::AutoplayRejected("unmuted playback needs a user gesture".to_string())
            }
            PlayRejection::Other(reason) => PlayerError::BackendRuntime(reason),
        })
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        if !self.destroyed {
            self.element.pause();
        }
        Ok(())
    }

    async fn seek(&mut self, position: f64) -> PlayerResult<()> {
        if !self.destroyed {
            self.element.set_current_time(position);
        }
        Ok(())
    }

    async fn set_volume(&mut self, percent: u8) -> PlayerResult<()> {
        if !self.destroyed {
            self.element.set_volume(f64::from(percent.min(100)) / 100.0);
        }
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> PlayerResult<()> {
        if !self.destroyed {
            self.element.set_muted(muted);
        }
        Ok(())
    }

    async fn set_rate(&mut self, rate: f64) -> PlayerResult<()> {
        if !self.destroyed {
            self.element.set_playback_rate(rate);
        }
        Ok(())
    }

    async fn current_time(&self) -> Option<f64> {
        (!self.destroyed).then(|| self.element.current_time())
    }

    async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        debug!("Tearing down native backend ({})", self.kind);

        self.stop_forwarders();
        if let Some(id) = self.listener.take() {
            self.element.remove_listener(id);
        }
        if let Some(demuxer) = self.demuxer.take() {
            demuxer.destroy();
        }
        self.element.pause();
        self.element.clear_src();
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        if !self.destroyed {
            warn!("Native backend dropped without destroy, detaching listeners");
            self.stop_forwarders();
            if let Some(id) = self.listener.take() {
                self.element.remove_listener(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::session::SessionMessage;
    use crate::test_utils::{FakeDemuxRuntime, FakeElement, recording_sink, settle};

    #[tokio::test(start_paused = true)]
    async fn test_translates_element_events() {
        let element = FakeElement::new();
        let (sink, messages) = recording_sink(3);
        let _backend = NativeBackend::attach(
            BackendKind::ProgressiveFile,
            "https://cdn.example.com/a.mp4",
            element.clone(),
            None,
            sink,
        );
        assert_eq!(element.src().as_deref(), Some("https://cdn.example.com/a.mp4"));

        element.set_buffered(vec![(0.0, 5.0), (10.0, 30.0)]);
        element.emit(ElementEvent::LoadedMetadata { duration: 60.0 });
        element.emit(ElementEvent::TimeUpdate { current_time: 1.5 });
        element.emit(ElementEvent::Progress);
        element.emit(ElementEvent::Play);
        element.emit(ElementEvent::Ended);
        settle().await;

        let events: Vec<BackendEvent> = messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| match m {
                SessionMessage::Backend { generation, event } => {
                    assert_eq!(*generation, 3);
                    event.clone()
                }
                other => panic!("unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(
            events,
            vec![
                BackendEvent::Ready {
                    duration: Some(60.0),
                    volume: None,
                    rate: None
                },
                BackendEvent::Position(1.5),
                BackendEvent::BufferedUpTo(30.0),
                BackendEvent::Playing,
                BackendEvent::Ended,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_rejection_maps_to_error() {
        let element = FakeElement::new();
        element.queue_play_result(Err(PlayRejection::NotAllowed));
        let (sink, _) = recording_sink(1);
        let mut backend =
            NativeBackend::attach(BackendKind::ProgressiveFile, "a.mp4", element, None, sink);

        assert!(matches!(
            backend.play().await,
            Err(PlayerError::AutoplayRejected(_))
        ));
        assert!(backend.play().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_is_idempotent_and_detaches() {
        let element = FakeElement::new();
        let (sink, messages) = recording_sink(1);
        let mut backend =
            NativeBackend::attach(BackendKind::ProgressiveFile, "a.mp4", element.clone(), None, sink);
        assert_eq!(element.listener_count(), 1);

        backend.destroy().await;
        backend.destroy().await;
        assert_eq!(element.listener_count(), 0);
        assert_eq!(element.src(), None);
        assert_eq!(element.clear_count(), 1);

        element.emit(ElementEvent::TimeUpdate { current_time: 3.0 });
        settle().await;
        assert!(messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_demuxer_feeds_element_and_reports_fatal_errors() {
        let element = FakeElement::new();
        let runtime = FakeDemuxRuntime::new(true);
        let demux: Arc<dyn DemuxRuntime> = runtime.clone();
        let (sink, messages) = recording_sink(1);
        let mut backend = NativeBackend::attach(
            BackendKind::SegmentedStream,
            "https://cdn.example.com/master.m3u8",
            element.clone(),
            Some(&demux),
            sink,
        );

        let demuxer = runtime.last_demuxer().unwrap();
        assert_eq!(
            demuxer.loaded_source().as_deref(),
            Some("https://cdn.example.com/master.m3u8")
        );
        assert!(demuxer.is_attached());
        assert_eq!(element.src(), None);

        runtime.emit(DemuxEvent::ManifestParsed);
        runtime.emit(DemuxEvent::Error {
            fatal: false,
            details: "fragLoadError".to_string(),
        });
        runtime.emit(DemuxEvent::Error {
            fatal: true,
            details: "manifestLoadError".to_string(),
        });
        settle().await;
        assert_eq!(messages.lock().unwrap().len(), 1);

        backend.destroy().await;
        assert_eq!(demuxer.destroy_count(), 1);
    }
}
