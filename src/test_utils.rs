#![cfg(test)]

//! Recording fakes for the platform traits and small async helpers.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use crate::config::{Config, ScriptSpec};
use crate::player::bootstrap::{Bootstrapper, DependencyRegistry};
use crate::player::platform::{
    DemuxEvent, DemuxRuntime, Demuxer, ElementEvent, FullscreenEntryPoint, ListenerId,
    NativeMediaElement, Orientation, OrientationLock, Platform, PlayRejection, RemoteState,
    RemoteWidget, RemoteWidgetRuntime, ScriptLoadError, ScriptLoader, WidgetEvent, WidgetOptions,
};
use crate::player::session::{SessionContext, SessionMessage};
use crate::player::source::SourceClassifier;
use crate::player::traits::EventSink;

/// Let spawned forwarders and timers run until they block again.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Event sink that records every message it is handed.
pub fn recording_sink(generation: u64) -> (EventSink, Arc<Mutex<Vec<SessionMessage>>>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let recorded = messages.clone();
    let sink = EventSink::new(
        generation,
        Arc::new(move |message: SessionMessage| {
            recorded.lock().unwrap().push(message)
        }),
    );
    (sink, messages)
}

type LoadResult = Result<(), ScriptLoadError>;

#[derive(Default)]
struct ScriptState {
    globals: HashSet<String>,
    spec_globals: HashMap<String, String>,
    pending: HashMap<String, Vec<oneshot::Sender<LoadResult>>>,
    /// Resolved before anything was injected; the next injection loads at once.
    resolved_early: HashSet<String>,
    injections: usize,
    removals: HashMap<String, usize>,
}

/// Script loader whose injections stay pending until the test resolves or
/// fails them by dependency name.
#[derive(Default)]
pub struct FakeScriptLoader {
    state: Mutex<ScriptState>,
}

impl FakeScriptLoader {
    pub fn install_global(&self, global: &str) {
        self.state.lock().unwrap().globals.insert(global.to_string());
    }

    /// Fire the ready callback of every pending injection of `name`. With
    /// nothing injected yet, the next injection of `name` loads immediately.
    pub fn resolve(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(pending) = state.pending.remove(name) else {
            state.resolved_early.insert(name.to_string());
            return;
        };
        if let Some(global) = state.spec_globals.get(name).cloned() {
            state.globals.insert(global);
        }
        for tx in pending {
            let _ = tx.send(Ok(()));
        }
    }

    pub fn fail(&self, name: &str, reason: &str) {
        let pending = self.state.lock().unwrap().pending.remove(name);
        for tx in pending.unwrap_or_default() {
            let _ = tx.send(Err(ScriptLoadError::Network(reason.to_string())));
        }
    }

    pub fn total_injections(&self) -> usize {
        self.state.lock().unwrap().injections
    }

    pub fn removals(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .removals
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl ScriptLoader for FakeScriptLoader {
    fn global_present(&self, global: &str) -> bool {
        self.state.lock().unwrap().globals.contains(global)
    }

    fn inject(&self, script: &ScriptSpec) -> BoxFuture<'static, LoadResult> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().unwrap();
            state.injections += 1;
            state
                .spec_globals
                .insert(script.name.clone(), script.global.clone());
            if state.resolved_early.remove(&script.name) {
                state.globals.insert(script.global.clone());
                let _ = tx.send(Ok(()));
            } else {
                state.pending.entry(script.name.clone()).or_default().push(tx);
            }
        }
        async move {
            match rx.await {
                Ok(result) => result,
                // Removed script nodes never call back.
                Err(_) => futures::future::pending().await,
            }
        }
        .boxed()
    }

    fn remove(&self, script: &ScriptSpec) {
        let mut state = self.state.lock().unwrap();
        state.pending.remove(&script.name);
        state.globals.remove(&script.global);
        *state.removals.entry(script.name.clone()).or_default() += 1;
    }
}

#[derive(Default)]
struct ElementState {
    src: Option<String>,
    native_segmented: bool,
    play_results: VecDeque<Result<(), PlayRejection>>,
    play_calls: usize,
    pause_calls: usize,
    current_time: f64,
    volume: f64,
    muted: bool,
    rate_calls: Vec<f64>,
    buffered: Vec<(f64, f64)>,
    listeners: HashMap<u64, mpsc::UnboundedSender<ElementEvent>>,
    next_listener: u64,
    clear_count: usize,
}

/// Media element that records calls and emits events like a real one on
/// successful play, pause and seek.
pub struct FakeElement {
    state: Mutex<ElementState>,
}

impl FakeElement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ElementState {
                volume: 1.0,
                ..Default::default()
            }),
        })
    }

    pub fn set_native_segmented(&self, supported: bool) {
        self.state.lock().unwrap().native_segmented = supported;
    }

    pub fn queue_play_result(&self, result: Result<(), PlayRejection>) {
        self.state.lock().unwrap().play_results.push_back(result);
    }

    pub fn set_buffered(&self, ranges: Vec<(f64, f64)>) {
        self.state.lock().unwrap().buffered = ranges;
    }

    /// Deliver `event` to every attached listener.
    pub fn emit(&self, event: ElementEvent) {
        let mut state = self.state.lock().unwrap();
        if let ElementEvent::TimeUpdate { current_time } = event {
            state.current_time = current_time;
        }
        state.listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn src(&self) -> Option<String> {
        self.state.lock().unwrap().src.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().unwrap().clear_count
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().unwrap().pause_calls
    }

    pub fn position(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().unwrap().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn rate_calls(&self) -> Vec<f64> {
        self.state.lock().unwrap().rate_calls.clone()
    }
}

#[async_trait::async_trait]
impl NativeMediaElement for FakeElement {
    fn set_src(&self, src: &str) {
        self.state.lock().unwrap().src = Some(src.to_string());
    }

    fn clear_src(&self) {
        let mut state = self.state.lock().unwrap();
        state.src = None;
        state.clear_count += 1;
    }

    fn can_play_type(&self, mime: &str) -> bool {
        mime == "application/vnd.apple.mpegurl" && self.state.lock().unwrap().native_segmented
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.play_calls += 1;
            state.play_results.pop_front().unwrap_or(Ok(()))
        };
        if result.is_ok() {
            self.emit(ElementEvent::Play);
        }
        result
    }

    fn pause(&self) {
        self.state.lock().unwrap().pause_calls += 1;
        self.emit(ElementEvent::Pause);
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().unwrap().current_time = seconds;
        self.emit(ElementEvent::Seeked);
    }

    fn current_time(&self) -> f64 {
        self.position()
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().unwrap().volume = volume;
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().unwrap().rate_calls.push(rate);
    }

    fn buffered(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().buffered.clone()
    }

    fn add_listener(&self, listener: mpsc::UnboundedSender<ElementEvent>) -> ListenerId {
        let mut state = self.state.lock().unwrap();
        state.next_listener += 1;
        let id = state.next_listener;
        state.listeners.insert(id, listener);
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().unwrap().listeners.remove(&id.0);
    }
}

#[derive(Default)]
struct DemuxerState {
    source: Option<String>,
    attached: bool,
    destroy_count: usize,
}

#[derive(Default)]
pub struct FakeDemuxer {
    state: Mutex<DemuxerState>,
}

impl FakeDemuxer {
    pub fn loaded_source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().unwrap().attached
    }

    pub fn destroy_count(&self) -> usize {
        self.state.lock().unwrap().destroy_count
    }
}

impl Demuxer for FakeDemuxer {
    fn load_source(&self, url: &str) {
        self.state.lock().unwrap().source = Some(url.to_string());
    }

    fn attach_media(&self, _element: &Arc<dyn NativeMediaElement>) {
        self.state.lock().unwrap().attached = true;
    }

    fn destroy(&self) {
        let mut state = self.state.lock().unwrap();
        state.attached = false;
        state.destroy_count += 1;
    }
}

pub struct FakeDemuxRuntime {
    supported: bool,
    demuxers: Mutex<Vec<(Arc<FakeDemuxer>, mpsc::UnboundedSender<DemuxEvent>)>>,
}

impl FakeDemuxRuntime {
    pub fn new(supported: bool) -> Arc<Self> {
        Arc::new(Self {
            supported,
            demuxers: Mutex::new(Vec::new()),
        })
    }

    pub fn last_demuxer(&self) -> Option<Arc<FakeDemuxer>> {
        self.demuxers.lock().unwrap().last().map(|(d, _)| d.clone())
    }

    /// Emit from the most recently created demuxer.
    pub fn emit(&self, event: DemuxEvent) {
        if let Some((_, tx)) = self.demuxers.lock().unwrap().last() {
            let _ = tx.send(event);
        }
    }
}

impl DemuxRuntime for FakeDemuxRuntime {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, events: mpsc::UnboundedSender<DemuxEvent>) -> Arc<dyn Demuxer> {
        let demuxer = Arc::new(FakeDemuxer::default());
        self.demuxers.lock().unwrap().push((demuxer.clone(), events));
        demuxer
    }
}

#[derive(Default)]
struct WidgetState {
    duration: f64,
    volume: u8,
    rate: f64,
    current_time: f64,
    muted: bool,
    play_calls: usize,
    pause_calls: usize,
    seek_calls: Vec<f64>,
    volume_calls: Vec<u8>,
    rate_calls: Vec<f64>,
    destroy_count: usize,
}

/// Hosted widget fake. Play and pause report the matching state change the
/// way the real widget does.
pub struct FakeWidget {
    content_id: String,
    options: WidgetOptions,
    events: mpsc::UnboundedSender<WidgetEvent>,
    state: Mutex<WidgetState>,
}

impl FakeWidget {
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn options(&self) -> &WidgetOptions {
        &self.options
    }

    pub fn set_reported(&self, duration: f64, volume: u8, rate: f64) {
        let mut state = self.state.lock().unwrap();
        state.duration = duration;
        state.volume = volume;
        state.rate = rate;
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.state.lock().unwrap().current_time = seconds;
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().unwrap().pause_calls
    }

    pub fn seek_calls(&self) -> Vec<f64> {
        self.state.lock().unwrap().seek_calls.clone()
    }

    pub fn volume_calls(&self) -> Vec<u8> {
        self.state.lock().unwrap().volume_calls.clone()
    }

    pub fn rate_calls(&self) -> Vec<f64> {
        self.state.lock().unwrap().rate_calls.clone()
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn destroy_count(&self) -> usize {
        self.state.lock().unwrap().destroy_count
    }
}

impl RemoteWidget for FakeWidget {
    fn play(&self) {
        self.state.lock().unwrap().play_calls += 1;
        let _ = self
            .events
            .send(WidgetEvent::StateChange(RemoteState::Playing));
    }

    fn pause(&self) {
        self.state.lock().unwrap().pause_calls += 1;
        let _ = self
            .events
            .send(WidgetEvent::StateChange(RemoteState::Paused));
    }

    fn seek_to(&self, seconds: f64) {
        self.state.lock().unwrap().seek_calls.push(seconds);
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn duration(&self) -> f64 {
        self.state.lock().unwrap().duration
    }

    fn volume(&self) -> u8 {
        self.state.lock().unwrap().volume
    }

    fn set_volume(&self, percent: u8) {
        let mut state = self.state.lock().unwrap();
        state.volume = percent;
        state.volume_calls.push(percent);
    }

    fn mute(&self) {
        self.state.lock().unwrap().muted = true;
    }

    fn unmute(&self) {
        self.state.lock().unwrap().muted = false;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.state.lock().unwrap();
        state.rate = rate;
        state.rate_calls.push(rate);
    }

    fn destroy(&self) {
        self.state.lock().unwrap().destroy_count += 1;
    }
}

#[derive(Default)]
struct WidgetRuntimeState {
    widgets: Vec<Arc<FakeWidget>>,
    fail_next: Option<String>,
}

#[derive(Default)]
pub struct FakeWidgetRuntime {
    state: Mutex<WidgetRuntimeState>,
}

impl FakeWidgetRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_widget(&self) -> Option<Arc<FakeWidget>> {
        self.state.lock().unwrap().widgets.last().cloned()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().widgets.len()
    }

    pub fn fail_next_create(&self, reason: &str) {
        self.state.lock().unwrap().fail_next = Some(reason.to_string());
    }

    /// Emit from the most recently created widget.
    pub fn emit(&self, event: WidgetEvent) {
        if let Some(widget) = self.last_widget() {
            let _ = widget.events.send(event);
        }
    }
}

impl RemoteWidgetRuntime for FakeWidgetRuntime {
    fn create(
        &self,
        content_id: &str,
        options: &WidgetOptions,
        events: mpsc::UnboundedSender<WidgetEvent>,
    ) -> Result<Arc<dyn RemoteWidget>, String> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next.take() {
            return Err(reason);
        }
        let widget = Arc::new(FakeWidget {
            content_id: content_id.to_string(),
            options: options.clone(),
            events,
            state: Mutex::new(WidgetState {
                volume: 100,
                rate: 1.0,
                ..Default::default()
            }),
        });
        state.widgets.push(widget.clone());
        Ok(widget)
    }
}

#[derive(Default)]
struct FullscreenState {
    requests: usize,
    exits: usize,
}

/// One fullscreen API variant; `failing` variants reject every request.
pub struct FakeFullscreen {
    name: String,
    failure: Option<String>,
    state: Mutex<FullscreenState>,
}

impl FakeFullscreen {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failure: None,
            state: Mutex::new(FullscreenState::default()),
        })
    }

    pub fn failing(name: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failure: Some(reason.to_string()),
            state: Mutex::new(FullscreenState::default()),
        })
    }

    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn exits(&self) -> usize {
        self.state.lock().unwrap().exits
    }
}

impl FullscreenEntryPoint for FakeFullscreen {
    fn name(&self) -> &str {
        &self.name
    }

    fn request(&self) -> Result<(), String> {
        self.state.lock().unwrap().requests += 1;
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn exit(&self) -> Result<(), String> {
        self.state.lock().unwrap().exits += 1;
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct OrientationState {
    locked: Option<Orientation>,
    unlock_calls: usize,
}

#[derive(Default)]
pub struct FakeOrientation {
    rejects: bool,
    state: Mutex<OrientationState>,
}

impl FakeOrientation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Orientation lock that is unsupported, like most desktop runtimes.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            rejects: true,
            ..Default::default()
        })
    }

    pub fn locked(&self) -> Option<Orientation> {
        self.state.lock().unwrap().locked
    }

    pub fn unlock_calls(&self) -> usize {
        self.state.lock().unwrap().unlock_calls
    }
}

impl OrientationLock for FakeOrientation {
    fn lock(&self, orientation: Orientation) -> Result<(), String> {
        if self.rejects {
            return Err("orientation lock is not supported".to_string());
        }
        self.state.lock().unwrap().locked = Some(orientation);
        Ok(())
    }

    fn unlock(&self) {
        let mut state = self.state.lock().unwrap();
        state.locked = None;
        state.unlock_calls += 1;
    }
}

/// A full set of fakes with handles kept for assertions.
pub struct FakePlatform {
    pub element: Arc<FakeElement>,
    pub scripts: Arc<FakeScriptLoader>,
    pub widgets: Arc<FakeWidgetRuntime>,
    pub demux: Arc<FakeDemuxRuntime>,
    pub fullscreen: Vec<Arc<FakeFullscreen>>,
    pub orientation: Arc<FakeOrientation>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::with_fullscreen(vec![FakeFullscreen::new("standard")])
    }

    pub fn with_fullscreen(fullscreen: Vec<Arc<FakeFullscreen>>) -> Self {
        Self {
            element: FakeElement::new(),
            scripts: Arc::new(FakeScriptLoader::default()),
            widgets: FakeWidgetRuntime::new(),
            demux: FakeDemuxRuntime::new(true),
            fullscreen,
            orientation: FakeOrientation::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            element: self.element.clone(),
            scripts: self.scripts.clone(),
            remote_widgets: self.widgets.clone(),
            demux: self.demux.clone(),
            fullscreen: self
                .fullscreen
                .iter()
                .map(|f| f.clone() as Arc<dyn FullscreenEntryPoint>)
                .collect(),
            orientation: self.orientation.clone(),
        }
    }

    /// Session context over these fakes with a private dependency registry.
    pub fn context(&self, registry: DependencyRegistry, config: Config) -> SessionContext {
        let platform = self.platform();
        let bootstrapper = Bootstrapper::new(
            registry,
            platform.scripts.clone(),
            platform.element.clone(),
            platform.demux.clone(),
            config.bootstrap.clone(),
        );
        SessionContext {
            platform,
            bootstrapper,
            classifier: SourceClassifier::new(&config.sources),
            config,
        }
    }
}
