use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::platform::{DemuxRuntime, NativeMediaElement, ScriptLoadError, ScriptLoader};
use super::source::BackendKind;
use crate::config::{BootstrapConfig, ScriptSpec};
use crate::utils::errors::{PlayerError, PlayerResult};

/// Registry shared by every player in the process.
pub static DEPENDENCY_REGISTRY: Lazy<DependencyRegistry> = Lazy::new(DependencyRegistry::default);

#[derive(Debug, Clone, Default, PartialEq)]
pub enum BootstrapStatus {
    #[default]
    NotStarted,
    Loading,
    Ready,
    Failed(PlayerError),
}

/// Tracks one provisioning attempt. Only the first terminal transition sticks.
#[derive(Debug, Clone, Default)]
pub struct BootstrapState {
    status: BootstrapStatus,
}

impl BootstrapState {
    pub fn begin(&mut self) {
        self.status = BootstrapStatus::Loading;
    }

    /// Record the outcome. Returns false if the attempt had already settled
    /// (or never started), in which case the outcome is ignored.
    pub fn settle(&mut self, outcome: Result<(), PlayerError>) -> bool {
        if self.status != BootstrapStatus::Loading {
            return false;
        }
        self.status = match outcome {
            Ok(()) => BootstrapStatus::Ready,
            Err(e) => BootstrapStatus::Failed(e),
        };
        true
    }

    pub fn status(&self) -> &BootstrapStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == BootstrapStatus::Loading
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<(), ScriptLoadError>>>;

#[derive(Default)]
struct DependencyEntry {
    ready: bool,
    /// Installed by this registry rather than found on the page.
    injected: bool,
    pending: Option<(u64, SharedLoad)>,
    leases: usize,
    injections: usize,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, DependencyEntry>,
    next_attempt: u64,
}

/// Process-wide, idempotent install registry for injected dependencies.
///
/// Concurrent callers share a single in-flight injection, so a dependency is
/// never injected twice while loading. A failed or timed-out attempt removes its
/// script node and callback, leaving the slot clean for the next attempt.
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("DependencyRegistry")
            .field("dependencies", &inner.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Keeps a dependency counted as in use. Released on drop; releasing the last
/// lease on a dependency this registry injected removes it again.
pub struct DependencyLease {
    script: ScriptSpec,
    loader: Arc<dyn ScriptLoader>,
    registry: DependencyRegistry,
}

impl fmt::Debug for DependencyLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyLease")
            .field("name", &self.script.name)
            .finish()
    }
}

impl Drop for DependencyLease {
    fn drop(&mut self) {
        let mut inner = self.registry.lock();
        let Some(entry) = inner.entries.get_mut(&self.script.name) else {
            return;
        };
        entry.leases = entry.leases.saturating_sub(1);
        // A load still in flight cannot be aborted; it stays pending for the
        // next caller to join.
        if entry.leases > 0 || !entry.ready || !entry.injected {
            return;
        }
        entry.ready = false;
        entry.injected = false;
        drop(inner);
        info!("Last user of {} released, removing it", self.script.name);
        self.loader.remove(&self.script);
    }
}

impl DependencyRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make sure `script` is installed, waiting at most `timeout`.
    pub async fn ensure(
        &self,
        script: &ScriptSpec,
        loader: &Arc<dyn ScriptLoader>,
        timeout: Duration,
    ) -> PlayerResult<DependencyLease> {
        let (attempt, load) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let next_attempt = inner.next_attempt + 1;
            let entry = inner.entries.entry(script.name.clone()).or_default();
            entry.leases += 1;

            if entry.ready || loader.global_present(&script.global) {
                entry.ready = true;
                entry.pending = None;
                debug!("Dependency {} already installed", script.name);
                drop(guard);
                return Ok(self.lease(script, loader));
            }

            if let Some((attempt, load)) = entry.pending.clone() {
                debug!("Joining in-flight load of {}", script.name);
                (attempt, load)
            } else {
                info!("Injecting {} from {}", script.name, script.src);
                let load = loader.inject(script).shared();
                entry.pending = Some((next_attempt, load.clone()));
                entry.injections += 1;
                inner.next_attempt = next_attempt;
                (next_attempt, load)
            }
        };
        // Created before awaiting so an aborted caller still releases its count.
        let lease = self.lease(script, loader);

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => {
                let mut inner = self.lock();
                if let Some(entry) = inner.entries.get_mut(&script.name) {
                    entry.ready = true;
                    entry.injected = true;
                    entry.pending = None;
                }
                info!("Dependency {} ready", script.name);
                Ok(lease)
            }
            Ok(Err(ScriptLoadError::Network(reason))) => {
                warn!("Dependency {} failed to load: {}", script.name, reason);
                self.discard_attempt(script, attempt, loader);
                Err(PlayerError::BootstrapLoadFailure {
                    dependency: script.name.clone(),
                    reason,
                })
            }
            Err(_) => {
                warn!(
                    "Dependency {} did not become ready within {:?}",
                    script.name, timeout
                );
                self.discard_attempt(script, attempt, loader);
                Err(PlayerError::BootstrapTimeout {
                    dependency: script.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn lease(&self, script: &ScriptSpec, loader: &Arc<dyn ScriptLoader>) -> DependencyLease {
        DependencyLease {
            script: script.clone(),
            loader: loader.clone(),
            registry: self.clone(),
        }
    }

    /// Forget a failed attempt and remove its side effects, unless a newer
    /// attempt has already replaced it.
    fn discard_attempt(&self, script: &ScriptSpec, attempt: u64, loader: &Arc<dyn ScriptLoader>) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&script.name) else {
            return;
        };
        if matches!(entry.pending, Some((current, _)) if current == attempt) {
            entry.pending = None;
            drop(inner);
            loader.remove(script);
        }
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.lock().entries.get(name).is_some_and(|e| e.ready)
    }

    pub fn active_leases(&self, name: &str) -> usize {
        self.lock().entries.get(name).map_or(0, |e| e.leases)
    }

    /// How many times the dependency's script was injected.
    pub fn injection_count(&self, name: &str) -> usize {
        self.lock().entries.get(name).map_or(0, |e| e.injections)
    }
}

/// Result of a successful provisioning attempt.
#[derive(Debug)]
pub struct Provisioned {
    pub kind: BackendKind,
    /// The segmented stream needs the demuxer layered under the native element.
    pub uses_demuxer: bool,
    _leases: Vec<DependencyLease>,
}

/// Provisions the runtime dependencies each backend kind needs.
#[derive(Clone)]
pub struct Bootstrapper {
    registry: DependencyRegistry,
    scripts: Arc<dyn ScriptLoader>,
    element: Arc<dyn NativeMediaElement>,
    demux: Arc<dyn DemuxRuntime>,
    config: BootstrapConfig,
}

impl Bootstrapper {
    pub fn new(
        registry: DependencyRegistry,
        scripts: Arc<dyn ScriptLoader>,
        element: Arc<dyn NativeMediaElement>,
        demux: Arc<dyn DemuxRuntime>,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            registry,
            scripts,
            element,
            demux,
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub async fn provision(&self, kind: BackendKind) -> PlayerResult<Provisioned> {
        match kind {
            BackendKind::ProgressiveFile => Ok(Provisioned {
                kind,
                uses_demuxer: false,
                _leases: Vec::new(),
            }),
            BackendKind::RemoteWidget => {
                let lease = self
                    .registry
                    .ensure(&self.config.remote_sdk, &self.scripts, self.timeout())
                    .await?;
                Ok(Provisioned {
                    kind,
                    uses_demuxer: false,
                    _leases: vec![lease],
                })
            }
            BackendKind::SegmentedStream => {
                if self.element.can_play_type(&self.config.segmented_mime) {
                    debug!("Native element handles segmented streams, skipping demuxer");
                    return Ok(Provisioned {
                        kind,
                        uses_demuxer: false,
                        _leases: Vec::new(),
                    });
                }

                let lease = self
                    .registry
                    .ensure(&self.config.demux_library, &self.scripts, self.timeout())
                    .await?;

                if !self.demux.is_supported() {
                    return Err(PlayerError::BootstrapLoadFailure {
                        dependency: self.config.demux_library.name.clone(),
                        reason: "segmented playback is not supported by this runtime".to_string(),
                    });
                }

                Ok(Provisioned {
                    kind,
                    uses_demuxer: true,
                    _leases: vec![lease],
                })
            }
        }
    }

}

/// Describe the provisioning steps for `kind` without touching any platform.
pub fn provisioning_plan(kind: BackendKind, config: &BootstrapConfig) -> Vec<String> {
    let timeout = config.timeout();
    match kind {
        BackendKind::ProgressiveFile => vec!["no dependencies".to_string()],
        BackendKind::RemoteWidget => vec![format!(
            "load {} from {} (timeout {:?})",
            config.remote_sdk.name, config.remote_sdk.src, timeout
        )],
        BackendKind::SegmentedStream => vec![
            format!("probe native support for {}", config.segmented_mime),
            format!(
                "otherwise load {} from {} (timeout {:?}) and verify runtime support",
                config.demux_library.name, config.demux_library.src, timeout
            ),
        ],
    }
}
