pub mod bootstrap;
pub mod factory;
pub mod native_player;
pub mod platform;
pub mod remote_player;
pub mod session;
pub mod source;
pub mod traits;
pub mod types;

pub use bootstrap::{
    BootstrapState, BootstrapStatus, Bootstrapper, DEPENDENCY_REGISTRY, DependencyRegistry,
    Provisioned,
};
pub use factory::create_backend;
pub use native_player::NativeBackend;
pub use platform::Platform;
pub use remote_player::RemoteWidgetBackend;
pub use session::{PlaybackSession, SessionContext, SessionMessage, SessionNotice};
pub use source::{BackendKind, SourceClassifier, classify};
pub use traits::{BackendEvent, EventSink, MediaBackend, PositionSource};
pub use types::{PlaybackState, RenderState};
