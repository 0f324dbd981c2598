use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::PlayerPage;

type NavigationCallback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks supplied by the enclosing lesson page.
#[derive(Clone)]
pub struct NavigationCallbacks {
    on_advance: NavigationCallback,
    on_retreat: NavigationCallback,
}

impl NavigationCallbacks {
    pub fn new<A, R>(on_advance: A, on_retreat: R) -> Self
    where
        A: Fn() + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        Self {
            on_advance: Arc::new(on_advance),
            on_retreat: Arc::new(on_retreat),
        }
    }

    pub fn noop() -> Self {
        Self::new(|| {}, || {})
    }
}

impl fmt::Debug for NavigationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationCallbacks").finish_non_exhaustive()
    }
}

/// Lesson navigation methods
impl PlayerPage {
    /// Handle previous lesson navigation
    pub(super) fn handle_previous_navigation(&self) {
        debug!("Previous lesson requested");
        (self.navigation.on_retreat)();
    }

    /// Handle next lesson navigation, explicit or after the media ended
    pub(super) fn handle_next_navigation(&self) {
        debug!("Next lesson requested");
        (self.navigation.on_advance)();
    }
}
