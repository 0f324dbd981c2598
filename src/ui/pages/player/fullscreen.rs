use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::player::platform::{FullscreenEntryPoint, Orientation, OrientationLock};

/// Drives whichever fullscreen API variant the platform provides and locks the
/// screen to landscape once fullscreen is entered.
///
/// `is_fullscreen` only follows platform change events; requests themselves
/// never flip it.
pub struct FullscreenAdapter {
    entry_points: Vec<Arc<dyn FullscreenEntryPoint>>,
    orientation: Arc<dyn OrientationLock>,
    is_fullscreen: bool,
}

impl FullscreenAdapter {
    pub fn new(
        entry_points: Vec<Arc<dyn FullscreenEntryPoint>>,
        orientation: Arc<dyn OrientationLock>,
    ) -> Self {
        Self {
            entry_points,
            orientation,
            is_fullscreen: false,
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    /// Try each entry point in order until one accepts. Returns the name of the
    /// variant that succeeded.
    pub fn enter(&self) -> Option<&str> {
        self.try_each("enter", |entry| entry.request())
    }

    pub fn exit(&self) -> Option<&str> {
        self.try_each("exit", |entry| entry.exit())
    }

    pub fn toggle(&self) -> Option<&str> {
        if self.is_fullscreen {
            self.exit()
        } else {
            self.enter()
        }
    }

    fn try_each<F>(&self, operation: &str, attempt: F) -> Option<&str>
    where
        F: Fn(&dyn FullscreenEntryPoint) -> Result<(), String>,
    {
        for entry in &self.entry_points {
            match attempt(entry.as_ref()) {
                Ok(()) => {
                    debug!("Fullscreen {} via {}", operation, entry.name());
                    return Some(entry.name());
                }
                Err(e) => debug!("Fullscreen {} via {} failed: {}", operation, entry.name(), e),
            }
        }
        warn!("No fullscreen API variant could {}", operation);
        None
    }

    /// Platform reported a fullscreen change.
    pub fn on_change(&mut self, is_fullscreen: bool) {
        if self.is_fullscreen == is_fullscreen {
            return;
        }
        self.is_fullscreen = is_fullscreen;
        info!("Fullscreen {}", if is_fullscreen { "entered" } else { "exited" });

        if is_fullscreen {
            if let Err(e) = self.orientation.lock(Orientation::Landscape) {
                debug!("Orientation lock unavailable: {}", e);
            }
        } else {
            self.orientation.unlock();
        }
    }
}
