pub mod errors;
pub mod timer;

pub use errors::{PlayerError, PlayerResult};
pub use timer::{ControlFlow, TimerHandle};
