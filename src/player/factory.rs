use tracing::info;

use super::bootstrap::Provisioned;
use super::native_player::NativeBackend;
use super::platform::{Platform, WidgetOptions};
use super::remote_player::RemoteWidgetBackend;
use super::source::SourceClassifier;
use super::traits::{EventSink, MediaBackend};
use crate::config::Config;
use crate::utils::errors::{PlayerError, PlayerResult};

/// Instantiate the backend for a provisioned reference.
pub fn create_backend(
    provisioned: &Provisioned,
    reference: &str,
    platform: &Platform,
    classifier: &SourceClassifier,
    config: &Config,
    sink: EventSink,
) -> PlayerResult<Box<dyn MediaBackend>> {
    let kind = provisioned.kind;
    if kind.is_native() {
        info!("Creating native backend for {}", kind);
        let demux = provisioned.uses_demuxer.then_some(&platform.demux);
        return Ok(Box::new(NativeBackend::attach(
            kind,
            reference,
            platform.element.clone(),
            demux,
            sink,
        )));
    }

    let content_id = classifier.remote_content_id(reference).ok_or_else(|| {
        PlayerError::BackendRuntime(format!(
            "no content identifier in remote reference {}",
            reference
        ))
    })?;
    let options = widget_options(config);
    info!("Creating remote widget backend");
    let backend = RemoteWidgetBackend::create(&platform.remote_widgets, &content_id, &options, sink)?;
    Ok(Box::new(backend))
}

pub fn widget_options(config: &Config) -> WidgetOptions {
    WidgetOptions {
        autoplay: config.widget.autoplay && config.playback.autoplay,
        chromeless: config.widget.chromeless,
        suppress_branding: config.widget.suppress_branding,
    }
}
