//! Decides which backend owns playback for a media reference.
//!
//! Classification is pure and total: remote-widget hosts are checked first, then
//! the manifest extension of the path, and anything else (including references
//! that do not parse as URLs at all) is played as a progressive file.

use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::utils::errors::PlayerError;

use crate::config::SourcesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    RemoteWidget,
    SegmentedStream,
    ProgressiveFile,
}

impl BackendKind {
    /// Kinds decoded by the native media element.
    pub fn is_native(&self) -> bool {
        !matches!(self, BackendKind::RemoteWidget)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendKind::RemoteWidget => "remote widget",
            BackendKind::SegmentedStream => "segmented stream",
            BackendKind::ProgressiveFile => "progressive file",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct SourceClassifier {
    remote_hosts: Vec<String>,
    manifest_extensions: Vec<String>,
}

impl Default for SourceClassifier {
    fn default() -> Self {
        Self::new(&SourcesConfig::default())
    }
}

impl SourceClassifier {
    pub fn new(config: &SourcesConfig) -> Self {
        Self {
            remote_hosts: config
                .remote_widget_hosts
                .iter()
                .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            manifest_extensions: config
                .manifest_extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, reference: &str) -> BackendKind {
        let Some(url) = parse_reference(reference) else {
            // Unknown references degrade to progressive playback rather than failing.
            warn!(
                "{}, defaulting to progressive playback",
                PlayerError::ReferenceInvalid(reference.to_string())
            );
            return BackendKind::ProgressiveFile;
        };

        if let Some(host) = url.host_str()
            && self.is_remote_host(host)
        {
            return BackendKind::RemoteWidget;
        }

        if let Some(ext) = path_extension(&url)
            && self.manifest_extensions.iter().any(|m| *m == ext)
        {
            return BackendKind::SegmentedStream;
        }

        debug!("Reference {} classified as progressive file", url);
        BackendKind::ProgressiveFile
    }

    /// Content identifier handed to the remote widget, if the reference carries one.
    pub fn remote_content_id(&self, reference: &str) -> Option<String> {
        let url = parse_reference(reference)?;
        let host = url.host_str()?.to_ascii_lowercase();
        if !self.is_remote_host(&host) {
            return None;
        }

        if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "v") {
            return non_empty(&id);
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let first = segments.next()?;
        match first {
            "embed" | "shorts" | "live" | "v" => segments.next().and_then(non_empty),
            // Short-link hosts put the id directly in the path.
            _ if host == "youtu.be" || host.ends_with(".youtu.be") => non_empty(first),
            _ => None,
        }
    }

    fn is_remote_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.remote_hosts
            .iter()
            .any(|pattern| host == *pattern || host.ends_with(&format!(".{}", pattern)))
    }
}

/// Classify with the default host patterns and extensions.
pub fn classify(reference: &str) -> BackendKind {
    SourceClassifier::default().classify(reference)
}

fn parse_reference(reference: &str) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        // Scheme-less references such as "cdn.example.com/a.m3u8" or "/media/a.mp4"
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("https://relative.invalid/").ok()?;
            if trimmed.starts_with('/') {
                base.join(trimmed).ok()
            } else {
                Url::parse(&format!("https://{}", trimmed)).ok()
            }
        }
        Err(_) => None,
    }
}

fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
