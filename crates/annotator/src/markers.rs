//! Marker names this system writes into the host tree. Markers are a
//! durable mirror of engine state that survives an engine restart within
//! the same page lifetime; the engine's own records are the source of
//! truth.

use sourcecount_core_types::ContainerId;

/// Class identifying an injected ordinal label span.
pub const ORDINAL_CLASS: &str = "source-item-ordinal";

/// Prefix for summary display element ids, completed by the container id.
pub const DISPLAY_ID_PREFIX: &str = "source-counter-display-";

/// Attribute marking a fully processed result container.
pub const PROCESSED_ATTR: &str = "data-sources-counted";

/// Attribute marking a numbered research-website group.
pub const GROUP_PROCESSED_ATTR: &str = "data-research-counted";

/// Attribute marking a claimed in-progress research panel.
pub const IN_PROGRESS_ATTR: &str = "data-research-in-progress";

/// Attribute carrying a generated group identity.
pub const GROUP_ID_ATTR: &str = "data-group-id";

pub fn display_id(container: &ContainerId) -> String {
    format!("{}{}", DISPLAY_ID_PREFIX, container.as_str())
}
