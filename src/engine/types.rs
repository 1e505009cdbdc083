//! # Identifiers shared between the scheduler and the media engine.
//!
//! - [`SourceId`] stable identity of one remote participant's camera.
//! - [`SourceHandle`] opaque engine reference needed to issue an attach.
//! - [`ViewId`] addressable rendering view: a numbered tile or the share view.
//!
//! All identifiers are cheap to clone (`Arc<str>`-backed).

use std::fmt;
use std::sync::Arc;

/// Stable identity of a remote source (one per participant camera).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a new source id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&SourceId> for SourceId {
    fn from(value: &SourceId) -> Self {
        value.clone()
    }
}

/// Opaque reference into the media engine (remote camera or window share).
///
/// The scheduler never interprets it; it is handed back to
/// [`MediaEngine::attach`](crate::MediaEngine::attach) verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceHandle(Arc<str>);

impl SourceHandle {
    /// Creates a new handle.
    pub fn new(handle: impl Into<Arc<str>>) -> Self {
        Self(handle.into())
    }

    /// Returns the handle as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceHandle {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A rendering view the engine can attach a source to.
///
/// Renders as the DOM-style view name the display layer uses:
/// `renderer0`..`rendererN` for tiles and `rendererS` for the share view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewId {
    /// Numbered tile in the slot table.
    Tile(usize),
    /// Out-of-band window-share view.
    Share,
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Tile(n) => write!(f, "renderer{n}"),
            ViewId::Share => f.write_str("rendererS"),
        }
    }
}
