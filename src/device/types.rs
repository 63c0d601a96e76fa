//! Media track and permission types shared by device backends.
//!
//! These types describe grants and tracks only - the controller never sees
//! raw pixels or audio samples except through `Frame` and `AudioSpectrum`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of media device behind a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Camera,
    Microphone,
    Screen,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Camera => write!(f, "camera"),
            MediaKind::Microphone => write!(f, "microphone"),
            MediaKind::Screen => write!(f, "screen"),
        }
    }
}

/// Surface type reported by a screen-capture track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySurface {
    /// The entire display
    Monitor,
    /// A single application window
    Window,
    /// A single browser tab
    Browser,
}

impl std::fmt::Display for DisplaySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplaySurface::Monitor => write!(f, "entire monitor"),
            DisplaySurface::Window => write!(f, "window"),
            DisplaySurface::Browser => write!(f, "browser tab"),
        }
    }
}

/// Opaque identifier of a live media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// A granted media track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: TrackId,
    pub kind: MediaKind,
    /// Only set for screen-capture tracks
    pub surface: Option<DisplaySurface>,
}

impl MediaTrack {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: TrackId::new(),
            kind,
            surface: None,
        }
    }

    pub fn screen(surface: DisplaySurface) -> Self {
        Self {
            id: TrackId::new(),
            kind: MediaKind::Screen,
            surface: Some(surface),
        }
    }
}

/// Tracks returned by a successful acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaHandles {
    pub tracks: Vec<MediaTrack>,
}

impl MediaHandles {
    pub fn contains(&self, kind: MediaKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// Tri-state grant flag: `None` until the user has answered the prompt.
pub type PermissionFlag = Option<bool>;

/// Permission state for the three mandatory devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionState {
    pub camera: PermissionFlag,
    pub microphone: PermissionFlag,
    pub screen: PermissionFlag,
}

impl PermissionState {
    /// All three devices granted.
    pub fn all_granted(&self) -> bool {
        self.camera == Some(true) && self.microphone == Some(true) && self.screen == Some(true)
    }

    pub fn get(&self, kind: MediaKind) -> PermissionFlag {
        match kind {
            MediaKind::Camera => self.camera,
            MediaKind::Microphone => self.microphone,
            MediaKind::Screen => self.screen,
        }
    }

    pub(crate) fn set(&mut self, kind: MediaKind, granted: bool) {
        match kind {
            MediaKind::Camera => self.camera = Some(granted),
            MediaKind::Microphone => self.microphone = Some(granted),
            MediaKind::Screen => self.screen = Some(granted),
        }
    }
}

/// One captured camera frame, base64-encoded as delivered to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub captured_at: DateTime<Utc>,
    /// Base64 image payload (JPEG)
    pub image_base64: String,
}

impl Frame {
    pub fn new(image_base64: impl Into<String>) -> Self {
        Self {
            captured_at: Utc::now(),
            image_base64: image_base64.into(),
        }
    }
}

/// Byte-scaled frequency bins (0-255) from the microphone analyser.
pub type AudioSpectrum = Vec<u8>;

/// Fullscreen and tab-visibility transitions reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageEvent {
    FullscreenEntered,
    FullscreenExited,
    TabHidden,
    TabVisible,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_state_requires_all_three() {
        let mut state = PermissionState::default();
        assert!(!state.all_granted());

        state.set(MediaKind::Camera, true);
        state.set(MediaKind::Microphone, true);
        assert!(!state.all_granted());

        state.set(MediaKind::Screen, false);
        assert!(!state.all_granted());

        state.set(MediaKind::Screen, true);
        assert!(state.all_granted());
    }

    #[test]
    fn test_track_ids_are_unique() {
        let a = MediaTrack::new(MediaKind::Camera);
        let b = MediaTrack::new(MediaKind::Camera);
        assert_ne!(a.id, b.id);
        assert_eq!(MediaTrack::screen(DisplaySurface::Window).surface, Some(DisplaySurface::Window));
    }
}
