//! The seam between the proctoring core and the platform's media stack.

use crate::device::types::{AudioSpectrum, DisplaySurface, Frame, MediaHandles, MediaKind, MediaTrack, PageEvent};
use crossbeam_channel::Receiver;

/// Platform media access used by [`DeviceAccessManager`](crate::device::DeviceAccessManager).
///
/// A backend grants tracks, stops them, reads the latest camera frame and
/// microphone spectrum from live tracks, and toggles fullscreen. Fullscreen
/// and visibility transitions are delivered asynchronously on `page_events`.
pub trait DeviceBackend: Send {
    /// Prompt for camera and microphone in one request.
    fn open_camera_and_mic(&mut self) -> Result<MediaHandles, DeviceError>;

    /// Prompt for a screen-capture track. The surface type is reported as-is.
    fn open_display_capture(&mut self) -> Result<MediaTrack, DeviceError>;

    /// Stop a live track. Stopping an unknown or stopped track is a no-op.
    fn stop_track(&mut self, track: &MediaTrack);

    /// Grab the current camera frame, or `None` if the video surface is not ready.
    fn capture_frame(&mut self) -> Option<Frame>;

    /// Read the current microphone frequency spectrum.
    fn audio_spectrum(&mut self) -> Option<AudioSpectrum>;

    fn request_fullscreen(&mut self) -> Result<(), DeviceError>;

    fn exit_fullscreen(&mut self);

    /// Receiver of fullscreen/visibility transitions.
    fn page_events(&self) -> Receiver<PageEvent>;
}

/// Errors that can occur while acquiring devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The user (or platform policy) refused a grant
    PermissionDenied(MediaKind),
    /// Screen share was granted for something other than the whole display
    NotWholeScreen(DisplaySurface),
    /// The device or platform API is unavailable
    Unavailable(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::PermissionDenied(kind) => {
                write!(f, "Permission denied for {kind}; allow access and try again")
            }
            DeviceError::NotWholeScreen(surface) => write!(
                f,
                "Shared a {surface} instead of the entire screen; share your entire screen and try again"
            ),
            DeviceError::Unavailable(e) => write!(f, "Device unavailable: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}
