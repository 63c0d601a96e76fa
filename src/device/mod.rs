//! Device access for proctored sessions.
//!
//! This module owns the camera, microphone and whole-screen capture grants,
//! behind a [`DeviceBackend`] that a platform integration implements.

pub mod backend;
pub mod manager;
pub mod simulated;
pub mod types;

// Re-export commonly used types
pub use backend::{DeviceBackend, DeviceError};
pub use manager::DeviceAccessManager;
pub use simulated::{SimulatedBackend, SimulatedGrants, SimulatedProbe};
pub use types::{
    AudioSpectrum, DisplaySurface, Frame, MediaHandles, MediaKind, MediaTrack, PageEvent,
    PermissionFlag, PermissionState, TrackId,
};
