//! Ownership of the camera, microphone and screen-capture grants.

use crate::device::backend::{DeviceBackend, DeviceError};
use crate::device::types::{
    AudioSpectrum, DisplaySurface, Frame, MediaHandles, MediaKind, MediaTrack, PageEvent,
    PermissionState,
};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

/// Acquires and releases the three mandatory media grants.
///
/// The manager is the only writer of [`PermissionState`]. Every held track
/// is stopped on [`release_all`](Self::release_all) and again on drop, so a
/// session that unwinds on any path leaves no device open.
pub struct DeviceAccessManager<B: DeviceBackend> {
    backend: B,
    permissions: PermissionState,
    camera: Option<MediaTrack>,
    microphone: Option<MediaTrack>,
    screen: Option<MediaTrack>,
    fullscreen: bool,
}

impl<B: DeviceBackend> DeviceAccessManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            permissions: PermissionState::default(),
            camera: None,
            microphone: None,
            screen: None,
            fullscreen: false,
        }
    }

    pub fn permissions(&self) -> PermissionState {
        self.permissions
    }

    /// Request camera and microphone together.
    ///
    /// A request that is refused marks both flags as denied, matching a
    /// single combined prompt. Calling again while both are held returns
    /// the existing handles.
    pub fn acquire_camera_and_mic(&mut self) -> Result<MediaHandles, DeviceError> {
        if let (Some(camera), Some(mic)) = (&self.camera, &self.microphone) {
            return Ok(MediaHandles {
                tracks: vec![camera.clone(), mic.clone()],
            });
        }

        let handles = match self.backend.open_camera_and_mic() {
            Ok(handles) => handles,
            Err(e) => {
                warn!("Camera/microphone request failed: {e}");
                self.permissions.set(MediaKind::Camera, false);
                self.permissions.set(MediaKind::Microphone, false);
                return Err(e);
            }
        };

        for kind in [MediaKind::Camera, MediaKind::Microphone] {
            if !handles.contains(kind) {
                warn!("Backend returned no {kind} track");
                for track in &handles.tracks {
                    self.backend.stop_track(track);
                }
                self.permissions.set(MediaKind::Camera, false);
                self.permissions.set(MediaKind::Microphone, false);
                return Err(DeviceError::PermissionDenied(kind));
            }
        }

        for track in &handles.tracks {
            match track.kind {
                MediaKind::Camera => self.camera = Some(track.clone()),
                MediaKind::Microphone => self.microphone = Some(track.clone()),
                // Unexpected extra tracks are not kept.
                MediaKind::Screen => self.backend.stop_track(track),
            }
        }
        self.permissions.set(MediaKind::Camera, true);
        self.permissions.set(MediaKind::Microphone, true);
        info!("Camera and microphone granted");

        Ok(handles)
    }

    /// Request a screen share of the entire display.
    ///
    /// Any other surface (window, tab) is stopped immediately and reported
    /// as [`DeviceError::NotWholeScreen`] so the caller can ask the user to
    /// retry with the correct selection.
    pub fn acquire_full_screen_share(&mut self) -> Result<MediaHandles, DeviceError> {
        if let Some(screen) = &self.screen {
            return Ok(MediaHandles {
                tracks: vec![screen.clone()],
            });
        }

        let track = match self.backend.open_display_capture() {
            Ok(track) => track,
            Err(e) => {
                warn!("Screen share request failed: {e}");
                self.permissions.set(MediaKind::Screen, false);
                return Err(e);
            }
        };

        match track.surface {
            Some(DisplaySurface::Monitor) => {
                self.screen = Some(track.clone());
                self.permissions.set(MediaKind::Screen, true);
                info!("Whole-screen share granted");
                Ok(MediaHandles {
                    tracks: vec![track],
                })
            }
            other => {
                self.backend.stop_track(&track);
                self.permissions.set(MediaKind::Screen, false);
                // A capture track without surface metadata cannot be verified.
                let surface = other.unwrap_or(DisplaySurface::Window);
                warn!("Rejected screen share of a {surface}");
                Err(DeviceError::NotWholeScreen(surface))
            }
        }
    }

    /// Stop every held track. Returns how many tracks were stopped; a
    /// second call stops nothing.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in [&mut self.camera, &mut self.microphone, &mut self.screen] {
            if let Some(track) = slot.take() {
                self.backend.stop_track(&track);
                released += 1;
            }
        }
        if released > 0 {
            info!("Released {released} media tracks");
        }
        released
    }

    pub fn enter_fullscreen(&mut self) -> Result<(), DeviceError> {
        self.backend.request_fullscreen()?;
        self.fullscreen = true;
        Ok(())
    }

    /// Leave fullscreen if this manager entered it.
    pub fn leave_fullscreen(&mut self) {
        if self.fullscreen {
            self.backend.exit_fullscreen();
            self.fullscreen = false;
            debug!("Left fullscreen");
        }
    }

    /// Current camera frame; `None` without a live camera or a ready surface.
    pub fn capture_frame(&mut self) -> Option<Frame> {
        self.camera.as_ref()?;
        self.backend.capture_frame()
    }

    /// Current microphone spectrum; `None` without a live microphone.
    pub fn audio_spectrum(&mut self) -> Option<AudioSpectrum> {
        self.microphone.as_ref()?;
        self.backend.audio_spectrum()
    }

    pub fn page_events(&self) -> Receiver<PageEvent> {
        self.backend.page_events()
    }

    /// Number of tracks currently held.
    pub fn held_tracks(&self) -> usize {
        [&self.camera, &self.microphone, &self.screen]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }
}

impl<B: DeviceBackend> Drop for DeviceAccessManager<B> {
    fn drop(&mut self) {
        self.release_all();
        self.leave_fullscreen();
    }
}
