//! Simulated device backend.
//!
//! This exists so the controller, the CLI and the tests can run without a
//! camera, microphone or display-capture API. Grants, frame readiness and
//! microphone loudness are scripted; a [`SimulatedProbe`] observes live
//! tracks and injects fullscreen/visibility transitions.

use crate::device::backend::{DeviceBackend, DeviceError};
use crate::device::types::{
    AudioSpectrum, DisplaySurface, Frame, MediaHandles, MediaKind, MediaTrack, PageEvent, TrackId,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Number of frequency bins in a simulated spectrum.
const SPECTRUM_BINS: usize = 64;

/// 1x1 white JPEG, base64-encoded.
const PLACEHOLDER_FRAME: &str = "/9j/4AAQSkZJRgABAQEASABIAAD/2wBDAP//////////////////////////////////////////////////////////////////////////////////////wgALCAABAAEBAREA/8QAFBABAAAAAAAAAAAAAAAAAAAAAP/aAAgBAQABPxA=";

/// Scripted answers to permission prompts.
#[derive(Debug, Clone)]
pub struct SimulatedGrants {
    pub camera: bool,
    pub microphone: bool,
    /// `None` means the share prompt is cancelled
    pub screen: Option<DisplaySurface>,
}

impl Default for SimulatedGrants {
    fn default() -> Self {
        Self {
            camera: true,
            microphone: true,
            screen: Some(DisplaySurface::Monitor),
        }
    }
}

#[derive(Debug)]
struct SimState {
    grants: SimulatedGrants,
    live: HashMap<TrackId, MediaTrack>,
    stop_calls: usize,
    frame_ready: bool,
    mic_level: u8,
    fullscreen: bool,
    fullscreen_requests: usize,
}

/// A backend whose devices are simulated in memory.
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    sender: Sender<PageEvent>,
    receiver: Receiver<PageEvent>,
}

impl SimulatedBackend {
    /// Create a backend that grants everything, has a ready camera and a
    /// moderately loud microphone.
    pub fn new() -> Self {
        Self::with_grants(SimulatedGrants::default())
    }

    pub fn with_grants(grants: SimulatedGrants) -> Self {
        let (sender, receiver) = bounded(1_000);
        Self {
            state: Arc::new(Mutex::new(SimState {
                grants,
                live: HashMap::new(),
                stop_calls: 0,
                frame_ready: true,
                mic_level: 40,
                fullscreen: false,
                fullscreen_requests: 0,
            })),
            sender,
            receiver,
        }
    }

    /// Handle for observing and scripting this backend after it has been
    /// moved into a device manager.
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            state: Arc::clone(&self.state),
            sender: self.sender.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    fn emit(&self, event: PageEvent) {
        // A full channel drops the event, like a busy UI thread coalescing transitions.
        let _ = self.sender.try_send(event);
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for SimulatedBackend {
    fn open_camera_and_mic(&mut self) -> Result<MediaHandles, DeviceError> {
        let mut state = self.state();
        if !state.grants.camera {
            return Err(DeviceError::PermissionDenied(MediaKind::Camera));
        }
        if !state.grants.microphone {
            return Err(DeviceError::PermissionDenied(MediaKind::Microphone));
        }

        let tracks = vec![
            MediaTrack::new(MediaKind::Camera),
            MediaTrack::new(MediaKind::Microphone),
        ];
        for track in &tracks {
            state.live.insert(track.id, track.clone());
        }
        Ok(MediaHandles { tracks })
    }

    fn open_display_capture(&mut self) -> Result<MediaTrack, DeviceError> {
        let mut state = self.state();
        match state.grants.screen {
            Some(surface) => {
                let track = MediaTrack::screen(surface);
                state.live.insert(track.id, track.clone());
                Ok(track)
            }
            None => Err(DeviceError::PermissionDenied(MediaKind::Screen)),
        }
    }

    fn stop_track(&mut self, track: &MediaTrack) {
        let mut state = self.state();
        if state.live.remove(&track.id).is_some() {
            state.stop_calls += 1;
        }
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        let state = self.state();
        let camera_live = state.live.values().any(|t| t.kind == MediaKind::Camera);
        (camera_live && state.frame_ready).then(|| Frame::new(PLACEHOLDER_FRAME))
    }

    fn audio_spectrum(&mut self) -> Option<AudioSpectrum> {
        let state = self.state();
        let mic_live = state.live.values().any(|t| t.kind == MediaKind::Microphone);
        mic_live.then(|| vec![state.mic_level; SPECTRUM_BINS])
    }

    fn request_fullscreen(&mut self) -> Result<(), DeviceError> {
        let changed = {
            let mut state = self.state();
            state.fullscreen_requests += 1;
            let changed = !state.fullscreen;
            state.fullscreen = true;
            changed
        };
        if changed {
            self.emit(PageEvent::FullscreenEntered);
        }
        Ok(())
    }

    fn exit_fullscreen(&mut self) {
        let changed = {
            let mut state = self.state();
            let changed = state.fullscreen;
            state.fullscreen = false;
            changed
        };
        if changed {
            self.emit(PageEvent::FullscreenExited);
        }
    }

    fn page_events(&self) -> Receiver<PageEvent> {
        self.receiver.clone()
    }
}

/// Observer/script handle for a [`SimulatedBackend`].
#[derive(Clone)]
pub struct SimulatedProbe {
    state: Arc<Mutex<SimState>>,
    sender: Sender<PageEvent>,
}

impl SimulatedProbe {
    /// Number of tracks currently live.
    pub fn live_tracks(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Number of tracks that have actually been stopped.
    pub fn stop_calls(&self) -> usize {
        lock(&self.state).stop_calls
    }

    pub fn is_fullscreen(&self) -> bool {
        lock(&self.state).fullscreen
    }

    pub fn fullscreen_requests(&self) -> usize {
        lock(&self.state).fullscreen_requests
    }

    pub fn set_grants(&self, grants: SimulatedGrants) {
        lock(&self.state).grants = grants;
    }

    pub fn set_frame_ready(&self, ready: bool) {
        lock(&self.state).frame_ready = ready;
    }

    /// Set the loudness reported in every frequency bin.
    pub fn set_mic_level(&self, level: u8) {
        lock(&self.state).mic_level = level;
    }

    /// The student leaves fullscreen (e.g. presses Esc).
    pub fn leave_fullscreen(&self) {
        lock(&self.state).fullscreen = false;
        let _ = self.sender.try_send(PageEvent::FullscreenExited);
    }

    pub fn return_to_fullscreen(&self) {
        lock(&self.state).fullscreen = true;
        let _ = self.sender.try_send(PageEvent::FullscreenEntered);
    }

    pub fn hide_tab(&self) {
        let _ = self.sender.try_send(PageEvent::TabHidden);
    }

    pub fn show_tab(&self) {
        let _ = self.sender.try_send(PageEvent::TabVisible);
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_and_stops_tracks() {
        let mut backend = SimulatedBackend::new();
        let probe = backend.probe();

        let handles = backend.open_camera_and_mic().unwrap();
        assert_eq!(handles.tracks.len(), 2);
        assert_eq!(probe.live_tracks(), 2);

        for track in &handles.tracks {
            backend.stop_track(track);
            backend.stop_track(track);
        }
        assert_eq!(probe.live_tracks(), 0);
        assert_eq!(probe.stop_calls(), 2);
    }

    #[test]
    fn test_denied_microphone() {
        let mut backend = SimulatedBackend::with_grants(SimulatedGrants {
            microphone: false,
            ..SimulatedGrants::default()
        });
        assert_eq!(
            backend.open_camera_and_mic(),
            Err(DeviceError::PermissionDenied(MediaKind::Microphone))
        );
    }

    #[test]
    fn test_frame_requires_live_camera() {
        let mut backend = SimulatedBackend::new();
        assert!(backend.capture_frame().is_none());

        backend.open_camera_and_mic().unwrap();
        assert!(backend.capture_frame().is_some());

        backend.probe().set_frame_ready(false);
        assert!(backend.capture_frame().is_none());
    }

    #[test]
    fn test_probe_emits_page_events() {
        let backend = SimulatedBackend::new();
        let events = backend.page_events();
        let probe = backend.probe();

        probe.return_to_fullscreen();
        probe.leave_fullscreen();
        probe.hide_tab();

        assert_eq!(events.try_recv(), Ok(PageEvent::FullscreenEntered));
        assert_eq!(events.try_recv(), Ok(PageEvent::FullscreenExited));
        assert_eq!(events.try_recv(), Ok(PageEvent::TabHidden));
        assert!(!probe.is_fullscreen());
    }
}
