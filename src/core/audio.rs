//! Microphone activity detection from frequency-domain spectra.
//!
//! Only the mean bin energy over a short window is retained - never audio.

use crate::device::AudioSpectrum;
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Default loudness floor on the 0-255 byte-frequency scale.
pub const DEFAULT_MIC_FLOOR: f64 = 5.0;

/// Default number of spectra averaged together.
pub const DEFAULT_MIC_WINDOW: usize = 4;

/// Decides whether the microphone is picking up sound.
#[derive(Debug, Clone)]
pub struct MicActivityDetector {
    floor: f64,
    window: usize,
    recent: VecDeque<AudioSpectrum>,
}

impl MicActivityDetector {
    pub fn new(floor: f64, window: usize) -> Self {
        let window = window.max(1);
        Self {
            floor,
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    /// Feed the latest spectrum (or its absence) and return whether the
    /// microphone is active.
    ///
    /// A missing spectrum means the microphone track is gone, which is
    /// reported as inactive and clears the window.
    pub fn observe(&mut self, spectrum: Option<AudioSpectrum>) -> bool {
        let Some(spectrum) = spectrum else {
            self.recent.clear();
            return false;
        };

        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(spectrum);

        self.mean_level() > self.floor
    }

    /// Mean bin amplitude over the window; 0 when empty.
    pub fn mean_level(&self) -> f64 {
        let mean = self
            .recent
            .iter()
            .flat_map(|spectrum| spectrum.iter().map(|&bin| f64::from(bin)))
            .mean();
        if mean.is_nan() {
            0.0
        } else {
            mean
        }
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

impl Default for MicActivityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MIC_FLOOR, DEFAULT_MIC_WINDOW)
    }
}
