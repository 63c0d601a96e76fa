//! Periodic environment sampling.
//!
//! Each tick grabs a camera frame for the visual-anomaly classifier and a
//! microphone spectrum for the local activity detector. At most one
//! classification request is outstanding; ticks arriving while one is in
//! flight, or while a fullscreen countdown is running, are suppressed
//! rather than queued.

use crate::collaborators::CollaboratorError;
use crate::core::audio::MicActivityDetector;
use crate::core::signals::{Sample, SampleResult};
use crate::device::{DeviceAccessManager, DeviceBackend, Frame};
use std::time::Duration;
use tracing::{debug, warn};

/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(5);

/// A frame handed to the visual-anomaly classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Matches the completion back to this tick
    pub sequence: u64,
    pub frame: Frame,
}

/// Why a tick did not sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NotRunning,
    CountdownActive,
    InFlight,
}

/// Result of a sampling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was captured and must be sent for classification
    Requested(AnalysisRequest),
    /// No frame was available; the sample is complete without a verdict
    Skipped(Sample),
    /// Nothing was captured
    Suppressed(SuppressReason),
}

/// Result of completing an outstanding classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerEvent {
    Sample(Sample),
    /// The classifier failed; not a violation
    AnalysisError(String),
}

/// Drives periodic frame/audio capture with single-request backpressure.
#[derive(Debug)]
pub struct EnvironmentSampler {
    period: Duration,
    running: bool,
    in_flight: Option<u64>,
    next_sequence: u64,
    pending_mic_active: bool,
    mic: MicActivityDetector,
}

impl EnvironmentSampler {
    pub fn new(mic: MicActivityDetector) -> Self {
        Self {
            period: DEFAULT_SAMPLE_PERIOD,
            running: false,
            in_flight: None,
            next_sequence: 0,
            pending_mic_active: false,
            mic,
        }
    }

    pub fn start_sampling(&mut self, period: Duration) {
        self.period = period;
        self.running = true;
        debug!("Sampling started every {}ms", period.as_millis());
    }

    /// Stop sampling. An outstanding classification is abandoned and its
    /// completion will be ignored.
    pub fn stop(&mut self) {
        if self.running {
            debug!("Sampling stopped");
        }
        self.running = false;
        self.in_flight = None;
        self.mic.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Run one sampling tick against the held devices.
    pub fn tick<B: DeviceBackend>(
        &mut self,
        devices: &mut DeviceAccessManager<B>,
        countdown_active: bool,
    ) -> TickOutcome {
        if !self.running {
            return TickOutcome::Suppressed(SuppressReason::NotRunning);
        }
        if countdown_active {
            return TickOutcome::Suppressed(SuppressReason::CountdownActive);
        }
        if self.in_flight.is_some() {
            debug!("Sample skipped: classification still in flight");
            return TickOutcome::Suppressed(SuppressReason::InFlight);
        }

        let mic_active = self.mic.observe(devices.audio_spectrum());

        match devices.capture_frame() {
            Some(frame) => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.in_flight = Some(sequence);
                self.pending_mic_active = mic_active;
                TickOutcome::Requested(AnalysisRequest { sequence, frame })
            }
            None => {
                debug!("Sample skipped: video surface not ready");
                TickOutcome::Skipped(Sample::Skipped { mic_active })
            }
        }
    }

    /// Complete the outstanding classification.
    ///
    /// Returns `None` for stale completions (wrong sequence, or sampling
    /// already stopped).
    pub fn complete(
        &mut self,
        sequence: u64,
        outcome: Result<SampleResult, CollaboratorError>,
    ) -> Option<SamplerEvent> {
        if !self.running || self.in_flight != Some(sequence) {
            debug!("Ignoring stale classification #{sequence}");
            return None;
        }
        self.in_flight = None;

        match outcome {
            Ok(result) => Some(SamplerEvent::Sample(Sample::Analysed {
                result,
                mic_active: self.pending_mic_active,
            })),
            Err(e) => {
                warn!("Visual analysis failed: {e}");
                Some(SamplerEvent::AnalysisError(e.to_string()))
            }
        }
    }
}

impl Default for EnvironmentSampler {
    fn default() -> Self {
        Self::new(MicActivityDetector::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBackend;

    fn granted_devices() -> (DeviceAccessManager<SimulatedBackend>, crate::device::SimulatedProbe) {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let mut devices = DeviceAccessManager::new(backend);
        devices.acquire_camera_and_mic().unwrap();
        (devices, probe)
    }

    #[test]
    fn test_not_running_is_suppressed() {
        let (mut devices, _probe) = granted_devices();
        let mut sampler = EnvironmentSampler::default();
        assert_eq!(
            sampler.tick(&mut devices, false),
            TickOutcome::Suppressed(SuppressReason::NotRunning)
        );
    }

    #[test]
    fn test_at_most_one_request_in_flight() {
        let (mut devices, _probe) = granted_devices();
        let mut sampler = EnvironmentSampler::default();
        sampler.start_sampling(Duration::from_secs(1));

        let TickOutcome::Requested(request) = sampler.tick(&mut devices, false) else {
            panic!("expected a request");
        };
        assert!(sampler.in_flight());
        assert_eq!(
            sampler.tick(&mut devices, false),
            TickOutcome::Suppressed(SuppressReason::InFlight)
        );

        let event = sampler.complete(request.sequence, Ok(SampleResult::present()));
        assert_eq!(
            event,
            Some(SamplerEvent::Sample(Sample::Analysed {
                result: SampleResult::present(),
                mic_active: true,
            }))
        );
        assert!(!sampler.in_flight());
        assert!(matches!(sampler.tick(&mut devices, false), TickOutcome::Requested(_)));
    }

    #[test]
    fn test_countdown_suppresses_sampling() {
        let (mut devices, _probe) = granted_devices();
        let mut sampler = EnvironmentSampler::default();
        sampler.start_sampling(Duration::from_secs(1));
        assert_eq!(
            sampler.tick(&mut devices, true),
            TickOutcome::Suppressed(SuppressReason::CountdownActive)
        );
    }

    #[test]
    fn test_unready_frame_is_skipped() {
        let (mut devices, probe) = granted_devices();
        probe.set_frame_ready(false);
        probe.set_mic_level(0);
        let mut sampler = EnvironmentSampler::default();
        sampler.start_sampling(Duration::from_secs(1));

        assert_eq!(
            sampler.tick(&mut devices, false),
            TickOutcome::Skipped(Sample::Skipped { mic_active: false })
        );
        assert!(!sampler.in_flight());
    }

    #[test]
    fn test_analysis_failure_is_reported_not_sampled() {
        let (mut devices, _probe) = granted_devices();
        let mut sampler = EnvironmentSampler::default();
        sampler.start_sampling(Duration::from_secs(1));

        let TickOutcome::Requested(request) = sampler.tick(&mut devices, false) else {
            panic!("expected a request");
        };
        let event = sampler.complete(request.sequence, Err(CollaboratorError::Timeout));
        assert!(matches!(event, Some(SamplerEvent::AnalysisError(_))));
        assert!(!sampler.in_flight());
    }

    #[test]
    fn test_completion_after_stop_is_ignored() {
        let (mut devices, _probe) = granted_devices();
        let mut sampler = EnvironmentSampler::default();
        sampler.start_sampling(Duration::from_secs(1));

        let TickOutcome::Requested(request) = sampler.tick(&mut devices, false) else {
            panic!("expected a request");
        };
        sampler.stop();
        assert_eq!(sampler.complete(request.sequence, Ok(SampleResult::absent())), None);
    }
}
