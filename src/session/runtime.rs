//! Async driver for a [`SessionController`].
//!
//! The runtime owns the clocks and the I/O the controller itself never
//! touches: it fires sampling and one-second ticks, runs frame
//! classifications on tasks bounded by the analysis timeout and aborted
//! when the attempt ends,
//! forwards platform page events from the backend's crossbeam channel, and
//! accepts user input through a [`RuntimeHandle`]. Every input funnels
//! into the one controller, so pause decisions are never made
//! concurrently.

use crate::collaborators::{CollaboratorError, PerformanceAnalyzer, VisualAnalyzer};
use crate::core::results::ExamResults;
use crate::core::signals::SampleResult;
use crate::device::{DeviceBackend, Frame, PageEvent};
use crate::session::controller::{
    SessionController, SessionError, SessionEvent, SessionInput, SessionState,
};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type Completion = (u64, Result<SampleResult, CollaboratorError>);

/// How often the page-event bridge checks whether the runtime has gone away.
const BRIDGE_POLL: Duration = Duration::from_millis(100);

/// Sends user input to a session, before or while it runs.
///
/// Sending never blocks, so it is safe from signal handlers and from code
/// that queues input before [`SessionRuntime::run`] starts.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl RuntimeHandle {
    /// Returns `false` once the session loop has finished.
    pub fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn end_exam(&self) -> bool {
        self.send(SessionInput::EndExam)
    }
}

/// Drives one attempt from InProgress to Results.
pub struct SessionRuntime<B: DeviceBackend> {
    controller: SessionController<B>,
    visual: Arc<dyn VisualAnalyzer>,
    performance: Arc<dyn PerformanceAnalyzer>,
    observer: Option<mpsc::UnboundedSender<SessionEvent>>,
    input_tx: mpsc::UnboundedSender<SessionInput>,
    input_rx: mpsc::UnboundedReceiver<SessionInput>,
}

impl<B: DeviceBackend> SessionRuntime<B> {
    pub fn new(
        controller: SessionController<B>,
        visual: Arc<dyn VisualAnalyzer>,
        performance: Arc<dyn PerformanceAnalyzer>,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            controller,
            visual,
            performance,
            observer: None,
            input_tx,
            input_rx,
        }
    }

    /// Publish every controller event to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inputs: self.input_tx.clone(),
        }
    }

    pub fn controller(&self) -> &SessionController<B> {
        &self.controller
    }

    /// Run the attempt to completion.
    ///
    /// Begins the exam if the controller is still on the instructions
    /// screen. Returns once Results is reached; performance feedback is
    /// best-effort and never prevents that.
    pub async fn run(self) -> Result<ExamResults, SessionError> {
        let SessionRuntime {
            mut controller,
            visual,
            performance,
            observer,
            input_tx,
            mut input_rx,
        } = self;
        // Handles stay usable for the whole run.
        let _keep_open = input_tx;

        if controller.state() == SessionState::Instructions {
            controller.begin_exam()?;
        }
        if !controller.state().is_active() && !controller.state().is_finished() {
            return Err(SessionError::InvalidTransition {
                from: controller.state(),
                action: "run the session",
            });
        }

        // Transitions queued before the loop (such as entering fullscreen)
        // are applied now so the bridge only carries later ones.
        let backend_events = controller.page_events();
        for event in backend_events.try_iter() {
            controller.dispatch(SessionInput::Page(event))?;
        }
        let mut page_rx = spawn_page_bridge(backend_events);

        let period = controller.settings().sample_period;
        let analysis_timeout = controller.settings().analysis_timeout;
        let mut sampling = interval_at(Instant::now() + period, period);
        sampling.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let second = Duration::from_secs(1);
        let mut clock = interval_at(Instant::now() + second, second);

        let mut classifications = JoinSet::new();
        let mut in_flight = None;

        info!("Session {} running", controller.attempt_id());
        loop {
            for event in controller.drain_events() {
                if let SessionEvent::AnalyzeFrame(request) = &event {
                    in_flight = Some(request.sequence);
                    spawn_classification(
                        &mut classifications,
                        Arc::clone(&visual),
                        request.sequence,
                        request.frame.clone(),
                        analysis_timeout,
                    );
                }
                publish(&observer, event);
            }
            if controller.state().is_finished() {
                break;
            }

            let input = tokio::select! {
                _ = sampling.tick() => SessionInput::SampleTick,
                _ = clock.tick() => SessionInput::ClockTick,
                Some(joined) = classifications.join_next(), if !classifications.is_empty() => {
                    match joined {
                        Ok((sequence, outcome)) => SessionInput::AnalysisCompleted { sequence, outcome },
                        Err(e) => {
                            warn!("Classification task failed: {e}");
                            let Some(sequence) = in_flight else { continue };
                            SessionInput::AnalysisCompleted {
                                sequence,
                                outcome: Err(CollaboratorError::Network(e.to_string())),
                            }
                        }
                    }
                }
                Some(event) = page_rx.recv() => SessionInput::Page(event),
                Some(input) = input_rx.recv() => input,
            };

            if let Err(e) = controller.dispatch(input) {
                warn!("Input rejected: {e}");
            }
        }

        // Closing the receiver stops the bridge thread.
        drop(page_rx);
        classifications.abort_all();
        while classifications.join_next().await.is_some() {}

        let results = controller.finalize(performance.as_ref()).await?;
        for event in controller.drain_events() {
            publish(&observer, event);
        }
        Ok(results)
    }
}

fn publish(observer: &Option<mpsc::UnboundedSender<SessionEvent>>, event: SessionEvent) {
    if let Some(observer) = observer {
        // A dropped observer only means nobody is watching.
        let _ = observer.send(event);
    }
}

fn spawn_classification(
    tasks: &mut JoinSet<Completion>,
    visual: Arc<dyn VisualAnalyzer>,
    sequence: u64,
    frame: Frame,
    timeout: Duration,
) {
    tasks.spawn(async move {
        let outcome = match tokio::time::timeout(timeout, visual.classify(&frame)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("Classification #{sequence} timed out");
                Err(CollaboratorError::Timeout)
            }
        };
        (sequence, outcome)
    });
}

/// Forward backend page events into the async loop on a plain thread.
fn spawn_page_bridge(events: crossbeam_channel::Receiver<PageEvent>) -> mpsc::Receiver<PageEvent> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || loop {
        match events.recv_timeout(BRIDGE_POLL) {
            Ok(event) => {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    });
    rx
}
