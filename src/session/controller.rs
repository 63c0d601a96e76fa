//! The proctored-session state machine.
//!
//! [`SessionController`] owns every component of an attempt and is the only
//! place their outputs meet. It is synchronous and deterministic: time and
//! I/O arrive as [`SessionInput`]s, and everything the outside world must
//! act on (frames to classify, state changes, countdown ticks) leaves
//! through an event outbox drained with
//! [`drain_events`](SessionController::drain_events).
//!
//! ```text
//! Idle ─load_quiz─▶ AcquiringPermissions ─all grants─▶ Instructions
//!                                                          │ begin_exam
//!                                                          ▼
//!            Results ◀─finalize─ Submitting ◀─end─ InProgress ⇄ Paused
//! ```

use crate::audit::{create_shared_log, SharedAuditLog};
use crate::collaborators::{CollaboratorError, PerformanceAnalyzer, QuizStore};
use crate::core::audio::{MicActivityDetector, DEFAULT_MIC_FLOOR, DEFAULT_MIC_WINDOW};
use crate::core::fullscreen::{FullscreenGuard, GuardEvent, DEFAULT_FULLSCREEN_TIMEOUT_SECS};
use crate::core::quiz::{AnswerSet, Question, Quiz, QuizId};
use crate::core::results::{ExamResults, ResultsBuilder, Submission, SubmitReason};
use crate::core::sampler::{
    AnalysisRequest, EnvironmentSampler, SamplerEvent, TickOutcome, DEFAULT_SAMPLE_PERIOD,
};
use crate::core::signals::{AdvisoryKind, Sample, SampleResult, ViolationKind, ViolationRecord};
use crate::core::timer::{ExamTimer, TimerState};
use crate::core::violations::{AggregatorEvent, ViolationAggregator, DEFAULT_GRACE_TICKS};
use crate::device::{
    DeviceAccessManager, DeviceBackend, DeviceError, MediaHandles, PageEvent, PermissionState,
};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of one exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AcquiringPermissions,
    Instructions,
    InProgress,
    Paused,
    Submitting,
    Results,
}

impl SessionState {
    /// The exam is running (answering possible or paused by a violation).
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::InProgress | SessionState::Paused)
    }

    /// Submission has started; answers are frozen.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Submitting | SessionState::Results)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::AcquiringPermissions => "acquiring_permissions",
            SessionState::Instructions => "instructions",
            SessionState::InProgress => "in_progress",
            SessionState::Paused => "paused",
            SessionState::Submitting => "submitting",
            SessionState::Results => "results",
        };
        f.write_str(name)
    }
}

/// Tunables for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub sample_period: Duration,
    pub grace_ticks: u32,
    pub fullscreen_timeout_secs: u32,
    pub mic_floor: f64,
    pub mic_window: usize,
    pub analysis_timeout: Duration,
    pub exam_duration_secs: u32,
    /// Stop the exam clock while a violation holds the session paused
    pub pause_clock_on_violation: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            grace_ticks: DEFAULT_GRACE_TICKS,
            fullscreen_timeout_secs: DEFAULT_FULLSCREEN_TIMEOUT_SECS,
            mic_floor: DEFAULT_MIC_FLOOR,
            mic_window: DEFAULT_MIC_WINDOW,
            analysis_timeout: Duration::from_secs(10),
            exam_duration_secs: 600,
            pause_clock_on_violation: false,
        }
    }
}

/// Everything that can happen to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// The sampling interval fired
    SampleTick,
    /// A classification requested through [`SessionEvent::AnalyzeFrame`] finished
    AnalysisCompleted {
        sequence: u64,
        outcome: Result<SampleResult, CollaboratorError>,
    },
    /// Fullscreen or visibility transition from the platform
    Page(PageEvent),
    /// One second of wall time elapsed
    ClockTick,
    /// `None` clears the selection
    SelectAnswer {
        question: usize,
        option: Option<usize>,
    },
    AdvanceQuestion,
    PreviousQuestion,
    GoToQuestion(usize),
    /// The student confirmed they are back on the exam tab
    AcknowledgeTabReturn,
    /// The student ended the exam
    EndExam,
}

/// Controller output, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ViolationRaised(ViolationKind),
    ViolationCleared(ViolationKind),
    CountdownTick {
        remaining: u32,
    },
    Advisory(AdvisoryKind),
    /// The classifier failed; a transient warning, not a violation
    AnalysisError(String),
    /// Send this frame to the visual analyzer and report back with
    /// [`SessionInput::AnalysisCompleted`]
    AnalyzeFrame(AnalysisRequest),
    TimeUp,
    ForceTerminate,
    Submitted(SubmitReason),
}

/// Session error types.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The action is not valid in the current state
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
    /// Answering is blocked while a violation is active
    Paused,
    /// Answers were frozen at submission
    Frozen,
    /// Not all of camera, microphone and whole-screen share are granted
    PermissionsIncomplete,
    QuestionOutOfRange(usize),
    OptionOutOfRange {
        question: usize,
        option: usize,
    },
    Device(DeviceError),
    Store(CollaboratorError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidTransition { from, action } => {
                write!(f, "Cannot {action} while {from}")
            }
            SessionError::Paused => write!(f, "The exam is paused"),
            SessionError::Frozen => write!(f, "The exam has been submitted"),
            SessionError::PermissionsIncomplete => {
                write!(f, "Camera, microphone and whole-screen share are all required")
            }
            SessionError::QuestionOutOfRange(q) => write!(f, "No question {q}"),
            SessionError::OptionOutOfRange { question, option } => {
                write!(f, "Question {question} has no option {option}")
            }
            SessionError::Device(e) => write!(f, "{e}"),
            SessionError::Store(e) => write!(f, "Could not load quiz: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DeviceError> for SessionError {
    fn from(e: DeviceError) -> Self {
        SessionError::Device(e)
    }
}

/// One proctored exam attempt.
pub struct SessionController<B: DeviceBackend> {
    attempt_id: Uuid,
    state: SessionState,
    settings: SessionSettings,
    devices: DeviceAccessManager<B>,
    sampler: EnvironmentSampler,
    guard: FullscreenGuard,
    aggregator: ViolationAggregator,
    timer: ExamTimer,
    quiz: Option<(QuizId, Quiz)>,
    answers: AnswerSet,
    current_question: usize,
    submit_reason: Option<SubmitReason>,
    results: Option<ExamResults>,
    results_builder: ResultsBuilder,
    audit: SharedAuditLog,
    outbox: VecDeque<SessionEvent>,
}

impl<B: DeviceBackend> SessionController<B> {
    pub fn new(backend: B, settings: SessionSettings) -> Self {
        let mic = MicActivityDetector::new(settings.mic_floor, settings.mic_window);
        Self {
            attempt_id: Uuid::new_v4(),
            state: SessionState::Idle,
            devices: DeviceAccessManager::new(backend),
            sampler: EnvironmentSampler::new(mic),
            guard: FullscreenGuard::new(settings.fullscreen_timeout_secs),
            aggregator: ViolationAggregator::new(settings.grace_ticks),
            timer: ExamTimer::new(),
            quiz: None,
            answers: AnswerSet::new(0),
            current_question: 0,
            submit_reason: None,
            results: None,
            results_builder: ResultsBuilder::new(),
            audit: create_shared_log(),
            outbox: VecDeque::new(),
            settings,
        }
    }

    /// Record counters into a shared audit log.
    pub fn with_audit_log(mut self, audit: SharedAuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_results_builder(mut self, builder: ResultsBuilder) -> Self {
        self.results_builder = builder;
        self
    }

    // ----- queries -----

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn permissions(&self) -> PermissionState {
        self.devices.permissions()
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref().map(|(_, quiz)| quiz)
    }

    pub fn current_question(&self) -> usize {
        self.current_question
    }

    pub fn question(&self) -> Option<&Question> {
        self.quiz()?.questions.get(self.current_question)
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn timer(&self) -> TimerState {
        self.timer.state()
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.guard.countdown_remaining()
    }

    /// The pause reason to show; screen violations win over presence ones.
    pub fn active_violation(&self) -> Option<ViolationKind> {
        self.aggregator.active().map(|record| record.kind)
    }

    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.aggregator.records()
    }

    pub fn submit_reason(&self) -> Option<SubmitReason> {
        self.submit_reason
    }

    pub fn results(&self) -> Option<&ExamResults> {
        self.results.as_ref()
    }

    pub fn held_tracks(&self) -> usize {
        self.devices.held_tracks()
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    /// Platform fullscreen/visibility transitions, to be fed back as
    /// [`SessionInput::Page`].
    pub fn page_events(&self) -> Receiver<PageEvent> {
        self.devices.page_events()
    }

    /// Take all events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.outbox.drain(..).collect()
    }

    // ----- setup -----

    /// Load the quiz for this attempt from the content store.
    pub async fn load_quiz<S: QuizStore + ?Sized>(
        &mut self,
        store: &S,
        id: QuizId,
    ) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle, "load a quiz")?;
        let quiz = store.get(id).await.map_err(|e| {
            warn!("Quiz {id} could not be loaded: {e}");
            SessionError::Store(e)
        })?;
        self.accept_quiz(id, quiz)
    }

    /// Use an already loaded quiz.
    pub fn accept_quiz(&mut self, id: QuizId, quiz: Quiz) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle, "load a quiz")?;
        info!("Loaded quiz {id}: {} ({} questions)", quiz.topic, quiz.len());
        self.answers = AnswerSet::new(quiz.len());
        self.current_question = 0;
        self.quiz = Some((id, quiz));
        self.transition(SessionState::AcquiringPermissions);
        Ok(())
    }

    pub fn request_camera_and_mic(&mut self) -> Result<MediaHandles, SessionError> {
        self.expect_permission_phase("request camera and microphone")?;
        let handles = self.devices.acquire_camera_and_mic()?;
        self.advance_if_permitted();
        Ok(handles)
    }

    /// Request the whole-screen share. A window or tab is refused with
    /// [`DeviceError::NotWholeScreen`]; the caller may simply retry.
    pub fn request_screen_share(&mut self) -> Result<MediaHandles, SessionError> {
        self.expect_permission_phase("request a screen share")?;
        let handles = self.devices.acquire_full_screen_share()?;
        self.advance_if_permitted();
        Ok(handles)
    }

    /// Enter fullscreen and start guarding, sampling and the exam clock.
    pub fn begin_exam(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Instructions, "begin the exam")?;
        if !self.devices.permissions().all_granted() {
            return Err(SessionError::PermissionsIncomplete);
        }

        self.devices.enter_fullscreen()?;
        self.guard.start();
        self.sampler.start_sampling(self.settings.sample_period);
        self.transition(SessionState::InProgress);

        if self.timer.start(self.settings.exam_duration_secs).is_some() {
            self.time_up();
        }
        Ok(())
    }

    // ----- running -----

    /// Feed one input into the state machine.
    ///
    /// Signals (ticks, completions, page events) arriving outside an active
    /// exam are ignored; user actions in the wrong state are errors.
    pub fn dispatch(&mut self, input: SessionInput) -> Result<(), SessionError> {
        match input {
            SessionInput::SampleTick => {
                if self.state.is_active() {
                    self.sample_tick();
                }
                Ok(())
            }
            SessionInput::AnalysisCompleted { sequence, outcome } => {
                if self.state.is_active() {
                    self.analysis_completed(sequence, outcome);
                }
                Ok(())
            }
            SessionInput::Page(event) => {
                if self.state.is_active() {
                    self.page_event(event);
                }
                Ok(())
            }
            SessionInput::ClockTick => {
                if self.state.is_active() {
                    self.clock_tick();
                }
                Ok(())
            }
            SessionInput::SelectAnswer { question, option } => self.select_answer(question, option),
            SessionInput::AdvanceQuestion => {
                let next = self.current_question + 1;
                self.go_to_question(next)
            }
            SessionInput::PreviousQuestion => {
                let previous = self
                    .current_question
                    .checked_sub(1)
                    .ok_or(SessionError::QuestionOutOfRange(0))?;
                self.go_to_question(previous)
            }
            SessionInput::GoToQuestion(index) => self.go_to_question(index),
            SessionInput::AcknowledgeTabReturn => {
                self.expect_active("acknowledge tab return")?;
                let events = self.guard.acknowledge_tab_return();
                self.apply_guard_events(events);
                Ok(())
            }
            SessionInput::EndExam => {
                if self.state.is_finished() {
                    return Ok(());
                }
                self.expect_active("end the exam")?;
                info!("Exam ended by the student");
                self.submit(SubmitReason::UserEnded);
                Ok(())
            }
        }
    }

    /// Attach best-effort performance feedback and move to Results.
    ///
    /// Feedback failures and timeouts only mark the results as partial.
    /// Calling again after Results returns the same report.
    pub async fn finalize<A: PerformanceAnalyzer + ?Sized>(
        &mut self,
        analyzer: &A,
    ) -> Result<ExamResults, SessionError> {
        if self.state == SessionState::Results {
            if let Some(results) = &self.results {
                return Ok(results.clone());
            }
        }
        self.expect_state(SessionState::Submitting, "finalize results")?;

        let Some(mut results) = self.results.take() else {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action: "finalize results without a report",
            });
        };

        let request = results.performance_request();
        let outcome =
            match tokio::time::timeout(self.settings.analysis_timeout, analyzer.analyze(&request))
                .await
            {
                Ok(Ok(report)) => Ok(report),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(CollaboratorError::Timeout.to_string()),
            };
        if let Err(e) = &outcome {
            warn!("Performance analysis unavailable, results are partial: {e}");
        }
        results.attach_analysis(outcome);

        self.results = Some(results.clone());
        self.transition(SessionState::Results);
        info!(
            "Results ready: {:.1}% ({}/{})",
            results.score.percent, results.score.correct, results.score.total
        );
        Ok(results)
    }

    fn sample_tick(&mut self) {
        match self
            .sampler
            .tick(&mut self.devices, self.guard.countdown_active())
        {
            TickOutcome::Requested(request) => {
                self.outbox.push_back(SessionEvent::AnalyzeFrame(request));
            }
            TickOutcome::Skipped(sample) => {
                self.audit.record_sample_skipped();
                self.apply_sample(&sample);
            }
            TickOutcome::Suppressed(reason) => debug!("Sample tick suppressed: {reason:?}"),
        }
    }

    fn analysis_completed(
        &mut self,
        sequence: u64,
        outcome: Result<SampleResult, CollaboratorError>,
    ) {
        match self.sampler.complete(sequence, outcome) {
            Some(SamplerEvent::Sample(sample)) => {
                self.audit.record_sample_analysed();
                self.apply_sample(&sample);
            }
            Some(SamplerEvent::AnalysisError(message)) => {
                self.audit.record_analysis_error();
                self.outbox.push_back(SessionEvent::AnalysisError(message));
            }
            None => {}
        }
    }

    fn apply_sample(&mut self, sample: &Sample) {
        let events = self.aggregator.on_sample(sample);
        self.apply_aggregator_events(events);
    }

    fn page_event(&mut self, event: PageEvent) {
        let events = match event {
            PageEvent::FullscreenExited => self.guard.on_fullscreen_exit(),
            PageEvent::FullscreenEntered => self.guard.on_fullscreen_enter(),
            PageEvent::TabHidden => self
                .guard
                .on_tab_hidden(self.state == SessionState::InProgress),
            PageEvent::TabVisible => {
                debug!("Tab visible again; waiting for acknowledgement");
                Vec::new()
            }
        };
        self.apply_guard_events(events);
    }

    fn clock_tick(&mut self) {
        let events = self.guard.tick();
        self.apply_guard_events(events);
        if !self.state.is_active() {
            return;
        }
        if self.timer.tick().is_some() {
            self.time_up();
        }
    }

    fn time_up(&mut self) {
        info!("Exam time is up");
        self.outbox.push_back(SessionEvent::TimeUp);
        self.submit(SubmitReason::TimeUp);
    }

    fn apply_guard_events(&mut self, events: Vec<GuardEvent>) {
        for event in events {
            match event {
                GuardEvent::Violation(kind) => {
                    let raised = self.aggregator.on_screen_violation(kind);
                    self.apply_aggregator_events(raised);
                }
                GuardEvent::ViolationCleared(kind) => {
                    let cleared = self.aggregator.on_screen_cleared(kind);
                    self.apply_aggregator_events(cleared);
                }
                GuardEvent::CountdownTick { remaining } => {
                    self.outbox
                        .push_back(SessionEvent::CountdownTick { remaining });
                    self.sync_pause();
                }
                GuardEvent::ForceTerminate => {
                    error!("Fullscreen was not restored in time; ending the attempt");
                    self.audit.record_forced_termination();
                    self.outbox.push_back(SessionEvent::ForceTerminate);
                    self.submit(SubmitReason::FullscreenTimeout);
                }
            }
        }
    }

    fn apply_aggregator_events(&mut self, events: Vec<AggregatorEvent>) {
        for event in events {
            match event {
                AggregatorEvent::Raised(kind) => {
                    self.audit.record_violation(kind);
                    self.outbox.push_back(SessionEvent::ViolationRaised(kind));
                }
                AggregatorEvent::Cleared(kind) => {
                    self.outbox.push_back(SessionEvent::ViolationCleared(kind));
                }
                AggregatorEvent::Advisory(kind) => {
                    self.audit.record_advisory();
                    self.outbox.push_back(SessionEvent::Advisory(kind));
                }
            }
        }
        self.sync_pause();
    }

    /// Derive InProgress/Paused from the aggregator and the countdown.
    fn sync_pause(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let paused = self.aggregator.is_paused() || self.guard.countdown_active();
        if self.settings.pause_clock_on_violation {
            self.timer.set_paused(paused);
        }
        let target = if paused {
            SessionState::Paused
        } else {
            SessionState::InProgress
        };
        if target != self.state {
            self.transition(target);
        }
    }

    fn select_answer(&mut self, question: usize, option: Option<usize>) -> Result<(), SessionError> {
        self.expect_answerable()?;
        let q = self
            .quiz()
            .and_then(|quiz| quiz.questions.get(question))
            .ok_or(SessionError::QuestionOutOfRange(question))?;
        if let Some(option) = option {
            if option >= q.options.len() {
                return Err(SessionError::OptionOutOfRange { question, option });
            }
        }
        if !self.answers.select(question, option) {
            return Err(SessionError::Frozen);
        }
        debug!("Question {question} answered with {option:?}");
        Ok(())
    }

    fn go_to_question(&mut self, index: usize) -> Result<(), SessionError> {
        self.expect_answerable()?;
        let count = self.quiz().map_or(0, Quiz::len);
        if index >= count {
            return Err(SessionError::QuestionOutOfRange(index));
        }
        self.current_question = index;
        Ok(())
    }

    /// Enter Submitting. Every exit path comes through here; a second call
    /// does nothing.
    fn submit(&mut self, reason: SubmitReason) {
        if self.state.is_finished() {
            return;
        }
        self.transition(SessionState::Submitting);
        self.submit_reason = Some(reason);

        self.sampler.stop();
        self.guard.stop();
        self.timer.stop();
        self.devices.release_all();
        self.devices.leave_fullscreen();
        self.answers.freeze();
        self.aggregator.close_all();

        match &self.quiz {
            Some((quiz_id, quiz)) => {
                let results = self.results_builder.build(Submission {
                    attempt_id: self.attempt_id,
                    quiz_id: *quiz_id,
                    quiz,
                    answers: &self.answers,
                    reason,
                    violations: self.aggregator.records(),
                    advisories: self.aggregator.advisory_counts(),
                });
                info!(
                    "Attempt {} submitted ({reason}): {}/{} correct",
                    self.attempt_id, results.score.correct, results.score.total
                );
                self.results = Some(results);
            }
            None => error!("Attempt {} submitted without a quiz", self.attempt_id),
        }

        self.audit.record_session_submitted();
        self.outbox.push_back(SessionEvent::Submitted(reason));
    }

    fn advance_if_permitted(&mut self) {
        if self.state == SessionState::AcquiringPermissions
            && self.devices.permissions().all_granted()
        {
            self.transition(SessionState::Instructions);
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!("Session {from} -> {to}");
        self.state = to;
        self.outbox.push_back(SessionEvent::StateChanged { from, to });
    }

    fn expect_state(&self, wanted: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn expect_permission_phase(&self, action: &'static str) -> Result<(), SessionError> {
        match self.state {
            SessionState::AcquiringPermissions | SessionState::Instructions => Ok(()),
            from => Err(SessionError::InvalidTransition { from, action }),
        }
    }

    fn expect_active(&self, action: &'static str) -> Result<(), SessionError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn expect_answerable(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::InProgress => Ok(()),
            SessionState::Paused => Err(SessionError::Paused),
            SessionState::Submitting | SessionState::Results => Err(SessionError::Frozen),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "answer questions",
            }),
        }
    }
}
