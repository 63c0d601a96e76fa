//! End-to-end scenarios against the session controller and simulated devices.

use exam_proctor::collaborators::{
    CollaboratorError, InMemoryQuizStore, QuizStore, ScriptedPerformanceAnalyzer,
};
use exam_proctor::core::{Quiz, SampleResult, SubmitReason, ViolationKind};
use exam_proctor::device::{
    DeviceError, DisplaySurface, MediaKind, SimulatedBackend, SimulatedGrants, SimulatedProbe,
};
use exam_proctor::session::{
    SessionController, SessionError, SessionEvent, SessionInput, SessionSettings, SessionState,
};

type Session = SessionController<SimulatedBackend>;

async fn loaded_session(backend: SimulatedBackend) -> Session {
    let store = InMemoryQuizStore::new();
    let id = store.save(&Quiz::sample()).await.unwrap();
    let mut session = SessionController::new(backend, SessionSettings::default());
    session.load_quiz(&store, id).await.unwrap();
    session
}

async fn started_session() -> (Session, SimulatedProbe) {
    let backend = SimulatedBackend::new();
    let probe = backend.probe();
    let mut session = loaded_session(backend).await;
    session.request_camera_and_mic().unwrap();
    session.request_screen_share().unwrap();
    session.begin_exam().unwrap();
    pump_page_events(&mut session);
    session.drain_events();
    (session, probe)
}

/// Feed whatever the backend reported into the controller.
fn pump_page_events(session: &mut Session) {
    let events: Vec<_> = session.page_events().try_iter().collect();
    for event in events {
        session.dispatch(SessionInput::Page(event)).unwrap();
    }
}

/// Run one sampling tick whose frame the classifier labels `result`.
fn sample(session: &mut Session, result: SampleResult) -> Vec<SessionEvent> {
    session.dispatch(SessionInput::SampleTick).unwrap();
    let sequence = session
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            SessionEvent::AnalyzeFrame(request) => Some(request.sequence),
            _ => None,
        })
        .expect("a frame should be requested");
    session
        .dispatch(SessionInput::AnalysisCompleted {
            sequence,
            outcome: Ok(result),
        })
        .unwrap();
    session.drain_events()
}

#[tokio::test]
async fn scenario_presence_pause_after_grace_then_resume() {
    let (mut session, _probe) = started_session().await;
    assert_eq!(session.state(), SessionState::InProgress);

    for _ in 0..2 {
        let events = sample(&mut session, SampleResult::absent());
        assert!(events.is_empty(), "no pause during grace: {events:?}");
        assert_eq!(session.state(), SessionState::InProgress);
    }

    let events = sample(&mut session, SampleResult::absent());
    assert!(events.contains(&SessionEvent::ViolationRaised(ViolationKind::HumanAbsent)));
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::HumanAbsent));

    let events = sample(&mut session, SampleResult::present());
    assert!(events.contains(&SessionEvent::ViolationCleared(ViolationKind::HumanAbsent)));
    assert_eq!(session.state(), SessionState::InProgress);
}

#[tokio::test]
async fn scenario_fullscreen_timeout_forces_submission() {
    let (mut session, probe) = started_session().await;

    probe.leave_fullscreen();
    pump_page_events(&mut session);
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.countdown_remaining(), Some(30));
    let events = session.drain_events();
    assert!(events.contains(&SessionEvent::ViolationRaised(ViolationKind::FullscreenExit)));
    assert!(events.contains(&SessionEvent::CountdownTick { remaining: 30 }));

    let mut force_terminations = 0;
    for _ in 0..30 {
        session.dispatch(SessionInput::ClockTick).unwrap();
        force_terminations += session
            .drain_events()
            .iter()
            .filter(|e| **e == SessionEvent::ForceTerminate)
            .count();
    }
    assert_eq!(force_terminations, 1);
    assert_eq!(session.state(), SessionState::Submitting);
    assert_eq!(session.submit_reason(), Some(SubmitReason::FullscreenTimeout));
    assert_eq!(probe.live_tracks(), 0);

    // Further ticks after submission do nothing.
    session.dispatch(SessionInput::ClockTick).unwrap();
    assert!(session.drain_events().is_empty());

    let analyzer = ScriptedPerformanceAnalyzer::failing(CollaboratorError::Server {
        status: 500,
        message: "analyzer crashed".to_string(),
    });
    let results = session.finalize(&analyzer).await.unwrap();
    assert_eq!(session.state(), SessionState::Results);
    assert!(results.is_partial());
    assert!(results.analysis_error.is_some());
    assert_eq!(results.submit_reason, SubmitReason::FullscreenTimeout);
    assert_eq!(
        results.violations.first().map(|v| v.kind),
        Some(ViolationKind::FullscreenExit)
    );
}

#[tokio::test]
async fn scenario_three_of_five_correct_scores_sixty() {
    let (mut session, probe) = started_session().await;

    // Correct answers are 1, 1, 2, 1, 3; questions 3 and 4 are skipped.
    for (question, option) in [(0, 1), (1, 1), (2, 2)] {
        session
            .dispatch(SessionInput::SelectAnswer {
                question,
                option: Some(option),
            })
            .unwrap();
        session.dispatch(SessionInput::AdvanceQuestion).unwrap();
    }
    assert_eq!(session.current_question(), 3);

    session.dispatch(SessionInput::EndExam).unwrap();
    assert_eq!(session.state(), SessionState::Submitting);
    assert!(session.answers().is_frozen());
    assert_eq!(probe.live_tracks(), 0);
    assert!(!probe.is_fullscreen());

    let err = session
        .dispatch(SessionInput::SelectAnswer {
            question: 3,
            option: Some(1),
        })
        .unwrap_err();
    assert_eq!(err, SessionError::Frozen);
    assert_eq!(session.answers().get(3), None);

    let results = session
        .finalize(&ScriptedPerformanceAnalyzer::echo())
        .await
        .unwrap();
    assert_eq!(results.score.correct, 3);
    assert_eq!(results.score.total, 5);
    assert!((results.score.percent - 60.0).abs() < 1e-9);
    assert_eq!(results.submit_reason, SubmitReason::UserEnded);
    assert!(!results.is_partial());
}

#[tokio::test]
async fn grace_period_never_pauses() {
    for threshold in 1..=5u32 {
        let backend = SimulatedBackend::new();
        let mut session = SessionController::new(
            backend,
            SessionSettings {
                grace_ticks: threshold,
                ..SessionSettings::default()
            },
        );
        session
            .accept_quiz(exam_proctor::core::QuizId::new(), Quiz::sample())
            .unwrap();
        session.request_camera_and_mic().unwrap();
        session.request_screen_share().unwrap();
        session.begin_exam().unwrap();

        for _ in 1..threshold {
            sample(&mut session, SampleResult::absent());
            assert_eq!(session.state(), SessionState::InProgress);
        }
        sample(&mut session, SampleResult::absent());
        assert_eq!(session.state(), SessionState::Paused);
    }
}

#[tokio::test]
async fn silent_microphone_pauses_after_grace() {
    let (mut session, probe) = started_session().await;
    probe.set_mic_level(0);

    for _ in 0..3 {
        sample(&mut session, SampleResult::present());
    }
    assert_eq!(session.active_violation(), Some(ViolationKind::MicInactive));

    probe.set_mic_level(60);
    sample(&mut session, SampleResult::present());
    assert_eq!(session.state(), SessionState::InProgress);
}

#[tokio::test]
async fn presence_recovery_keeps_fullscreen_pause() {
    let (mut session, probe) = started_session().await;
    for _ in 0..3 {
        sample(&mut session, SampleResult::absent());
    }

    // Request a frame, then leave fullscreen before the verdict arrives.
    session.dispatch(SessionInput::SampleTick).unwrap();
    let sequence = session
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            SessionEvent::AnalyzeFrame(request) => Some(request.sequence),
            _ => None,
        })
        .unwrap();
    probe.leave_fullscreen();
    pump_page_events(&mut session);

    session
        .dispatch(SessionInput::AnalysisCompleted {
            sequence,
            outcome: Ok(SampleResult::present()),
        })
        .unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::FullscreenExit));

    probe.return_to_fullscreen();
    pump_page_events(&mut session);
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(session.countdown_remaining(), None);
}

#[tokio::test]
async fn sampling_suppressed_during_countdown() {
    let (mut session, probe) = started_session().await;
    probe.leave_fullscreen();
    pump_page_events(&mut session);
    session.drain_events();

    session.dispatch(SessionInput::SampleTick).unwrap();
    assert!(session
        .drain_events()
        .iter()
        .all(|e| !matches!(e, SessionEvent::AnalyzeFrame(_))));
}

#[tokio::test]
async fn skipped_frames_do_not_count_toward_grace() {
    let (mut session, probe) = started_session().await;
    probe.set_frame_ready(false);
    for _ in 0..5 {
        session.dispatch(SessionInput::SampleTick).unwrap();
    }
    assert!(session.drain_events().is_empty());
    assert_eq!(session.audit().stats().samples_skipped, 5);

    probe.set_frame_ready(true);
    sample(&mut session, SampleResult::absent());
    assert_eq!(session.state(), SessionState::InProgress);
}

#[tokio::test]
async fn advisories_never_pause() {
    let (mut session, _probe) = started_session().await;
    for _ in 0..4 {
        let events = sample(
            &mut session,
            SampleResult {
                phone_detected: true,
                ..SampleResult::present()
            },
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Advisory(_))));
    }
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(session.audit().stats().advisories, 4);
}

#[tokio::test]
async fn denied_camera_blocks_instructions() {
    let backend = SimulatedBackend::with_grants(SimulatedGrants {
        camera: false,
        ..SimulatedGrants::default()
    });
    let mut session = loaded_session(backend).await;

    let err = session.request_camera_and_mic().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Device(DeviceError::PermissionDenied(_))
    ));
    session.request_screen_share().unwrap();
    assert_eq!(session.state(), SessionState::AcquiringPermissions);
    assert_eq!(session.permissions().get(MediaKind::Camera), Some(false));

    assert!(matches!(
        session.begin_exam(),
        Err(SessionError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn window_share_is_released_and_retryable() {
    let backend = SimulatedBackend::with_grants(SimulatedGrants {
        screen: Some(DisplaySurface::Window),
        ..SimulatedGrants::default()
    });
    let probe = backend.probe();
    let mut session = loaded_session(backend).await;
    session.request_camera_and_mic().unwrap();

    let err = session.request_screen_share().unwrap_err();
    assert_eq!(
        err,
        SessionError::Device(DeviceError::NotWholeScreen(DisplaySurface::Window))
    );
    // Only camera and microphone are still live.
    assert_eq!(probe.live_tracks(), 2);

    probe.set_grants(SimulatedGrants::default());
    session.request_screen_share().unwrap();
    assert_eq!(session.state(), SessionState::Instructions);
}

#[tokio::test]
async fn submission_is_idempotent() {
    let (mut session, probe) = started_session().await;
    session.dispatch(SessionInput::EndExam).unwrap();
    let stops = probe.stop_calls();
    let events = session.drain_events();

    session.dispatch(SessionInput::EndExam).unwrap();
    for _ in 0..700 {
        session.dispatch(SessionInput::ClockTick).unwrap();
    }

    assert_eq!(probe.stop_calls(), stops);
    assert!(session.drain_events().is_empty());
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Submitted(_)))
            .count(),
        1
    );
    assert_eq!(session.submit_reason(), Some(SubmitReason::UserEnded));
}

#[tokio::test]
async fn dropping_an_abandoned_session_releases_devices() {
    let backend = SimulatedBackend::new();
    let probe = backend.probe();
    let mut session = loaded_session(backend).await;
    session.request_camera_and_mic().unwrap();
    session.request_screen_share().unwrap();
    session.begin_exam().unwrap();
    assert_eq!(probe.live_tracks(), 3);

    drop(session);
    assert_eq!(probe.live_tracks(), 0);
    assert!(!probe.is_fullscreen());
}

/// Raise and clear notifications only, in the order they were emitted.
fn violation_changes(events: &[SessionEvent]) -> Vec<SessionEvent> {
    events
        .iter()
        .filter(|e| {
            matches!(
                e,
                SessionEvent::ViolationRaised(_) | SessionEvent::ViolationCleared(_)
            )
        })
        .cloned()
        .collect()
}

#[tokio::test]
async fn hidden_tab_survives_fullscreen_exit_and_return() {
    let (mut session, probe) = started_session().await;
    let mut events = Vec::new();

    probe.hide_tab();
    probe.leave_fullscreen();
    pump_page_events(&mut session);
    events.extend(session.drain_events());
    assert_eq!(session.active_violation(), Some(ViolationKind::FullscreenExit));

    probe.return_to_fullscreen();
    probe.show_tab();
    pump_page_events(&mut session);
    events.extend(session.drain_events());
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::TabHidden));

    // Hiding again before acknowledging changes nothing.
    probe.hide_tab();
    pump_page_events(&mut session);
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::TabHidden));

    session.dispatch(SessionInput::AcknowledgeTabReturn).unwrap();
    events.extend(session.drain_events());
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(session.active_violation(), None);

    assert_eq!(
        violation_changes(&events),
        vec![
            SessionEvent::ViolationRaised(ViolationKind::TabHidden),
            SessionEvent::ViolationRaised(ViolationKind::FullscreenExit),
            SessionEvent::ViolationCleared(ViolationKind::FullscreenExit),
            SessionEvent::ViolationCleared(ViolationKind::TabHidden),
        ]
    );

    // A later hide is reported again.
    probe.hide_tab();
    pump_page_events(&mut session);
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::TabHidden));

    let records = session.violations();
    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().filter(|r| r.is_open()).count(), 1);
}

#[tokio::test]
async fn tab_hidden_during_countdown_is_not_reported() {
    let (mut session, probe) = started_session().await;

    probe.leave_fullscreen();
    probe.hide_tab();
    pump_page_events(&mut session);
    assert_eq!(session.active_violation(), Some(ViolationKind::FullscreenExit));

    probe.show_tab();
    probe.return_to_fullscreen();
    pump_page_events(&mut session);
    let events = session.drain_events();
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(
        violation_changes(&events),
        vec![
            SessionEvent::ViolationRaised(ViolationKind::FullscreenExit),
            SessionEvent::ViolationCleared(ViolationKind::FullscreenExit),
        ]
    );
}

#[tokio::test]
async fn fullscreen_exit_shown_over_hidden_tab_until_return() {
    let (mut session, probe) = started_session().await;

    probe.hide_tab();
    pump_page_events(&mut session);
    probe.leave_fullscreen();
    pump_page_events(&mut session);
    assert_eq!(session.active_violation(), Some(ViolationKind::FullscreenExit));

    // Acknowledging the tab does not end the countdown.
    session.dispatch(SessionInput::AcknowledgeTabReturn).unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.active_violation(), Some(ViolationKind::FullscreenExit));
    assert!(session.countdown_remaining().is_some());

    probe.return_to_fullscreen();
    pump_page_events(&mut session);
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(session.active_violation(), None);
}
