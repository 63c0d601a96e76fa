//! Demonstration of a proctored exam attempt, step by step.
//!
//! This example shows how to:
//! 1. Load a quiz and acquire the three device grants
//! 2. Begin the exam and feed sampling ticks by hand
//! 3. Watch the grace period, a presence pause and its recovery
//! 4. Leave fullscreen and return before the countdown runs out
//! 5. Submit and print the results report
//!
//! Run with: cargo run --example exam_demo

use exam_proctor::{
    collaborators::{InMemoryQuizStore, QuizStore, ScriptedPerformanceAnalyzer},
    core::{Quiz, SampleResult},
    device::SimulatedBackend,
    session::{SessionController, SessionEvent, SessionInput, SessionSettings},
    PROCTORING_DECLARATION,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Exam Proctor - Session Demo");
    println!("===========================");
    println!();
    println!("{PROCTORING_DECLARATION}");

    let store = InMemoryQuizStore::new();
    let quiz_id = store.save(&Quiz::sample()).await?;

    let backend = SimulatedBackend::new();
    let probe = backend.probe();
    let mut session = SessionController::new(backend, SessionSettings::default());

    session.load_quiz(&store, quiz_id).await?;
    session.request_camera_and_mic()?;
    session.request_screen_share()?;
    session.begin_exam()?;
    show(&mut session);

    println!("\n-- Nobody in front of the camera --");
    for _ in 0..3 {
        sample(&mut session, SampleResult::absent())?;
    }

    println!("\n-- Student is back --");
    sample(&mut session, SampleResult::present())?;

    println!("\n-- Answering --");
    for (question, option) in [(0, 1), (1, 1), (2, 0)] {
        session.dispatch(SessionInput::SelectAnswer {
            question,
            option: Some(option),
        })?;
    }
    println!("{} of 5 answered", session.answers().answered());

    println!("\n-- Leaving fullscreen for 3 seconds --");
    probe.leave_fullscreen();
    pump(&mut session)?;
    for _ in 0..3 {
        session.dispatch(SessionInput::ClockTick)?;
    }
    probe.return_to_fullscreen();
    pump(&mut session)?;
    show(&mut session);

    println!("\n-- Ending the exam --");
    session.dispatch(SessionInput::EndExam)?;
    show(&mut session);

    let results = session
        .finalize(&ScriptedPerformanceAnalyzer::echo())
        .await?;
    println!();
    println!("{}", results.summary());
    println!();
    println!("Live tracks after submission: {}", probe.live_tracks());

    Ok(())
}

/// One sampling tick with a canned classifier verdict.
fn sample(
    session: &mut SessionController<SimulatedBackend>,
    result: SampleResult,
) -> Result<(), Box<dyn std::error::Error>> {
    session.dispatch(SessionInput::SampleTick)?;
    let requests: Vec<u64> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::AnalyzeFrame(request) => Some(request.sequence),
            other => {
                println!("  {other:?}");
                None
            }
        })
        .collect();
    for sequence in requests {
        session.dispatch(SessionInput::AnalysisCompleted {
            sequence,
            outcome: Ok(result.clone()),
        })?;
    }
    show(session);
    Ok(())
}

fn pump(session: &mut SessionController<SimulatedBackend>) -> Result<(), Box<dyn std::error::Error>> {
    let events: Vec<_> = session.page_events().try_iter().collect();
    for event in events {
        session.dispatch(SessionInput::Page(event))?;
    }
    Ok(())
}

fn show(session: &mut SessionController<SimulatedBackend>) {
    for event in session.drain_events() {
        println!("  {event:?}");
    }
    println!(
        "  state={} remaining={}s active={:?}",
        session.state(),
        session.timer().remaining_seconds,
        session.active_violation()
    );
}
