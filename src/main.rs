//! Exam Proctor CLI
//!
//! Runs a proctored exam attempt against the simulated device backend.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use exam_proctor::{
    audit::{create_shared_log_with_persistence, AuditLog},
    collaborators::{
        FileQuizStore, InMemoryQuizStore, PerformanceAnalyzer, QuizStore,
        ScriptedPerformanceAnalyzer, ScriptedVisualAnalyzer, VisualAnalyzer,
    },
    config::Config,
    core::{Quiz, ResultsBuilder},
    device::{DeviceAccessManager, MediaKind, PermissionFlag, SimulatedBackend},
    session::{SessionController, SessionEvent, SessionInput, SessionRuntime, SessionState},
    PROCTORING_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exam-proctor")]
#[command(version = VERSION)]
#[command(about = "Proctored exam session controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a proctored attempt with simulated devices
    Run {
        /// Quiz JSON file (defaults to a built-in sample quiz)
        #[arg(long)]
        quiz: Option<PathBuf>,

        /// Exam duration in seconds
        #[arg(long)]
        duration: Option<u32>,

        /// Sampling period in seconds
        #[arg(long)]
        sample_period: Option<u64>,

        /// Answers to select, e.g. "1,1,2,-,3" ("-" skips a question)
        #[arg(long)]
        answers: Option<String>,

        /// Classifier replies, e.g. "present,absent,phone,error"
        #[arg(long, default_value = "present")]
        presence: String,

        /// Write the results report to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Show device permissions and cumulative proctoring statistics
    Status,

    /// Display the proctoring declaration
    Policy,

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            quiz,
            duration,
            sample_period,
            answers,
            presence,
            export,
        } => {
            cmd_run(quiz, duration, sample_period, answers, &presence, export).await?;
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Policy => {
            cmd_policy();
        }
        Commands::Config => {
            cmd_config();
        }
    }
    Ok(())
}

async fn cmd_run(
    quiz_file: Option<PathBuf>,
    duration: Option<u32>,
    sample_period: Option<u64>,
    answers: Option<String>,
    presence: &str,
    export: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Using default configuration: {e}");
        Config::default()
    });
    if let Some(secs) = duration {
        config.exam_duration_secs = secs;
    }
    if let Some(secs) = sample_period {
        config.sample_period = Duration::from_secs(secs.max(1));
    }
    config
        .ensure_directories()
        .context("Failed to create data directories")?;
    let timezone = config.tz()?;

    println!("{PROCTORING_DECLARATION}");

    let audit = create_shared_log_with_persistence(config.audit_path());
    let backend = SimulatedBackend::new();
    let mut session = SessionController::new(backend, config.session_settings())
        .with_audit_log(Arc::clone(&audit))
        .with_results_builder(ResultsBuilder::new().with_timezone(timezone));

    // Quizzes from a file go through the on-disk store, the sample stays in memory.
    match quiz_file {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read quiz {}", path.display()))?;
            let quiz: Quiz = serde_json::from_str(&content).context("Invalid quiz file")?;
            let store = FileQuizStore::new(config.quiz_dir());
            let id = store.save(&quiz).await?;
            session.load_quiz(&store, id).await?;
        }
        None => {
            let store = InMemoryQuizStore::new();
            let id = store.save(&Quiz::sample()).await?;
            session.load_quiz(&store, id).await?;
        }
    }

    session
        .request_camera_and_mic()
        .context("Camera and microphone are required")?;
    session
        .request_screen_share()
        .context("Share your entire screen to continue")?;
    if session.state() != SessionState::Instructions {
        bail!("Permissions incomplete: {:?}", session.permissions());
    }

    if let Some(quiz) = session.quiz() {
        println!("Topic: {} ({} questions)", quiz.topic, quiz.len());
    }
    println!(
        "Duration: {}s, sampling every {}s. Press Ctrl+C to end the exam.",
        config.exam_duration_secs,
        config.sample_period.as_secs()
    );
    println!();

    let (visual, performance) = collaborators(presence);
    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    let runtime = SessionRuntime::new(session, visual, performance).with_observer(observer_tx);
    let handle = runtime.handle();

    let printer = tokio::spawn(async move {
        while let Some(event) = observer_rx.recv().await {
            print_event(&event);
        }
    });

    let ctrlc_handle = handle.clone();
    ctrlc::set_handler(move || {
        ctrlc_handle.end_exam();
    })
    .context("Error setting Ctrl+C handler")?;

    if let Some(list) = answers {
        for input in parse_answers(&list) {
            handle.send(input);
        }
    }

    let results = runtime.run().await?;
    let _ = printer.await;

    println!();
    println!("{}", results.summary());

    if export {
        match results.export(&config.export_path) {
            Ok(path) => println!("\nExported to {path:?}"),
            Err(e) => eprintln!("Error writing export: {e}"),
        }
    }

    if let Err(e) = audit.save() {
        warn!("Could not save audit stats: {e}");
    }

    println!();
    println!("{}", audit.summary());
    Ok(())
}

/// Remote collaborators when configured, scripted ones otherwise.
fn collaborators(presence: &str) -> (Arc<dyn VisualAnalyzer>, Arc<dyn PerformanceAnalyzer>) {
    #[cfg(feature = "remote")]
    {
        use exam_proctor::collaborators::{
            RemoteConfig, RemotePerformanceAnalyzer, RemoteVisualAnalyzer,
        };

        if let Ok(config) = RemoteConfig::from_env() {
            match (
                RemoteVisualAnalyzer::new(config.clone()),
                RemotePerformanceAnalyzer::new(config),
            ) {
                (Ok(visual), Ok(performance)) => {
                    info!("Using remote collaborators");
                    return (Arc::new(visual), Arc::new(performance));
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Remote collaborators unavailable, using scripted ones: {e}");
                }
            }
        }
    }

    info!("Using scripted collaborators");
    (
        Arc::new(ScriptedVisualAnalyzer::from_script(presence)),
        Arc::new(ScriptedPerformanceAnalyzer::echo()),
    )
}

/// Parse "1,1,2,-,3" into answer selections, one per question in order.
fn parse_answers(list: &str) -> Vec<SessionInput> {
    list.split(',')
        .map(str::trim)
        .enumerate()
        .filter_map(|(question, entry)| {
            let option = match entry {
                "" | "-" => None,
                n => Some(n.parse::<usize>().ok()?),
            };
            Some(SessionInput::SelectAnswer { question, option })
        })
        .collect()
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged { to, .. } => println!("[session] {to}"),
        SessionEvent::ViolationRaised(kind) => println!("[paused] {}", kind.message()),
        SessionEvent::ViolationCleared(kind) => println!("[resumed] {kind} cleared"),
        SessionEvent::CountdownTick { remaining } => {
            println!("[fullscreen] {remaining}s left to return")
        }
        SessionEvent::Advisory(kind) => println!("[advisory] {kind}"),
        SessionEvent::AnalysisError(e) => println!("[warning] analysis unavailable: {e}"),
        SessionEvent::AnalyzeFrame(_) => {}
        SessionEvent::TimeUp => println!("[timer] time is up"),
        SessionEvent::ForceTerminate => println!("[fullscreen] not restored in time"),
        SessionEvent::Submitted(reason) => println!("[session] submitted: {reason}"),
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Exam Proctor Status");
    println!("===================");
    println!();

    let mut devices = DeviceAccessManager::new(SimulatedBackend::new());
    let _ = devices.acquire_camera_and_mic();
    let _ = devices.acquire_full_screen_share();
    let permissions = devices.permissions();
    devices.release_all();

    println!("Device Permissions (simulated backend):");
    for kind in [MediaKind::Camera, MediaKind::Microphone, MediaKind::Screen] {
        println!("  {kind}: {}", describe_flag(permissions.get(kind)));
    }
    println!();

    println!("Configuration:");
    println!("  Exam duration: {}s", config.exam_duration_secs);
    println!("  Sample period: {}s", config.sample_period.as_secs());
    println!("  Grace samples: {}", config.grace_ticks);
    println!("  Fullscreen timeout: {}s", config.fullscreen_timeout_secs);
    println!();

    let stats_path = config.audit_path();
    if stats_path.exists() {
        let audit = AuditLog::with_persistence(stats_path);
        let stats = audit.stats();
        println!("Cumulative Statistics:");
        println!("  Attempts submitted: {}", stats.sessions_submitted);
        println!("  Frames analysed: {}", stats.samples_analysed);
        println!("  Analysis errors: {}", stats.analysis_errors);
        println!(
            "  Violations: {} fullscreen, {} tab, {} absence, {} microphone",
            stats.fullscreen_exits, stats.tabs_hidden, stats.human_absent, stats.mic_inactive
        );
        println!("  Forced terminations: {}", stats.forced_terminations);
    } else {
        println!("No previous session data found.");
    }
}

fn describe_flag(flag: PermissionFlag) -> &'static str {
    match flag {
        Some(true) => "Granted ✓",
        Some(false) => "Denied ✗",
        None => "Not requested",
    }
}

fn cmd_policy() {
    println!("{PROCTORING_DECLARATION}");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answers_with_skips() {
        let inputs = parse_answers("1, -,2,,x");
        assert_eq!(
            inputs,
            vec![
                SessionInput::SelectAnswer {
                    question: 0,
                    option: Some(1)
                },
                SessionInput::SelectAnswer {
                    question: 1,
                    option: None
                },
                SessionInput::SelectAnswer {
                    question: 2,
                    option: Some(2)
                },
                SessionInput::SelectAnswer {
                    question: 3,
                    option: None
                },
            ]
        );
    }
}
