//! Exam Proctor - proctored exam session controller.
//!
//! This library turns unreliable, asynchronous signals (camera frames,
//! microphone loudness, fullscreen and tab-visibility changes, a countdown)
//! into a coherent exam lifecycle with pause, resume and terminate
//! semantics.
//!
//! # Proctoring Guarantees
//!
//! - **Whole screen only**: a window or tab share is refused and released
//! - **Grace period**: presence checks wait for sensors to warm up
//! - **Infrastructure is not misconduct**: a failed classification never pauses the exam
//! - **Guaranteed release**: every device is released on every way an attempt ends
//! - **Auditable**: all proctoring decisions are counted in an audit log
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Exam Proctor                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Device    │──▶│   Sampler   │──▶│  Violation  │       │
//! │  │   Access    │   │ (frame/mic) │   │ Aggregator  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    ▲              │
//! │         ▼                                    │              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │ Fullscreen  │────────────────────▶│   Session   │       │
//! │  │   Guard     │      ExamTimer ────▶│ Controller  │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use exam_proctor::{
//!     collaborators::{ScriptedPerformanceAnalyzer, ScriptedVisualAnalyzer},
//!     core::{Quiz, QuizId},
//!     device::SimulatedBackend,
//!     session::{SessionController, SessionRuntime, SessionSettings},
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = SessionController::new(SimulatedBackend::new(), SessionSettings::default());
//! session.accept_quiz(QuizId::new(), Quiz::sample())?;
//! session.request_camera_and_mic()?;
//! session.request_screen_share()?;
//!
//! let runtime = SessionRuntime::new(
//!     session,
//!     Arc::new(ScriptedVisualAnalyzer::from_script("present")),
//!     Arc::new(ScriptedPerformanceAnalyzer::echo()),
//! );
//! let results = runtime.run().await?;
//! println!("{}", results.summary());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod device;
pub mod session;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use collaborators::{CollaboratorError, PerformanceAnalyzer, QuizStore, VisualAnalyzer};
pub use config::{Config, ConfigError};
pub use core::{ExamResults, SubmitReason, ViolationKind};
pub use device::{DeviceAccessManager, DeviceBackend, DeviceError};
pub use session::{
    RuntimeHandle, SessionController, SessionError, SessionEvent, SessionInput, SessionRuntime,
    SessionSettings, SessionState,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Proctoring declaration shown to students before they grant access.
pub const PROCTORING_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             EXAM PROCTOR - PROCTORING DECLARATION                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This exam is proctored while it is in progress.                 ║
║                                                                  ║
║  ✓ WHAT WE CHECK:                                                ║
║    • That a person is visible to the camera                      ║
║    • That the microphone picks up some sound                     ║
║    • That the exam stays fullscreen and in the foreground        ║
║    • Whether a book or phone appears, or you look away           ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Camera frames (sent for classification, then discarded)     ║
║    • Audio recordings (only a loudness level is computed)        ║
║    • Screen recordings                                           ║
║                                                                  ║
║  Leaving fullscreen gives you 30 seconds to return before the    ║
║  attempt is submitted. All devices are released when the exam    ║
║  ends, however it ends.                                          ║
║                                                                  ║
║  You can view proctoring statistics anytime with:                ║
║    exam-proctor status                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
