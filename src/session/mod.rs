//! Proctored exam sessions.
//!
//! [`SessionController`] is the synchronous state machine for one attempt;
//! [`SessionRuntime`] drives it on tokio with real clocks and collaborators.

pub mod controller;
pub mod runtime;

// Re-export commonly used types
pub use controller::{
    SessionController, SessionError, SessionEvent, SessionInput, SessionSettings, SessionState,
};
pub use runtime::{RuntimeHandle, SessionRuntime};
