//! Audit module for proctored sessions.
//!
//! This module tracks and exposes what the proctor observed, supporting
//! student trust and review of contested attempts.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
