//! Campus Voice - voice input pipeline for the campus assistant chat widget
//!
//! This library exports core modules for testing and potential future reuse.

/// Speech capture session state machine
pub mod capture;
/// Configuration management
pub mod config;
/// Voice confirmation flow (send / edit / cancel)
pub mod confirm;
/// Top-level voice input controller and simulation fallback
pub mod controller;
/// Transcript correction for domain terms
pub mod correction;
/// Message dispatch to the chat backend
pub mod dispatch;
/// Text preparation for read-aloud replies
pub mod format;
/// Telemetry and crash logging
pub mod telemetry;
