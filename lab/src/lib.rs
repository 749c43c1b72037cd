//! # vtl-lab - VTL script validation and execution orchestration
//!
//! Validates VTL scripts as they are edited and runs them against a lab
//! backend, either synchronously or as a distributed job polled to completion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Script text │────▶│ Diagnostics │────▶│   Session   │────▶│   Backend   │
//! │  (edited)   │     │ (debounced) │     │ (run gate)  │     │ (sync/job)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                                         ┌─────────────┐
//!                                         │  Bindings   │
//!                                         │ (reconcile) │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vtl_lab::{Backend, ExecutionContext, HttpTransport, LabConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> vtl_lab::LabResult<()> {
//!     let config = LabConfig::from_env()?;
//!     let transport = Arc::new(HttpTransport::from_config(&config)?);
//!     let backend = Backend::Sync(ExecutionContext::InMemory);
//!     let mut session = Session::new(&config, backend, transport);
//!
//!     session.set_script("ds_r := ds_1 + ds_2;");
//!     session.settle_diagnostics().await?;
//!     session.execute()?;
//!     println!("{:?}", session.run_until_settled().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Binding, Diagnostic, JobHandle, Outcome)
//! - [`config`] - Backend settings and case documents
//! - [`diagnostics`] - Grammar, debouncing and suggestions
//! - [`binding`] - Binding reconciliation and loading
//! - [`client`] - Backend calls over a pluggable transport
//! - [`session`] - Per-view orchestration

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Validation
pub mod diagnostics;

// Bindings
pub mod binding;

// Backend
pub mod client;

// Orchestration
pub mod session;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BindingError, BindingResult, ClientError, ClientResult, ConfigError, ConfigResult, LabError,
    LabResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Binding, Bindings, Diagnostic, JobHandle, Outcome, Severity};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    CaseConfig, ClusterType, DatasetSource, ExecutionContext, ExecutionMode, LabConfig, PollPolicy,
};

// =============================================================================
// Re-exports - Diagnostics
// =============================================================================

pub use diagnostics::{
    signature, validate, Debouncer, Grammar, Lexer, Parser, Suggestion, SuggestionSet,
};

// =============================================================================
// Re-exports - Bindings
// =============================================================================

pub use binding::{load_bindings, reconcile_buckets, reconcile_flat, BindingBuckets};

// =============================================================================
// Re-exports - Client
// =============================================================================

pub use client::{
    execute_sync, poll_until_done, submit_job, HttpReply, HttpTransport, MockTransport, Submission,
    Transport,
};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use session::{
    Backend, DisabledReason, LogEntry, LogLevel, Phase, RunGate, Session, SessionEvent,
    SessionUpdate,
};
