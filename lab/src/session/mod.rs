//! Per-view orchestration of validation and execution.
//!
//! A [`Session`] owns the state of one editor view: the script, its bindings,
//! the current diagnostics and the outcome of the last run. It is driven with
//! `&mut self` from a single task. Everything that waits (debounced
//! validation, backend calls, job polling) runs in spawned tasks that report
//! back as [`SessionEvent`]s; [`Session::apply`] folds them in one at a time
//! and drops those whose origin is no longer current.
//!
//! ```text
//!  set_script ──▶ Debouncer ──(quiet period)──▶ Diagnostics{generation}
//!                                                          │
//!  execute ──▶ Executing ──▶ Executed{ticket} ─────────────┤
//!                  └──────▶ Submitted{ticket} ──▶ poller ──▶ JobFinished{ticket, handle}
//!                                                          │
//!                                                          ▼
//!                                                  Session::apply ──▶ Notifier
//! ```

pub mod notify;
pub mod state;

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::binding::load_bindings;
use crate::client::{
    execute_sync, fetch_script, poll_until_done, submit_job, Submission, Transport,
};
use crate::config::{CaseConfig, LabConfig, PollPolicy};
use crate::diagnostics::{fetch_suggestions, signature, Debouncer, Grammar, SuggestionSet};
use crate::error::{LabError, LabResult};
use crate::models::{Binding, Bindings, Diagnostic, JobHandle, Outcome};

pub use notify::{LogEntry, LogLevel, Notifier, SessionUpdate};
pub use state::{Backend, DisabledReason, Phase, RunGate};

// =============================================================================
// Events
// =============================================================================

/// Result of background work, tagged with what started it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A debounced validation run finished.
    Diagnostics { generation: u64, diagnostics: Vec<Diagnostic> },
    /// A synchronous run answered.
    Executed { ticket: u64, outcome: Outcome },
    /// A job submission answered.
    Submitted { ticket: u64, submission: Submission },
    /// Polling of a job ended.
    JobFinished { ticket: u64, handle: JobHandle, outcome: Outcome },
}

// =============================================================================
// Session
// =============================================================================

pub struct Session {
    id: Uuid,
    grammar: Grammar,
    transport: Arc<dyn Transport>,
    backend: Backend,
    poll: PollPolicy,

    script: String,
    bindings: Bindings,
    to_save: Map<String, Value>,
    suggestions: SuggestionSet,

    diagnostics: Vec<Diagnostic>,
    last_signature: String,
    validating: bool,
    debouncer: Debouncer,

    phase: Phase,
    outcome: Option<Outcome>,
    ticket: u64,
    job: Option<JobHandle>,
    poller: Option<JoinHandle<()>>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    notifier: Notifier,
}

impl Session {
    /// An empty session validating with the reference grammar.
    pub fn new(config: &LabConfig, backend: Backend, transport: Arc<dyn Transport>) -> Self {
        let id = Uuid::new_v4();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id,
            grammar: Grammar::reference(),
            transport,
            backend,
            poll: config.poll.clone(),
            script: String::new(),
            bindings: Bindings::new(),
            to_save: Map::new(),
            suggestions: SuggestionSet::default(),
            diagnostics: Vec::new(),
            last_signature: String::new(),
            validating: false,
            debouncer: Debouncer::new(config.debounce),
            phase: Phase::Idle,
            outcome: None,
            ticket: 0,
            job: None,
            poller: None,
            events_tx,
            events_rx,
            notifier: Notifier::new(id),
        }
    }

    /// Validate with `grammar` instead. A script already present is revalidated.
    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        if self.validating || !self.script.is_empty() {
            self.schedule_validation();
        }
        self
    }

    /// Open a case: script, bindings and suggestions are fetched concurrently.
    ///
    /// Failed fetches degrade to an empty script, missing bindings or no
    /// suggestions; opening itself never fails.
    pub async fn open_case(
        config: &LabConfig,
        backend: Backend,
        case: &CaseConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let context = backend.binding_context();
        let (script, bindings, suggestions) = futures::join!(
            fetch_script(transport.as_ref(), case.script.as_deref()),
            load_bindings(transport.as_ref(), context, case),
            fetch_suggestions(transport.as_ref(), case.suggester_url()),
        );

        let mut session = Self::new(config, backend, transport);
        session.bindings = bindings;
        session.suggestions = suggestions;
        session.notifier.log(LogEntry::info(format!(
            "opened case '{}' on {} with {} binding(s)",
            case.label,
            context,
            session.bindings.len()
        )));
        session.set_script(script);
        session
    }

    // ===== accessors =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn to_save(&self) -> &Map<String, Value> {
        &self.to_save
    }

    pub fn suggestions(&self) -> &SuggestionSet {
        &self.suggestions
    }

    /// Diagnostics of the last completed validation run.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Handle of the job being polled, if any.
    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    /// Whether a validation run is scheduled but not yet applied.
    pub fn is_validating(&self) -> bool {
        self.validating
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.notifier.subscribe()
    }

    pub fn updates(&self) -> impl Stream<Item = SessionUpdate> {
        self.notifier.stream()
    }

    // ===== editing =====

    /// Replace the script text and schedule its validation.
    pub fn set_script(&mut self, script: impl Into<String>) {
        self.script = script.into();
        self.touch();
        self.schedule_validation();
    }

    pub fn set_bindings(&mut self, bindings: Bindings) {
        self.bindings = bindings;
        self.touch();
    }

    pub fn set_binding(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
        self.touch();
    }

    pub fn remove_binding(&mut self, name: &str) -> Option<Binding> {
        let removed = self.bindings.remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Replace the entries to persist after a synchronous run.
    pub fn set_to_save(&mut self, to_save: Map<String, Value>) {
        self.to_save = to_save;
    }

    // ===== running =====

    /// State of the run action.
    pub fn gate(&self) -> RunGate {
        RunGate::evaluate(&self.diagnostics, &self.script, &self.bindings)
    }

    pub fn can_execute(&self) -> bool {
        self.gate().enabled
    }

    /// Start a run on the session backend and return its ticket.
    ///
    /// A job still being polled is abandoned locally; the backend is not told.
    pub fn execute(&mut self) -> LabResult<u64> {
        if let Some(reason) = self.gate().reason {
            self.notifier.log(LogEntry::warning(format!("run refused: {}", reason)));
            return Err(LabError::ExecutionDisabled(reason));
        }

        self.abandon_job();
        self.set_outcome(None);
        self.ticket += 1;
        let ticket = self.ticket;
        self.set_phase(Phase::Executing);

        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let script = self.script.clone();
        let bindings = self.bindings.clone();

        match self.backend {
            Backend::Sync(context) => {
                self.notifier.log(LogEntry::info(format!("running on {}", context)));
                let to_save = self.to_save.clone();
                tokio::spawn(async move {
                    let outcome =
                        execute_sync(transport.as_ref(), context, &script, &bindings, &to_save)
                            .await
                            .unwrap_or_else(|e| Outcome::Failure(e.to_string()));
                    let _ = events.send(SessionEvent::Executed { ticket, outcome });
                });
            }
            Backend::Job { mode, cluster } => {
                self.notifier.log(LogEntry::info(format!(
                    "submitting job ({} on {})",
                    mode.as_str(),
                    cluster.as_str()
                )));
                tokio::spawn(async move {
                    let submission =
                        submit_job(transport.as_ref(), mode, cluster, &script, &bindings)
                            .await
                            .unwrap_or_else(|e| Submission::Rejected(e.to_string()));
                    let _ = events.send(SessionEvent::Submitted { ticket, submission });
                });
            }
        }
        Ok(ticket)
    }

    // ===== event loop =====

    /// Wait for the next background result.
    pub async fn next_event(&mut self) -> LabResult<SessionEvent> {
        self.events_rx.recv().await.ok_or(LabError::Closed)
    }

    /// Wait for the next background result and apply it.
    pub async fn step(&mut self) -> LabResult<bool> {
        let event = self.next_event().await?;
        Ok(self.apply(event))
    }

    /// Apply a background result. Returns `false` if it was stale and ignored.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Diagnostics { generation, diagnostics } => {
                if !self.debouncer.is_current(generation) {
                    let current = self.debouncer.generation();
                    debug!(session = %self.id, generation, current, "stale diagnostics dropped");
                    return false;
                }
                self.validating = false;
                let signature = signature(&diagnostics);
                self.diagnostics = diagnostics;
                if signature != self.last_signature {
                    self.last_signature = signature;
                    self.notifier.publish(SessionUpdate::Diagnostics(self.diagnostics.clone()));
                }
                true
            }

            SessionEvent::Executed { ticket, outcome } => {
                if ticket != self.ticket || self.phase != Phase::Executing {
                    debug!(session = %self.id, ticket, "stale execution result dropped");
                    return false;
                }
                self.finish(outcome);
                true
            }

            SessionEvent::Submitted { ticket, submission } => {
                if ticket != self.ticket || self.phase != Phase::Executing {
                    debug!(session = %self.id, ticket, "stale submission dropped");
                    return false;
                }
                match submission {
                    Submission::Accepted(handle) => {
                        self.notifier.log(LogEntry::info(format!("job {} submitted", handle)));
                        self.job = Some(handle.clone());
                        self.set_phase(Phase::Submitted);
                        self.start_polling(ticket, handle);
                    }
                    Submission::Rejected(message) => self.finish(Outcome::Failure(message)),
                }
                true
            }

            SessionEvent::JobFinished { ticket, handle, outcome } => {
                let live = ticket == self.ticket
                    && self.job.as_ref() == Some(&handle)
                    && self.outcome.is_none();
                if !live {
                    debug!(session = %self.id, job = %handle, "stale job result dropped");
                    return false;
                }
                self.job = None;
                self.poller = None;
                self.finish(outcome);
                true
            }
        }
    }

    /// Apply events until the pending validation run has landed.
    pub async fn settle_diagnostics(&mut self) -> LabResult<&[Diagnostic]> {
        while self.validating {
            self.step().await?;
        }
        Ok(&self.diagnostics)
    }

    /// Apply events until the current run has an outcome.
    pub async fn run_until_settled(&mut self) -> LabResult<Option<&Outcome>> {
        while self.phase.is_in_flight() {
            self.step().await?;
        }
        Ok(self.outcome.as_ref())
    }

    // ===== internals =====

    fn schedule_validation(&mut self) {
        let grammar = self.grammar.clone();
        let script = self.script.clone();
        let events = self.events_tx.clone();

        self.validating = true;
        let generation = self.debouncer.schedule(move |generation| async move {
            let diagnostics = grammar.validate(&script);
            let _ = events.send(SessionEvent::Diagnostics { generation, diagnostics });
        });
        debug!(
            session = %self.id,
            generation,
            grammar = self.grammar.id(),
            delay = ?self.debouncer.delay(),
            "validation scheduled"
        );
    }

    fn start_polling(&mut self, ticket: u64, handle: JobHandle) {
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let policy = self.poll.clone();

        self.poller = Some(tokio::spawn(async move {
            let outcome = poll_until_done(transport.as_ref(), &handle, &policy).await;
            let _ = events.send(SessionEvent::JobFinished { ticket, handle, outcome });
        }));
        self.set_phase(Phase::Polling);
    }

    fn abandon_job(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(handle) = self.job.take() {
            info!(session = %self.id, job = %handle, "job superseded");
            self.notifier.log(LogEntry::warning(format!("job {} abandoned", handle)));
        }
    }

    /// Edits drop a displayed outcome; a run in flight keeps going.
    fn touch(&mut self) {
        if self.phase.is_settled() {
            self.set_outcome(None);
            self.set_phase(Phase::Editing);
        } else if self.phase == Phase::Idle {
            self.set_phase(Phase::Editing);
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        let phase = match &outcome {
            Outcome::Success(_) => {
                self.notifier.log(LogEntry::success("run succeeded"));
                Phase::Succeeded
            }
            Outcome::Failure(message) => {
                self.notifier.log(LogEntry::error(format!("run failed: {}", message)));
                Phase::Failed
            }
        };
        self.set_outcome(Some(outcome));
        self.set_phase(phase);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(session = %self.id, from = ?self.phase, to = ?phase, "phase");
            self.phase = phase;
            self.notifier.publish(SessionUpdate::Phase(phase));
        }
    }

    fn set_outcome(&mut self, outcome: Option<Outcome>) {
        if self.outcome != outcome {
            self.outcome = outcome.clone();
            self.notifier.publish(SessionUpdate::Outcome(outcome));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
