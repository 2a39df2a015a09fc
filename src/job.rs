//! Jobs: stateful execution records for one pipeline run.
//!
//! A job executes named chores against its shift's registries, recording
//! each completed chat on an append-only execution tape. Chat-level turn
//! and delta notifications are relayed upward, tagged with the chore name
//! and tape index, so pipeline observers see one event stream per job.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::chat::{Chat, ChatEventHandlers, ChatMessage};
use crate::error::{JobError, Result};
use crate::shift::Shift;
use crate::worker::Worker;

/// Job lifecycle status. Terminal once Success or Failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
}

/// One entry on the execution tape.
#[derive(Clone)]
pub struct JobExecution {
    pub name: String,
    pub chat: Arc<Chat>,
}

/// A chat turn relayed at the job level.
pub struct ChoreMessageEvent<'a> {
    pub name: &'a str,
    /// Tape index of the execution this turn belongs to.
    pub index: usize,
    pub message: &'a ChatMessage,
    pub chat: &'a Chat,
}

/// A streamed content fragment relayed at the job level.
pub struct ChoreDeltaEvent<'a> {
    pub name: &'a str,
    pub index: usize,
    pub text: &'a str,
    pub snapshot: &'a str,
    pub chat: &'a Chat,
}

/// A completed chore execution.
pub struct ChoreSuccessEvent<'a> {
    pub name: &'a str,
    pub index: usize,
    pub chat: &'a Chat,
}

type ChoreMessageHandler<T> =
    Arc<dyn for<'a> Fn(ChoreMessageEvent<'a>, &Job<T>) + Send + Sync>;
type ChoreDeltaHandler<T> = Arc<dyn for<'a> Fn(ChoreDeltaEvent<'a>, &Job<T>) + Send + Sync>;
type ChoreSuccessHandler<T> =
    Arc<dyn for<'a> Fn(ChoreSuccessEvent<'a>, &Job<T>) + Send + Sync>;
type SuccessHandler<T> = Arc<dyn Fn(&Job<T>) + Send + Sync>;
type FailureHandler<T> = Arc<dyn Fn(&Job<T>, &str) + Send + Sync>;

struct JobObservers<T> {
    chat_message: Vec<ChoreMessageHandler<T>>,
    chat_delta: Vec<ChoreDeltaHandler<T>>,
    chat_success: Vec<ChoreSuccessHandler<T>>,
    success: Vec<SuccessHandler<T>>,
    failure: Vec<FailureHandler<T>>,
}

impl<T> Default for JobObservers<T> {
    fn default() -> Self {
        Self {
            chat_message: Vec::new(),
            chat_delta: Vec::new(),
            chat_success: Vec::new(),
            success: Vec::new(),
            failure: Vec::new(),
        }
    }
}

/// One pipeline run's execution record over named chore executions.
pub struct Job<T> {
    id: Uuid,
    created_at: DateTime<Utc>,
    shift: Arc<Shift<T>>,
    input: T,
    tape: Mutex<Vec<JobExecution>>,
    observers: RwLock<JobObservers<T>>,
    status_tx: watch::Sender<JobStatus>,
    status_rx: watch::Receiver<JobStatus>,
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Job<T> {
    pub(crate) fn new(shift: Arc<Shift<T>>, input: T) -> Self {
        let (status_tx, status_rx) = watch::channel(JobStatus::Pending);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            shift,
            input,
            tape: Mutex::new(Vec::new()),
            observers: RwLock::new(JobObservers::default()),
            status_tx,
            status_rx,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn shift(&self) -> &Arc<Shift<T>> {
        &self.shift
    }

    pub fn input(&self) -> &T {
        &self.input
    }

    pub fn status(&self) -> JobStatus {
        *self.status_rx.borrow()
    }

    /// Snapshot of the execution tape.
    pub fn tape(&self) -> Vec<JobExecution> {
        self.lock_tape().clone()
    }

    /// Chat of the first execution.
    pub fn first(&self) -> Result<Arc<Chat>> {
        self.lock_tape()
            .first()
            .map(|ex| Arc::clone(&ex.chat))
            .ok_or_else(|| JobError::NoExecutions.into())
    }

    /// Chat of the most recent execution.
    pub fn last(&self) -> Result<Arc<Chat>> {
        self.lock_tape()
            .last()
            .map(|ex| Arc::clone(&ex.chat))
            .ok_or_else(|| JobError::NoExecutions.into())
    }

    /// First execution under `name`, if any.
    pub fn find(&self, name: &str) -> Option<Arc<Chat>> {
        self.lock_tape()
            .iter()
            .find(|ex| ex.name == name)
            .map(|ex| Arc::clone(&ex.chat))
    }

    /// Every execution under `name`, in tape order.
    pub fn find_all(&self, name: &str) -> Vec<Arc<Chat>> {
        self.lock_tape()
            .iter()
            .filter(|ex| ex.name == name)
            .map(|ex| Arc::clone(&ex.chat))
            .collect()
    }

    /// Most recent execution under `name`, if any.
    pub fn find_last(&self, name: &str) -> Option<Arc<Chat>> {
        self.lock_tape()
            .iter()
            .rev()
            .find(|ex| ex.name == name)
            .map(|ex| Arc::clone(&ex.chat))
    }

    // ── Execution ───────────────────────────────────────────────────

    /// Execute the chore registered under `name`, record the resulting
    /// chat on the tape, publish `chat.success`, then run the chore's
    /// post-execution hooks in registration order.
    pub async fn exec(self: &Arc<Self>, name: &str) -> Result<Arc<Chat>> {
        let chore = self.shift.chore(name, self)?;
        let index = self.lock_tape().len();
        tracing::debug!(job = %self.id, chore = %name, index, "executing chore");

        // Weak captures: the completed chat lands on the tape, so a strong
        // handle here would cycle Job → Chat → handler → Job.
        let handlers = ChatEventHandlers {
            on_message: Some({
                let job = Arc::downgrade(self);
                let name = name.to_string();
                Arc::new(move |message, chat| {
                    if let Some(job) = job.upgrade() {
                        job.emit_chat_message(&name, index, message, chat);
                    }
                })
            }),
            on_message_delta: Some({
                let job = Arc::downgrade(self);
                let name = name.to_string();
                Arc::new(move |delta, chat| {
                    if let Some(job) = job.upgrade() {
                        job.emit_chat_delta(&name, index, &delta.text, &delta.snapshot, chat);
                    }
                })
            }),
        };

        let chat = Arc::new(chore.exec(self.shift.config(), handlers).await?);
        self.lock_tape().push(JobExecution {
            name: name.to_string(),
            chat: Arc::clone(&chat),
        });
        self.emit_chat_success(name, index, &chat);

        for hook in self.shift.after_hooks(name) {
            hook(Arc::clone(self)).await?;
        }
        Ok(chat)
    }

    /// Build the worker registered under `name`.
    pub fn worker(&self, name: &str) -> Result<Worker> {
        self.shift.worker(name, self)
    }

    // ── Resolution ──────────────────────────────────────────────────

    /// Resolve to Success and publish `success`. No-op once resolved.
    pub fn finish(&self) {
        if !self.resolve(JobStatus::Success) {
            return;
        }
        tracing::debug!(job = %self.id, "job finished");
        // Drop the registry guard before dispatch so handlers may register
        // further observers on this job.
        let handlers = self.observers().success.clone();
        for handler in handlers {
            handler(self);
        }
    }

    /// Resolve to Failure and publish `failure`. No-op once resolved.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.resolve(JobStatus::Failure) {
            return;
        }
        tracing::error!(job = %self.id, %reason, "job failed");
        let handlers = self.observers().failure.clone();
        for handler in handlers {
            handler(self, &reason);
        }
    }

    /// Await the terminal status. Usable by any number of waiters; a job
    /// that is already resolved returns immediately.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.status_rx.clone();
        match rx.wait_for(|status| *status != JobStatus::Pending).await {
            Ok(status) => *status,
            // The sender lives in `self`, so this arm is unreachable while
            // the job is borrowed.
            Err(_) => self.status(),
        }
    }

    fn resolve(&self, status: JobStatus) -> bool {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == JobStatus::Pending {
                *current = status;
                true
            } else {
                false
            }
        });
        if !changed {
            tracing::debug!(job = %self.id, ?status, "job already resolved; ignoring");
        }
        changed
    }

    // ── Observers ───────────────────────────────────────────────────

    pub fn on_chat_message(
        &self,
        handler: impl for<'a> Fn(ChoreMessageEvent<'a>, &Job<T>) + Send + Sync + 'static,
    ) {
        self.observers_mut().chat_message.push(Arc::new(handler));
    }

    pub fn on_chat_message_delta(
        &self,
        handler: impl for<'a> Fn(ChoreDeltaEvent<'a>, &Job<T>) + Send + Sync + 'static,
    ) {
        self.observers_mut().chat_delta.push(Arc::new(handler));
    }

    pub fn on_chat_success(
        &self,
        handler: impl for<'a> Fn(ChoreSuccessEvent<'a>, &Job<T>) + Send + Sync + 'static,
    ) {
        self.observers_mut().chat_success.push(Arc::new(handler));
    }

    pub fn on_success(&self, handler: impl Fn(&Job<T>) + Send + Sync + 'static) {
        self.observers_mut().success.push(Arc::new(handler));
    }

    pub fn on_failure(&self, handler: impl Fn(&Job<T>, &str) + Send + Sync + 'static) {
        self.observers_mut().failure.push(Arc::new(handler));
    }

    fn emit_chat_message(&self, name: &str, index: usize, message: &ChatMessage, chat: &Chat) {
        let handlers = self.observers().chat_message.clone();
        for handler in handlers {
            handler(
                ChoreMessageEvent {
                    name,
                    index,
                    message,
                    chat,
                },
                self,
            );
        }
    }

    fn emit_chat_delta(&self, name: &str, index: usize, text: &str, snapshot: &str, chat: &Chat) {
        let handlers = self.observers().chat_delta.clone();
        for handler in handlers {
            handler(
                ChoreDeltaEvent {
                    name,
                    index,
                    text,
                    snapshot,
                    chat,
                },
                self,
            );
        }
    }

    fn emit_chat_success(&self, name: &str, index: usize, chat: &Chat) {
        let handlers = self.observers().chat_success.clone();
        for handler in handlers {
            handler(ChoreSuccessEvent { name, index, chat }, self);
        }
    }

    fn lock_tape(&self) -> std::sync::MutexGuard<'_, Vec<JobExecution>> {
        self.tape.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> std::sync::RwLockReadGuard<'_, JobObservers<T>> {
        self.observers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers_mut(&self) -> std::sync::RwLockWriteGuard<'_, JobObservers<T>> {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
