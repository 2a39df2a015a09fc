//! Shifts: the name-keyed registry and entry point for starting jobs.
//!
//! A shift maps job names to start routines, chore names to chore
//! factories, worker names to worker factories, and chore names to ordered
//! post-execution hooks. Registries are written during application setup
//! and read-only thereafter.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::chore::Chore;
use crate::config::Config;
use crate::error::{JobError, Result, ShiftError};
use crate::job::Job;
use crate::worker::Worker;

/// What a chore factory may return: a full chore, or a bare task string
/// shorthand. Normalized to a [`Chore`] on lookup.
pub enum ChoreInit {
    Task(String),
    Chore(Chore),
}

impl From<&str> for ChoreInit {
    fn from(task: &str) -> Self {
        ChoreInit::Task(task.to_string())
    }
}

impl From<String> for ChoreInit {
    fn from(task: String) -> Self {
        ChoreInit::Task(task)
    }
}

impl From<Chore> for ChoreInit {
    fn from(chore: Chore) -> Self {
        ChoreInit::Chore(chore)
    }
}

impl ChoreInit {
    fn into_chore(self) -> Chore {
        match self {
            ChoreInit::Task(task) => Chore::new(task),
            ChoreInit::Chore(chore) => chore,
        }
    }
}

type StartFn<T> = Arc<dyn Fn(Arc<Job<T>>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type ChoreFn<T> = Arc<dyn Fn(&Job<T>) -> ChoreInit + Send + Sync>;
type WorkerFn<T> = Arc<dyn Fn(&Job<T>) -> Worker + Send + Sync>;

/// A post-execution hook, awaited after the chore it is attached to.
pub(crate) type AfterHook<T> =
    Arc<dyn Fn(Arc<Job<T>>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Registry of job starters, chore factories, worker factories, and
/// post-execution hooks.
pub struct Shift<T> {
    config: Config,
    jobs: RwLock<HashMap<String, StartFn<T>>>,
    chores: RwLock<HashMap<String, ChoreFn<T>>>,
    workers: RwLock<HashMap<String, WorkerFn<T>>>,
    after_hooks: RwLock<HashMap<String, Vec<AfterHook<T>>>>,
}

impl<T: Send + Sync + 'static> Shift<T> {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            jobs: RwLock::new(HashMap::new()),
            chores: RwLock::new(HashMap::new()),
            workers: RwLock::new(HashMap::new()),
            after_hooks: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a job start routine under `name`.
    pub fn define_job<F, Fut>(&self, name: impl Into<String>, start: F) -> Result<()>
    where
        F: Fn(Arc<Job<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let mut jobs = write(&self.jobs);
        if jobs.contains_key(&name) {
            return Err(ShiftError::DuplicateName { kind: "job", name }.into());
        }
        tracing::debug!(job = %name, "defined job");
        jobs.insert(name, Arc::new(move |job| start(job).boxed()));
        Ok(())
    }

    /// Register a chore factory under `name`. The factory receives the job,
    /// so chores can be built from the job's input.
    pub fn define_chore<F, C>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&Job<T>) -> C + Send + Sync + 'static,
        C: Into<ChoreInit>,
    {
        let name = name.into();
        let mut chores = write(&self.chores);
        if chores.contains_key(&name) {
            return Err(ShiftError::DuplicateName { kind: "chore", name }.into());
        }
        tracing::debug!(chore = %name, "defined chore");
        chores.insert(name, Arc::new(move |job| factory(job).into()));
        Ok(())
    }

    /// Register a worker factory under `name`.
    pub fn define_worker<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&Job<T>) -> Worker + Send + Sync + 'static,
    {
        let name = name.into();
        let mut workers = write(&self.workers);
        if workers.contains_key(&name) {
            return Err(ShiftError::DuplicateName {
                kind: "worker",
                name,
            }
            .into());
        }
        tracing::debug!(worker = %name, "defined worker");
        workers.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Attach a post-execution hook to an already-defined chore. Hooks run
    /// in registration order after each execution of that chore.
    pub fn after_exec<F, Fut>(&self, name: impl Into<String>, hook: F) -> Result<()>
    where
        F: Fn(Arc<Job<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if !read(&self.chores).contains_key(&name) {
            return Err(ShiftError::ChoreNotDefined { name }.into());
        }
        write(&self.after_hooks)
            .entry(name)
            .or_default()
            .push(Arc::new(move |job| hook(job).boxed()));
        Ok(())
    }

    // ── Execution ───────────────────────────────────────────────────

    /// Construct a job and schedule its start routine onto the executor.
    ///
    /// The handle is returned without awaiting the routine. On a
    /// current-thread runtime the routine body cannot run before the
    /// caller's next suspension point, so observers registered right after
    /// this call see every event. On a multi-thread runtime the routine may
    /// begin on another worker immediately; callers that need the
    /// no-missed-events guarantee there should register observers from
    /// within the start routine itself. A routine that returns an error
    /// resolves the job to Failure if it has not already resolved itself.
    pub fn start_job(self: &Arc<Self>, name: &str, input: T) -> Result<Arc<Job<T>>> {
        let start = read(&self.jobs)
            .get(name)
            .cloned()
            .ok_or_else(|| ShiftError::JobNotDefined {
                name: name.to_string(),
            })?;

        let job = Arc::new(Job::new(Arc::clone(self), input));
        tracing::debug!(job = %job.id(), name = %name, "starting job");

        let handle = Arc::clone(&job);
        tokio::spawn(async move {
            if let Err(e) = start(Arc::clone(&handle)).await {
                handle.fail(e.to_string());
            }
        });
        Ok(job)
    }

    // ── Lookups (used by Job) ───────────────────────────────────────

    pub(crate) fn chore(&self, name: &str, job: &Job<T>) -> Result<Chore> {
        let factory = read(&self.chores)
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::ChoreNotDefined {
                name: name.to_string(),
            })?;
        Ok(factory(job).into_chore())
    }

    pub(crate) fn worker(&self, name: &str, job: &Job<T>) -> Result<Worker> {
        let factory = read(&self.workers)
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::WorkerNotDefined {
                name: name.to_string(),
            })?;
        Ok(factory(job))
    }

    pub(crate) fn after_hooks(&self, name: &str) -> Vec<AfterHook<T>> {
        read(&self.after_hooks)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

fn read<V>(lock: &RwLock<V>) -> std::sync::RwLockReadGuard<'_, V> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<V>(lock: &RwLock<V>) -> std::sync::RwLockWriteGuard<'_, V> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
