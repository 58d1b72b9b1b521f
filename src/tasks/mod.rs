// src/tasks/mod.rs
//! Recurring tasks and their runner
//!
//! A [`Task`] does its work in `execute` against a [`TaskContext`] holding
//! the store connection, the run parameters and the task's loaded state.
//! Hooks declared by [`Task::lifecycle`] run before and after `execute`;
//! `on_error` hooks replace the `after` hooks when the run fails.
//!
//! Runs proceed in a fixed order:
//!
//! 1. load state and record the attempt
//! 2. `before` hooks, then `execute`
//! 3. `after` hooks on success, `on_error` hooks on failure
//! 4. save state if anything changed (failed runs included)
//! 5. record completion (success only)

mod main_entry;
mod repository_diff;
mod schedule;
mod state;
mod tracker;

pub use main_entry::{MainEntrySelector, select_main_entries};
pub use repository_diff::{KnownPackages, RepositoryDiffEngine};
pub use schedule::Scheduler;
pub use state::{Description, TaskState};
pub use tracker::{ChangeTracker, FieldAccessor, ItemSource, Pending, describe_fields};

use crate::error::{Error, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{error, info, warn};

/// Run-scoped switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunParameters {
    /// Treat every item as unprocessed
    pub force_update: bool,
    /// Mark pending items processed without doing any work
    pub fake_update: bool,
}

/// An item that could not be handled in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub key: String,
    pub error: String,
}

/// What a running task sees
pub struct TaskContext<'c> {
    conn: &'c Connection,
    params: RunParameters,
    state: TaskState,
    failures: Vec<ItemFailure>,
}

impl<'c> TaskContext<'c> {
    pub fn new(conn: &'c Connection, params: RunParameters, state: TaskState) -> Self {
        Self {
            conn,
            params,
            state,
            failures: Vec::new(),
        }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn params(&self) -> RunParameters {
        self.params
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    pub fn into_state(self) -> TaskState {
        self.state
    }

    /// Log and remember a failure of one item; the run goes on
    pub fn record_failure(&mut self, key: impl Into<String>, err: &Error) {
        let key = key.into();
        warn!("{}: item {} failed: {}", self.state.task_name(), key, err);
        self.failures.push(ItemFailure {
            key,
            error: err.to_string(),
        });
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// Persist the marks applied so far
    ///
    /// Advisory: lets a long loop keep its progress if the process dies.
    pub fn save_data(&mut self) -> Result<()> {
        if self.state.is_dirty() {
            self.state.save(self.conn)?;
        }
        Ok(())
    }
}

/// A lifecycle hook
pub type Hook<T> = fn(&mut T, &mut TaskContext) -> Result<()>;

/// Ordered hook lists of a task
pub struct Lifecycle<T> {
    pub before: Vec<Hook<T>>,
    pub after: Vec<Hook<T>>,
    pub on_error: Vec<Hook<T>>,
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            on_error: Vec::new(),
        }
    }
}

impl<T> Lifecycle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: Hook<T>) -> Self {
        self.before.push(hook);
        self
    }

    pub fn after(mut self, hook: Hook<T>) -> Self {
        self.after.push(hook);
        self
    }

    pub fn on_error(mut self, hook: Hook<T>) -> Self {
        self.on_error.push(hook);
        self
    }

    /// Register a hook for both the end of a good run and a failed one
    pub fn finally(self, hook: Hook<T>) -> Self {
        self.after(hook).on_error(hook)
    }
}

/// A recurring unit of work
pub trait Task {
    /// Unique name, also the key of the task's stored state
    fn name(&self) -> &'static str;

    fn scheduler(&self) -> Scheduler {
        Scheduler::Always
    }

    fn lifecycle(&self) -> Lifecycle<Self>
    where
        Self: Sized,
    {
        Lifecycle::new()
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()>;
}

/// A task driven by a [`ChangeTracker`]
pub trait TrackedTask: Task {
    type Source: ItemSource;

    fn tracker(&self) -> &ChangeTracker<Self::Source>;
}

/// Start hook: with `fake_update`, mark everything pending as processed
pub fn fake_update<T: TrackedTask>(task: &mut T, ctx: &mut TaskContext) -> Result<()> {
    if ctx.params().fake_update {
        let marked = task.tracker().fake_process_all(ctx)?;
        info!("{}: fake update marked {} items processed", Task::name(task), marked);
    }
    Ok(())
}

/// End hook: drop processed keys whose item vanished
pub fn prune<T: TrackedTask>(task: &mut T, ctx: &mut TaskContext) -> Result<()> {
    let pruned = task.tracker().prune(ctx)?;
    if pruned > 0 {
        info!("{}: pruned {} obsolete items", Task::name(task), pruned);
    }
    Ok(())
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    CompletedWithFailures(Vec<ItemFailure>),
    Failed(String),
}

impl TaskOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Object-safe view of a task, used by the registry
pub trait Runnable {
    fn name(&self) -> &'static str;
    fn scheduler(&self) -> Scheduler;
    fn run(&mut self, conn: &Connection, params: RunParameters) -> TaskOutcome;
}

impl<T: Task> Runnable for T {
    fn name(&self) -> &'static str {
        Task::name(self)
    }

    fn scheduler(&self) -> Scheduler {
        Task::scheduler(self)
    }

    fn run(&mut self, conn: &Connection, params: RunParameters) -> TaskOutcome {
        run_task(self, conn, params)
    }
}

/// Run one task through its whole lifecycle
pub fn run_task<T: Task>(task: &mut T, conn: &Connection, params: RunParameters) -> TaskOutcome {
    let name = Task::name(task);
    info!("Running task {}", name);

    let state = match TaskState::load(conn, name) {
        Ok(state) => state,
        Err(e) => {
            error!("{}: failed to load state: {}", name, e);
            return TaskOutcome::Failed(e.to_string());
        }
    };
    let mut ctx = TaskContext::new(conn, params, state);
    if let Err(e) = ctx.state_mut().record_mut().set_last_attempted_run(conn, Utc::now()) {
        error!("{}: failed to record attempt: {}", name, e);
        return TaskOutcome::Failed(e.to_string());
    }

    let lifecycle = task.lifecycle();
    let mut outcome = match run_body(task, &mut ctx, &lifecycle) {
        Ok(()) if ctx.failures().is_empty() => TaskOutcome::Completed,
        Ok(()) => TaskOutcome::CompletedWithFailures(ctx.failures().to_vec()),
        Err(e) => {
            error!("{}: run failed: {}", name, e);
            if let Err(hook_err) = run_hooks(task, &mut ctx, &lifecycle.on_error) {
                error!("{}: error hook failed: {}", name, hook_err);
            }
            TaskOutcome::Failed(e.to_string())
        }
    };

    if let Err(e) = ctx.save_data() {
        error!("{}: failed to save state: {}", name, e);
        outcome = TaskOutcome::Failed(e.to_string());
    }

    if !outcome.is_failed() {
        if let Err(e) = ctx.state_mut().record_mut().set_last_completed_run(conn, Utc::now()) {
            error!("{}: failed to record completion: {}", name, e);
            outcome = TaskOutcome::Failed(e.to_string());
        }
    }

    match &outcome {
        TaskOutcome::Completed => info!("Task {} completed", name),
        TaskOutcome::CompletedWithFailures(failures) => {
            warn!("Task {} completed with {} failed items", name, failures.len())
        }
        TaskOutcome::Failed(_) => {}
    }
    outcome
}

fn run_body<T: Task>(task: &mut T, ctx: &mut TaskContext, lifecycle: &Lifecycle<T>) -> Result<()> {
    run_hooks(task, ctx, &lifecycle.before)?;
    task.execute(ctx)?;
    run_hooks(task, ctx, &lifecycle.after)
}

fn run_hooks<T>(task: &mut T, ctx: &mut TaskContext, hooks: &[Hook<T>]) -> Result<()> {
    for hook in hooks {
        hook(task, ctx)?;
    }
    Ok(())
}

/// Run every task whose scheduler says it is due
///
/// Returns the name and outcome of each task that ran, in order.
pub fn run_all(
    tasks: &mut [Box<dyn Runnable>],
    conn: &Connection,
    params: RunParameters,
) -> Result<Vec<(&'static str, TaskOutcome)>> {
    let now = Utc::now();
    let mut outcomes = Vec::new();
    for task in tasks.iter_mut() {
        let last_attempted = crate::db::models::TaskData::find(conn, task.name())?
            .and_then(|data| data.last_attempted_run);
        if !task.scheduler().needs_run(last_attempted, now) {
            info!("Skipping {}: not due ({})", task.name(), task.scheduler());
            continue;
        }
        let outcome = task.run(conn, params);
        outcomes.push((task.name(), outcome));
    }
    Ok(outcomes)
}
