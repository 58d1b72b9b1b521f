// src/commands/task.rs
//! Task execution commands

use super::open_db;
use anyhow::{Result, bail};
use debtrack::Config;
use debtrack::jobs;
use debtrack::tasks::{self, RunParameters, Runnable, TaskOutcome};

/// Run one task immediately
pub fn cmd_run(config: &Config, name: &str, params: RunParameters) -> Result<()> {
    let conn = open_db(config)?;
    let mut task = jobs::create(config, name)?;
    let outcome = task.run(&conn, params);
    report(name, &outcome);
    if outcome.is_failed() {
        bail!("Task {} failed", name);
    }
    Ok(())
}

/// Run every task that is due
pub fn cmd_run_all(config: &Config, params: RunParameters) -> Result<()> {
    let conn = open_db(config)?;
    let mut registry = jobs::registry(config)?;
    let outcomes = tasks::run_all(&mut registry, &conn, params)?;

    if outcomes.is_empty() {
        println!("No task is due");
        return Ok(());
    }

    let mut failed = 0;
    for (name, outcome) in &outcomes {
        report(name, outcome);
        if outcome.is_failed() {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{} of {} tasks failed", failed, outcomes.len());
    }
    Ok(())
}

fn report(name: &str, outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Completed => println!("[ok]     {}", name),
        TaskOutcome::CompletedWithFailures(failures) => {
            println!("[warn]   {} ({} items failed)", name, failures.len());
            for failure in failures {
                println!("           {}: {}", failure.key, failure.error);
            }
        }
        TaskOutcome::Failed(error) => println!("[failed] {}: {}", name, error),
    }
}
