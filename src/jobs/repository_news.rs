// src/jobs/repository_news.rs

//! News items for packages entering, migrating between and leaving repositories

use crate::db::models::News;
use crate::error::Result;
use crate::tasks::{
    self, ChangeTracker, Lifecycle, RepositoryDiffEngine, Scheduler, Task, TaskContext,
    TrackedTask,
};
use tracing::info;

pub const NAME: &str = "repository-news";

pub struct RepositoryNews {
    tracker: ChangeTracker<RepositoryDiffEngine>,
}

impl Default for RepositoryNews {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryNews {
    pub fn new() -> Self {
        Self {
            tracker: ChangeTracker::new(RepositoryDiffEngine::new()),
        }
    }

    fn compute_known(&mut self, ctx: &mut TaskContext) -> Result<()> {
        self.tracker
            .source_mut()
            .compute_known(ctx.state().processed())
    }
}

impl Task for RepositoryNews {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::hours(4)
    }

    /// The known set is computed after a fake update so a bootstrap run
    /// produces no news. Pruning only follows a good run: the keys of
    /// vanished entries are what removal news is built from.
    fn lifecycle(&self) -> Lifecycle<Self> {
        Lifecycle::new()
            .before(tasks::fake_update::<Self>)
            .before(Self::compute_known)
            .after(tasks::prune::<Self>)
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let conn = ctx.conn();
        let tx = conn.unchecked_transaction()?;
        let diff = self.tracker.source();

        let mut published = 0;
        let mut handled = Vec::new();
        for entry in self.tracker.pending(ctx)? {
            let title = if diff.is_new_source_package(&entry.name, &entry.version)? {
                Some(format!(
                    "{} {} has been added to {}",
                    entry.name, entry.version, entry.repository_shorthand
                ))
            } else if diff.is_new_in_repository(&entry.name, &entry.version, entry.repository_id)? {
                Some(format!(
                    "{} {} migrated to {}",
                    entry.name, entry.version, entry.repository_shorthand
                ))
            } else {
                None
            };

            if let Some(title) = title {
                News::new(entry.name.clone(), title).insert(&tx)?;
                published += 1;
            }
            handled.push(entry);
        }

        for (name, repository) in diff.removals_by_repository(&tx)? {
            let title = format!("{} has been removed from {}", name, repository.shorthand);
            News::new(name, title).insert(&tx)?;
            published += 1;
        }

        tx.commit()?;
        // Marks go in only once the news they stand for is committed
        self.tracker.mark_processed(ctx, &handled)?;
        info!("Published {} repository news items", published);
        Ok(())
    }
}

impl TrackedTask for RepositoryNews {
    type Source = RepositoryDiffEngine;

    fn tracker(&self) -> &ChangeTracker<RepositoryDiffEngine> {
        &self.tracker
    }
}
