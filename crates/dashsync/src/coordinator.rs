//! Parallel sync of a batch of sources over a bounded worker pool.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::context::SyncContext;
use crate::feedback::Feedback;
use crate::orchestrator::{Orchestrator, SyncError, SyncResult};
use crate::spec::SourceSpec;

/// Number of sources synced at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Run lines of a batch, in completion order.
#[derive(Debug, Clone)]
pub struct SyncLog<K> {
    entries: Vec<(K, Feedback)>,
}

impl<K> SyncLog<K> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[(K, Feedback)] {
        &self.entries
    }

    pub fn lines(&self) -> impl Iterator<Item = &Feedback> {
        self.entries.iter().map(|(_, line)| line)
    }

    pub fn failure_count(&self) -> usize {
        self.lines().filter(|line| line.is_error()).count()
    }

    /// True when at least one source failed.
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct SyncCoordinator {
    orchestrator: Orchestrator,
    concurrency: usize,
}

impl SyncCoordinator {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sync every source in `batch` and return one run line per source.
    ///
    /// `on_each` observes each result as it completes. Sources that share a
    /// destination filename fail up front without running. A panic inside
    /// one source's sync becomes that source's failure. The batch always
    /// runs to completion.
    pub async fn run<K, F>(
        &self,
        batch: BTreeMap<K, SourceSpec>,
        ctx: &SyncContext,
        mut on_each: F,
    ) -> SyncLog<K>
    where
        K: Ord + Clone + Display + Send + 'static,
        F: FnMut(&K, &SyncResult),
    {
        let mut log = SyncLog::new();
        let mut names: BTreeMap<K, String> = BTreeMap::new();
        let mut record = |key: K, name: &str, result: SyncResult, log: &mut SyncLog<K>| {
            on_each(&key, &result);
            log.entries.push((key, Feedback::for_sync(name, &result)));
        };

        let duplicates = shared_destinations(&batch);
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();

        for (key, spec) in batch {
            let name = spec.display_name().to_owned();

            if let Some(filename) = duplicates.get(&key) {
                tracing::warn!(source = %name, %filename, "destination shared by several sources");
                let result = Err(SyncError::DuplicateFilename(filename.clone()));
                record(key, &name, result, &mut log);
                continue;
            }

            names.insert(key.clone(), name);
            pending.insert(key.clone());

            let orchestrator = self.orchestrator.clone();
            let semaphore = Arc::clone(&semaphore);
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (key, Err(SyncError::Fault(e.to_string()))),
                };
                let result = AssertUnwindSafe(orchestrator.sync(&spec, &ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(SyncError::Fault(panic_message(payload))));
                (key, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, result)) => {
                    pending.remove(&key);
                    if let Err(err) = &result {
                        tracing::warn!(source = %key, error = %err, "source failed");
                    }
                    let name = names.get(&key).cloned().unwrap_or_else(|| key.to_string());
                    record(key, &name, result, &mut log);
                }
                Err(e) => tracing::error!(error = %e, "sync worker ended abnormally"),
            }
        }

        // Workers lost without a result still get a line.
        for key in pending {
            let name = names.get(&key).cloned().unwrap_or_else(|| key.to_string());
            let result = Err(SyncError::Fault("worker ended without a result".into()));
            record(key, &name, result, &mut log);
        }

        log
    }

    /// Sync the active sources of a sources list, keyed by list position.
    pub async fn sync_all<F>(
        &self,
        sources: &[SourceSpec],
        ctx: &SyncContext,
        on_each: F,
    ) -> SyncLog<usize>
    where
        F: FnMut(&usize, &SyncResult),
    {
        self.run(active_batch(sources), ctx, on_each).await
    }
}

/// Active sources indexed by their position in the list.
pub fn active_batch(sources: &[SourceSpec]) -> BTreeMap<usize, SourceSpec> {
    sources
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.active)
        .map(|(i, spec)| (i, spec.clone()))
        .collect()
}

/// Keys whose normalised destination filename is also used by another
/// source in the batch, mapped to that filename.
fn shared_destinations<K: Ord + Clone>(batch: &BTreeMap<K, SourceSpec>) -> BTreeMap<K, String> {
    let mut by_filename: BTreeMap<String, Vec<K>> = BTreeMap::new();
    for (key, spec) in batch {
        if let Some(destination) = spec.destination() {
            by_filename.entry(destination).or_default().push(key.clone());
        }
    }

    by_filename
        .into_iter()
        .filter(|(_, keys)| keys.len() > 1)
        .flat_map(|(filename, keys)| keys.into_iter().map(move |k| (k, filename.clone())))
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_owned()
    }
}
