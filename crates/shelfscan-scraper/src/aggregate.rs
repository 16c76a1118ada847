//! Batch driver: bounded-concurrency fan-out over the per-item pipeline.
//!
//! An [`Aggregator`] is scoped to one batch. It owns the only cross-item state
//! in the crate (the dedup sets and the running [`OutcomeCounts`]) and drops
//! it when the batch is done.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::Fetcher;
use crate::identity::{name_key, url_key};
use crate::pipeline::Pipeline;
use crate::retry::{Sleeper, TokioSleeper};
use crate::types::{ItemIdentity, ItemOutcome, ItemTarget, Outcome, ScrapeItem};

/// Running totals for a batch. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub accepted: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Items dropped because an earlier item had the same identity key.
    pub duplicates: usize,
}

impl OutcomeCounts {
    /// Items that produced an outcome.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.accepted + self.degraded + self.failed
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Accepted { .. } => self.accepted += 1,
            Outcome::Degraded { .. } => self.degraded += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct Aggregator<F, S = TokioSleeper> {
    pipeline: Pipeline<F, S>,
    concurrency: usize,
    cancel: CancellationToken,
    counts: Mutex<OutcomeCounts>,
}

impl<F: Fetcher, S: Sleeper> Aggregator<F, S> {
    /// `concurrency` is clamped to at least one worker.
    #[must_use]
    pub fn new(pipeline: Pipeline<F, S>, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
            cancel,
            counts: Mutex::new(OutcomeCounts::default()),
        }
    }

    /// Snapshot of the running totals.
    #[must_use]
    pub fn counts(&self) -> OutcomeCounts {
        *lock(&self.counts)
    }

    /// Token that cancels this batch.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Processes `items` with at most `concurrency` in flight and yields one
    /// [`ItemOutcome`] per distinct item as each finishes.
    ///
    /// Items fetched by URL are deduplicated on source + canonical URL before
    /// any work starts. Inline items have no URL of their own and are
    /// deduplicated on source + extracted name as their outcomes arrive: the
    /// first Accepted outcome for a name wins, and a non-Accepted one is only
    /// yielded, at the end of the batch, when no Accepted duplicate turned up.
    pub fn run(&self, items: Vec<ScrapeItem>) -> impl Stream<Item = ItemOutcome> + '_ {
        let submitted = items.len();
        let mut seen_urls = HashSet::new();
        let mut queued = Vec::with_capacity(submitted);
        for (index, item) in items.into_iter().enumerate() {
            let identity = ItemIdentity {
                index,
                source: item.source.clone(),
                url: item.url_hint().map(str::to_owned),
            };
            if let ItemTarget::Url(url) = &item.target {
                if !seen_urls.insert(url_key(&item.source, url)) {
                    tracing::debug!(item = %identity, "dropping duplicate URL");
                    self.tally_duplicate();
                    continue;
                }
            }
            queued.push((identity, item));
        }
        tracing::info!(
            submitted,
            queued = queued.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        let names = Arc::new(Mutex::new(NameGate::default()));
        let held = Arc::clone(&names);
        let processed = stream::iter(queued)
            .map(move |(identity, item)| {
                let inline = matches!(item.target, ItemTarget::Inline { .. });
                async move {
                    let outcome = self.pipeline.process(&identity, item, &self.cancel).await;
                    (inline, ItemOutcome { identity, outcome })
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(move |(inline, item)| {
                let released = if inline {
                    let admission = lock(&names).admit(item);
                    if admission.duplicate {
                        self.tally_duplicate();
                    }
                    admission.release
                } else {
                    Some(item)
                };
                future::ready(released)
            });
        let leftovers = stream::once(future::lazy(move |_| lock(&held).drain()))
            .flat_map(stream::iter);

        processed.chain(leftovers).map(move |item| {
            self.tally(&item.outcome);
            item
        })
    }

    fn tally(&self, outcome: &Outcome) {
        lock(&self.counts).record(outcome);
    }

    fn tally_duplicate(&self) {
        lock(&self.counts).duplicates += 1;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What to do with one arrival at the [`NameGate`].
struct Admission {
    release: Option<ItemOutcome>,
    /// An outcome for this name was dropped.
    duplicate: bool,
}

/// Name-keyed dedup for inline items.
///
/// The first Accepted outcome for a name is released at once and later ones
/// are dropped. A Degraded or Failed outcome is held back until an Accepted
/// one claims its name, in which case it is dropped, or until the batch
/// ends. Outcomes without a name pass straight through.
#[derive(Default)]
struct NameGate {
    accepted: HashSet<String>,
    held: HashMap<String, ItemOutcome>,
}

impl NameGate {
    fn admit(&mut self, item: ItemOutcome) -> Admission {
        let Some(key) = item
            .outcome
            .record()
            .and_then(|record| record.name())
            .map(|name| name_key(&item.identity.source, name))
        else {
            return Admission {
                release: Some(item),
                duplicate: false,
            };
        };

        if self.accepted.contains(&key) {
            tracing::debug!(item = %item.identity, "dropping duplicate product name");
            return Admission {
                release: None,
                duplicate: true,
            };
        }
        if matches!(item.outcome, Outcome::Accepted { .. }) {
            let superseded = self.held.remove(&key);
            if let Some(held) = &superseded {
                tracing::debug!(
                    item = %held.identity,
                    "accepted duplicate supersedes held outcome"
                );
            }
            self.accepted.insert(key);
            return Admission {
                release: Some(item),
                duplicate: superseded.is_some(),
            };
        }
        if self.held.contains_key(&key) {
            tracing::debug!(item = %item.identity, "dropping duplicate product name");
            return Admission {
                release: None,
                duplicate: true,
            };
        }
        self.held.insert(key, item);
        Admission {
            release: None,
            duplicate: false,
        }
    }

    /// Held outcomes no Accepted duplicate claimed, in submission order.
    fn drain(&mut self) -> Vec<ItemOutcome> {
        let mut held: Vec<ItemOutcome> = self.held.drain().map(|(_, item)| item).collect();
        held.sort_by_key(|item| item.identity.index);
        held
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
