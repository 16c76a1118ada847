//! Per-item fetch → extract → validate pipeline.
//!
//! A [`Pipeline`] owns no per-item state; one worker drives one item through
//! it end to end and gets back a terminal [`Outcome`].

use shelfscan_core::ProfileRegistry;
use tokio_util::sync::CancellationToken;

use crate::client::Fetcher;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::extract::extract_observed;
use crate::quality::decide;
use crate::retry::{FetchController, Sleeper, TokioSleeper};
use crate::types::{FailureReason, ItemIdentity, ItemTarget, Outcome, RawDocument, ScrapeItem};

pub struct Pipeline<F, S = TokioSleeper> {
    registry: ProfileRegistry,
    controller: FetchController<F, S>,
}

impl<F: Fetcher, S: Sleeper> Pipeline<F, S> {
    #[must_use]
    pub fn new(registry: ProfileRegistry, controller: FetchController<F, S>) -> Self {
        Self {
            registry,
            controller,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub(crate) fn diagnostics(&self) -> &Diagnostics {
        self.controller.diagnostics()
    }

    /// Runs `item` to a terminal outcome. Never fails: every error becomes a
    /// [`Outcome::Failed`].
    pub async fn process(
        &self,
        identity: &ItemIdentity,
        item: ScrapeItem,
        cancel: &CancellationToken,
    ) -> Outcome {
        let label = identity.to_string();
        let outcome = self.run(&label, item, cancel).await;
        self.diagnostics().emit(DiagnosticEvent::Outcome {
            item: label,
            status: outcome.status(),
        });
        outcome
    }

    async fn run(&self, label: &str, item: ScrapeItem, cancel: &CancellationToken) -> Outcome {
        let Some(profile) = self.registry.get(&item.source) else {
            tracing::warn!(
                item = %label,
                source = %item.source,
                "no profile registered for source"
            );
            return Outcome::failed(FailureReason::UnknownSource {
                source: item.source,
            });
        };

        let document = match item.target {
            ItemTarget::Url(url) => {
                match self
                    .controller
                    .fetch_with_retry(&url, &profile, label, cancel)
                    .await
                {
                    Ok(document) => document,
                    Err(err) => return Outcome::failed(FailureReason::from(&err)),
                }
            }
            ItemTarget::Inline { base_url, markup } => {
                if cancel.is_cancelled() {
                    return Outcome::failed(FailureReason::Cancelled);
                }
                RawDocument::new(profile.id.clone(), base_url, markup, 0)
            }
        };

        let record = extract_observed(&document, &profile, self.diagnostics(), label);
        decide(record, &profile)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
