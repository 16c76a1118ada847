//! Structured diagnostics for fetch attempts and tier escalation.
//!
//! Every event goes to `tracing`. Callers that want the events as data (for
//! metrics, progress bars, or tests) can additionally take the receiving end
//! of a channel with [`Diagnostics::channel`].

use serde::Serialize;
use shelfscan_core::{FieldName, Tier};
use tokio::sync::mpsc;

use crate::error::FailureClass;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// One fetch attempt finished.
    FetchAttempt {
        item: String,
        url: String,
        attempt: u32,
        succeeded: bool,
        class: Option<FailureClass>,
        error: Option<String>,
        /// Wait scheduled before the next attempt, if any.
        backoff_ms: Option<u64>,
    },
    /// A tier ran and its output was merged.
    TierCompleted {
        item: String,
        tier: Tier,
        filled: Vec<FieldName>,
        score: f64,
    },
    /// The record was insufficient after `from`; `to` runs next.
    TierEscalation {
        item: String,
        from: Tier,
        to: Tier,
        score: f64,
    },
    /// The item reached its terminal outcome.
    Outcome { item: String, status: &'static str },
}

/// Handle through which pipeline stages report events. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    tx: Option<mpsc::UnboundedSender<DiagnosticEvent>>,
}

impl Diagnostics {
    /// Log-only diagnostics.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Diagnostics that also forward every event to the returned receiver.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DiagnosticEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: DiagnosticEvent) {
        log_event(&event);
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("diagnostics receiver dropped");
            }
        }
    }
}

fn log_event(event: &DiagnosticEvent) {
    match event {
        DiagnosticEvent::FetchAttempt {
            item,
            url,
            attempt,
            succeeded: true,
            ..
        } => tracing::debug!(%item, %url, attempt, "fetch attempt succeeded"),
        DiagnosticEvent::FetchAttempt {
            item,
            url,
            attempt,
            class,
            error,
            backoff_ms,
            ..
        } => tracing::warn!(
            %item,
            %url,
            attempt,
            class = ?class,
            error = error.as_deref().unwrap_or(""),
            backoff_ms = ?backoff_ms,
            "fetch attempt failed"
        ),
        DiagnosticEvent::TierCompleted {
            item,
            tier,
            filled,
            score,
        } => tracing::debug!(%item, %tier, filled = ?filled, score, "tier completed"),
        DiagnosticEvent::TierEscalation {
            item,
            from,
            to,
            score,
        } => tracing::debug!(%item, %from, %to, score, "escalating to next tier"),
        DiagnosticEvent::Outcome { item, status } => {
            tracing::info!(%item, status, "item finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_receives_emitted_events() {
        let (diagnostics, mut rx) = Diagnostics::channel();
        diagnostics.emit(DiagnosticEvent::Outcome {
            item: "#0 shop".to_owned(),
            status: "accepted",
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            DiagnosticEvent::Outcome {
                item: "#0 shop".to_owned(),
                status: "accepted",
            }
        );
    }

    #[test]
    fn emit_without_receiver_is_a_no_op() {
        let (diagnostics, rx) = Diagnostics::channel();
        drop(rx);
        diagnostics.emit(DiagnosticEvent::Outcome {
            item: "#0 shop".to_owned(),
            status: "failed",
        });
        Diagnostics::disabled().emit(DiagnosticEvent::Outcome {
            item: "#1 shop".to_owned(),
            status: "failed",
        });
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = DiagnosticEvent::TierEscalation {
            item: "#2 shop".to_owned(),
            from: Tier::Standard,
            to: Tier::Alternative,
            score: 0.25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "tier_escalation");
        assert_eq!(json["from"], "standard");
        assert_eq!(json["to"], "alternative");
    }
}
