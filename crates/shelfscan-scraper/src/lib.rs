pub mod aggregate;
pub mod client;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod identity;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod rate_limit;
pub mod retry;
mod selector;
pub mod types;

pub use aggregate::{Aggregator, OutcomeCounts};
pub use client::{FetchOptions, Fetcher, HttpFetcher};
pub use diagnostics::{DiagnosticEvent, Diagnostics};
pub use error::{FailureClass, FetchError, ScraperError};
pub use extract::extract;
pub use normalize::{normalize, FieldKind};
pub use pipeline::Pipeline;
pub use quality::{decide, evaluate, Verdict};
pub use rate_limit::RequestLimiter;
pub use retry::{BackoffPolicy, FetchController, Sleeper, TokioSleeper};
pub use types::{
    CandidateRecord, ExtractedField, FailureReason, FieldOrigin, FieldValue, ItemIdentity,
    ItemOutcome, ItemTarget, Outcome, RawDocument, ScrapeItem,
};
