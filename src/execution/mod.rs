//! Tick execution: candidate pipeline, broker submission and reporting.

pub mod context;
pub mod idempotency;
pub mod orchestrator;
pub mod quality;
pub mod report;
pub mod retry;
pub mod selection;

pub use context::{PriceCache, TickContext, TtlCache};
pub use orchestrator::{candidate_budget, normalize_pair, Clock, ExecutionEngine, TickRequest};
pub use report::{BalanceSource, CandidateOutcome, TickReport};
pub use retry::{submit_with_retry, RetryPolicy, SubmissionOutcome};
