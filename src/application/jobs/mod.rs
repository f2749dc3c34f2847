mod context;
mod queue;
mod recompute;
mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use context::JobWorkerContext;
pub use queue::{EnqueueOutcome, RecomputeScheduler, enqueue_job};
pub use recompute::{RecomputeLastmodJobPayload, RecomputeOutcome, process_recompute_lastmod_job};
pub use sweep::{RefreshSweepJobPayload, SweepOutcome, SweepReport, process_refresh_sweep_job};
