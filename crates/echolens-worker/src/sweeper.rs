//! Startup recovery sweep
//!
//! Runs once when a worker process becomes ready. Reconciles queue state
//! from the call store: a call still marked PROCESSING after a restart lost
//! its worker, so it is reset to PENDING and re-enqueued alongside any
//! PENDING calls that never got a task.

use crate::queue::TaskQueue;
use crate::store::CallStore;
use echolens_core::CallStatus;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Counts from one recovery sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Calls reset from PROCESSING back to PENDING
    pub reset: usize,
    /// Calls re-enqueued for processing
    pub enqueued: usize,
    /// Calls skipped because of an individual failure
    pub skipped: usize,
}

/// Sweep unfinished calls back onto the queue
///
/// Individual failures are logged and skipped; the sweep itself never fails.
pub async fn recover(store: &Arc<dyn CallStore>, queue: &TaskQueue) -> SweepReport {
    let mut report = SweepReport::default();

    let calls = match store.recoverable_calls().await {
        Ok(calls) => calls,
        Err(e) => {
            error!(error = %e, "Recovery sweep could not list unfinished calls");
            return report;
        }
    };

    info!(count = calls.len(), "Recovery sweep found unfinished calls");

    for call in calls {
        if call.status == CallStatus::Processing {
            if let Err(e) = store.update_status(call.id, CallStatus::Pending).await {
                warn!(call_id = %call.id, error = %e, "Could not reset stuck call, skipping");
                report.skipped += 1;
                continue;
            }
            report.reset += 1;
        }

        match queue.enqueue(call.id).await {
            Ok(()) => report.enqueued += 1,
            Err(e) => {
                warn!(call_id = %call.id, error = %e, "Could not re-enqueue call, skipping");
                report.skipped += 1;
            }
        }
    }

    info!(
        reset = report.reset,
        enqueued = report.enqueued,
        skipped = report.skipped,
        "Recovery sweep finished"
    );

    report
}
