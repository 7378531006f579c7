//! FTIO deferred staging.
//!
//! When FTIO mode is armed, incoming transfers are stored instead of being
//! dispatched. The scheduler either waits out a period (re-armable by a new
//! FTIO call) or idles until a run trigger arrives, then stages whatever
//! quiescent files the stored sources currently hold and unlinks them
//! afterwards.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use cargo_api::{Dataset, TransferId};

use crate::coordinator::Coordinator;

/// A transfer stored for deferred staging.
#[derive(Debug, Clone)]
pub struct StagedTransfer {
    pub tid: TransferId,
    pub sources: Vec<Dataset>,
    pub targets: Vec<Dataset>,
}

#[derive(Debug, Default, Clone)]
struct FtioInner {
    armed: bool,
    confidence: f32,
    probability: f32,
    period: f32,
    run: bool,
    /// Bumped on every FTIO call; lets the scheduler restart a pending wait.
    generation: u64,
    pending: Option<StagedTransfer>,
}

/// Shared FTIO arming state.
#[derive(Debug, Default)]
pub struct FtioState {
    inner: Mutex<FtioInner>,
}

/// One consistent view of the arming state.
#[derive(Debug, Clone, Copy)]
pub struct FtioSnapshot {
    pub armed: bool,
    pub period: f32,
    pub run: bool,
    pub generation: u64,
    pub has_pending: bool,
}

impl FtioState {
    /// Arms (or re-arms) FTIO mode. A positive period forces the run flag.
    ///
    /// Confidence and probability are arm-time inputs with no further
    /// effect on scheduling; they are kept for operators.
    pub fn arm(&self, confidence: f32, probability: f32, period: f32, run: bool) {
        let mut inner = self.inner.lock().expect("ftio state poisoned");
        inner.armed = true;
        inner.confidence = confidence;
        inner.probability = probability;
        inner.period = period;
        inner.run = run || period > 0.0;
        inner.generation += 1;
        info!(
            confidence,
            probability,
            period,
            run = inner.run,
            "ftio armed"
        );
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().expect("ftio state poisoned").armed
    }

    /// Stores the transfer the scheduler should stage.
    pub fn store_pending(&self, staged: StagedTransfer) {
        let mut inner = self.inner.lock().expect("ftio state poisoned");
        debug!(tid = staged.tid, "transfer stored for deferred staging");
        inner.pending = Some(staged);
    }

    pub fn pending(&self) -> Option<StagedTransfer> {
        self.inner.lock().expect("ftio state poisoned").pending.clone()
    }

    pub fn snapshot(&self) -> FtioSnapshot {
        let inner = self.inner.lock().expect("ftio state poisoned");
        FtioSnapshot {
            armed: inner.armed,
            period: inner.period,
            run: inner.run,
            generation: inner.generation,
            has_pending: inner.pending.is_some(),
        }
    }

    fn clear_run(&self) {
        self.inner.lock().expect("ftio state poisoned").run = false;
    }
}

/// The FTIO scheduler task. Idle unless a transfer is pending; exits when
/// the coordinator begins shutting down.
pub async fn scheduler_loop(coordinator: std::sync::Arc<Coordinator>) {
    loop {
        if coordinator.is_shutting_down() {
            break;
        }

        let snapshot = coordinator.ftio().snapshot();
        if !snapshot.armed || !snapshot.has_pending {
            sleep(Duration::from_millis(500)).await;
            continue;
        }

        if snapshot.period > 0.0 {
            // Sleep out the period in one-second decrements so a new FTIO
            // call can restart the wait.
            let mut remaining = snapshot.period;
            let mut restarted = false;
            while remaining > 0.0 {
                sleep(Duration::from_secs_f32(remaining.min(1.0))).await;
                if coordinator.is_shutting_down() {
                    return;
                }
                if coordinator.ftio().snapshot().generation != snapshot.generation {
                    restarted = true;
                    break;
                }
                remaining -= 1.0;
            }
            if restarted {
                continue;
            }
            coordinator.run_staged().await;
        } else if snapshot.run {
            coordinator.ftio().clear_run();
            coordinator.run_staged().await;
        } else {
            sleep(Duration::from_millis(250)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargo_api::DatasetKind;

    #[test]
    fn positive_period_forces_the_run_flag() {
        let state = FtioState::default();
        state.arm(0.9, 0.9, 3.0, false);
        let snap = state.snapshot();
        assert!(snap.armed);
        assert!(snap.run);
        assert_eq!(snap.period, 3.0);
    }

    #[test]
    fn rearming_bumps_the_generation() {
        let state = FtioState::default();
        state.arm(-1.0, -1.0, 2.0, false);
        let first = state.snapshot().generation;
        state.arm(-1.0, -1.0, 5.0, false);
        assert!(state.snapshot().generation > first);
        assert_eq!(state.snapshot().period, 5.0);
    }

    #[test]
    fn pending_transfers_are_kept_until_replaced() {
        let state = FtioState::default();
        assert!(state.pending().is_none());

        state.store_pending(StagedTransfer {
            tid: 7,
            sources: vec![Dataset::new("/buf/out", DatasetKind::AdhocA)],
            targets: vec![Dataset::new("/pfs/out", DatasetKind::Parallel)],
        });
        let staged = state.pending().unwrap();
        assert_eq!(staged.tid, 7);
        assert_eq!(staged.sources[0].kind(), DatasetKind::AdhocA);
    }

    #[test]
    fn run_flag_clears_without_disarming() {
        let state = FtioState::default();
        state.arm(0.5, 0.5, -1.0, true);
        assert!(state.snapshot().run);
        state.clear_run();
        assert!(!state.snapshot().run);
        assert!(state.is_armed());
    }
}
