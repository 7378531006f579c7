//! The cohort transport: coordinator ⇄ worker control plane.
//!
//! A cohort is the set of worker processes that execute collective
//! operations together; the coordinator is not a member. Each worker owns a
//! [`WorkerEndpoint`] (inbox, status uplink, collective barrier) and the
//! coordinator owns the [`CohortController`] (per-worker outboxes, status
//! drain, exit barrier).
//!
//! The in-process implementation backs the endpoints with mpsc channels and
//! `std::sync::Barrier`; the barrier gives collective calls the total order
//! the parallel-IO primitives rely on. Workers run as dedicated OS threads,
//! so all endpoint operations are synchronous; the coordinator drains
//! statuses non-blockingly from its listener task.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Barrier, Mutex};

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::message::{ControlMessage, StatusMessage};

/// Creates an in-process cohort of `nworkers` workers.
///
/// Returns the coordinator-side controller and one endpoint per worker,
/// indexed by cohort rank.
pub fn in_proc_cohort(nworkers: usize) -> (CohortController, Vec<WorkerEndpoint>) {
    assert!(nworkers > 0, "a cohort needs at least one worker");

    let (status_tx, status_rx) = channel();
    // Collective barrier spans the workers only; the exit barrier also
    // includes the coordinator.
    let collective_barrier = Arc::new(Barrier::new(nworkers));
    let exit_barrier = Arc::new(Barrier::new(nworkers + 1));

    let mut inboxes = Vec::with_capacity(nworkers);
    let mut endpoints = Vec::with_capacity(nworkers);

    for rank in 0..nworkers {
        let (tx, rx) = channel();
        inboxes.push(tx);
        endpoints.push(WorkerEndpoint {
            rank,
            size: nworkers,
            inbox: rx,
            status_tx: status_tx.clone(),
            collective_barrier: collective_barrier.clone(),
            exit_barrier: exit_barrier.clone(),
        });
    }

    let controller = CohortController {
        inboxes,
        status_rx: Mutex::new(status_rx),
        exit_barrier,
    };

    (controller, endpoints)
}

/// A worker's side of the cohort transport.
pub struct WorkerEndpoint {
    rank: usize,
    size: usize,
    inbox: Receiver<ControlMessage>,
    status_tx: Sender<(usize, StatusMessage)>,
    collective_barrier: Arc<Barrier>,
    exit_barrier: Arc<Barrier>,
}

impl WorkerEndpoint {
    /// This worker's 0-based rank within the cohort.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers in the cohort.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Non-blocking probe of the control inbox.
    pub fn try_recv(&self) -> Result<Option<ControlMessage>> {
        match self.inbox.try_recv() {
            Ok(msg) => {
                trace!(rank = self.rank, tag = ?msg.tag(), "control message received");
                Ok(Some(msg))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::CohortClosed),
        }
    }

    /// Reports a status message upstream.
    pub fn send_status(&self, msg: StatusMessage) -> Result<()> {
        self.status_tx
            .send((self.rank, msg))
            .map_err(|_| TransportError::CohortClosed)
    }

    /// Collective barrier across the worker cohort. Every collective
    /// operation brackets its phases with this call.
    pub fn barrier(&self) {
        self.collective_barrier.wait();
    }

    /// Shutdown barrier spanning the workers and the coordinator. Called
    /// exactly once, right before the worker exits.
    pub fn exit_barrier(&self) {
        self.exit_barrier.wait();
    }
}

/// The coordinator's side of the cohort transport.
pub struct CohortController {
    inboxes: Vec<Sender<ControlMessage>>,
    status_rx: Mutex<Receiver<(usize, StatusMessage)>>,
    exit_barrier: Arc<Barrier>,
}

impl CohortController {
    /// Number of workers in the cohort.
    pub fn nworkers(&self) -> usize {
        self.inboxes.len()
    }

    /// Sends a message to a single worker.
    pub fn send(&self, wid: usize, msg: ControlMessage) -> Result<()> {
        self.inboxes
            .get(wid)
            .ok_or(TransportError::CohortClosed)?
            .send(msg)
            .map_err(|_| TransportError::CohortClosed)
    }

    /// Sends a message to every worker in the cohort.
    pub fn broadcast(&self, msg: ControlMessage) -> Result<()> {
        for tx in &self.inboxes {
            tx.send(msg.clone()).map_err(|_| TransportError::CohortClosed)?;
        }
        Ok(())
    }

    /// Non-blocking drain of one worker status message, with the reporting
    /// worker's rank.
    pub fn try_recv_status(&self) -> Result<Option<(usize, StatusMessage)>> {
        let rx = self.status_rx.lock().expect("status receiver poisoned");
        match rx.try_recv() {
            Ok(pair) => Ok(Some(pair)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::CohortClosed),
        }
    }

    /// Joins the cohort exit barrier. Blocks until every worker arrived.
    pub fn exit_barrier(&self) {
        self.exit_barrier.wait();
    }
}
