//! Dynamic work distribution: the submit/process seam the copy phase runs on.
//!
//! Every worker registers the same pair of callbacks: `create` submits that
//! worker's initial items exactly once, `process` consumes one item and may
//! submit more. The pool owns load balancing (any worker picks up any item)
//! and termination detection (the run drains when no item is queued or in
//! flight and no worker is still creating). Handlers must tolerate an item
//! being processed more than once; the delivery contract is at-least-once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::ArchiveError;

enum Msg<T> {
    Item(T),
    Done,
}

/// Shared handle to one work pool; clone it once per worker.
pub struct WorkPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkPool<T> {
    fn clone(&self) -> Self {
        WorkPool { shared: Arc::clone(&self.shared) }
    }
}

struct Shared<T> {
    tx: Sender<Msg<T>>,
    rx: Receiver<Msg<T>>,
    workers: usize,
    /// Items submitted but not yet fully processed.
    pending: AtomicUsize,
    /// Workers that have not finished their create callback.
    creating: AtomicUsize,
    poisoned: AtomicBool,
}

impl<T: Send> WorkPool<T> {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0);
        let (tx, rx) = unbounded();
        WorkPool {
            shared: Arc::new(Shared {
                tx,
                rx,
                workers,
                pending: AtomicUsize::new(0),
                creating: AtomicUsize::new(workers),
                poisoned: AtomicBool::new(false),
            }),
        }
    }

    /// Tear the pool down; every worker's [`WorkPool::run`] returns
    /// `Aborted` once it observes the poisoned state.
    pub fn poison(&self) {
        self.shared.poisoned.store(true, Ordering::SeqCst);
        self.broadcast_done();
    }

    /// Run one worker's share of the pool until the whole team's work
    /// drains. `create` is invoked exactly once, before any item is pulled.
    pub fn run(
        &self,
        create: impl FnOnce(&Submitter<T>),
        mut process: impl FnMut(&Submitter<T>, T) -> Result<(), ArchiveError>,
    ) -> Result<(), ArchiveError> {
        let submitter = Submitter { shared: Arc::clone(&self.shared) };
        create(&submitter);
        if self.shared.creating.fetch_sub(1, Ordering::SeqCst) == 1
            && self.shared.pending.load(Ordering::SeqCst) == 0
        {
            self.broadcast_done();
        }

        loop {
            match self.shared.rx.recv() {
                Ok(Msg::Item(item)) => {
                    if self.shared.poisoned.load(Ordering::SeqCst) {
                        // Job is going down; count the item off without
                        // touching the output.
                        self.complete_one();
                        continue;
                    }
                    match process(&submitter, item) {
                        Ok(()) => self.complete_one(),
                        Err(e) => {
                            self.poison();
                            return Err(e);
                        }
                    }
                }
                Ok(Msg::Done) | Err(_) => break,
            }
        }

        if self.shared.poisoned.load(Ordering::SeqCst) {
            Err(ArchiveError::Aborted)
        } else {
            Ok(())
        }
    }

    fn complete_one(&self) {
        if self.shared.pending.fetch_sub(1, Ordering::SeqCst) == 1
            && self.shared.creating.load(Ordering::SeqCst) == 0
        {
            self.broadcast_done();
        }
    }

    fn broadcast_done(&self) {
        for _ in 0..self.shared.workers {
            let _ = self.shared.tx.send(Msg::Done);
        }
    }
}

/// Submission handle passed to the create and process callbacks.
pub struct Submitter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Submitter<T> {
    pub fn submit(&self, item: T) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let _ = self.shared.tx.send(Msg::Item(item));
    }
}
