//! Collective operations between workers.
//!
//! The pipeline has exactly two synchronization points: the exclusive
//! prefix-sum that establishes the global offset space, and the final size
//! reduction. Both are blocking all-to-all aggregations over one `u64` per
//! worker; a worker that fails elsewhere poisons the state so nobody stays
//! parked in a dead round.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::ArchiveError;

/// Aggregation state for one team of workers.
pub struct Comm {
    inner: Arc<Shared>,
}

struct Shared {
    workers: usize,
    state: Mutex<Round>,
    cv: Condvar,
}

struct Round {
    values: Vec<u64>,
    snapshot: Vec<u64>,
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

impl Comm {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0);
        Comm {
            inner: Arc::new(Shared {
                workers,
                state: Mutex::new(Round {
                    values: vec![0; workers],
                    snapshot: Vec::new(),
                    arrived: 0,
                    generation: 0,
                    poisoned: false,
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// Per-worker handle; `rank` orders the prefix-sum.
    pub fn handle(&self, rank: usize) -> CommHandle {
        assert!(rank < self.inner.workers);
        CommHandle { rank, shared: Arc::clone(&self.inner) }
    }
}

/// One worker's view of the collective state.
#[derive(Clone)]
pub struct CommHandle {
    rank: usize,
    shared: Arc<Shared>,
}

impl CommHandle {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Exclusive prefix-sum: the summed contributions of all lower-ranked
    /// workers. Blocks until every worker has contributed.
    pub fn exscan_sum(&self, value: u64) -> Result<u64, ArchiveError> {
        let all = self.gather(value)?;
        Ok(all[..self.rank].iter().sum())
    }

    /// Sum of every worker's contribution; completing it means every worker
    /// has reached this point.
    pub fn allreduce_sum(&self, value: u64) -> Result<u64, ArchiveError> {
        let all = self.gather(value)?;
        Ok(all.iter().sum())
    }

    /// Wake every peer blocked in a collective with an abort error and
    /// refuse any further rounds.
    pub fn poison(&self) {
        let mut st = self.shared.state.lock().expect("collective state lock");
        st.poisoned = true;
        self.shared.cv.notify_all();
    }

    /// One aggregation round: deposit this worker's value, wait for the
    /// team, return everyone's values in rank order.
    fn gather(&self, value: u64) -> Result<Vec<u64>, ArchiveError> {
        let mut st = self.shared.state.lock().expect("collective state lock");
        if st.poisoned {
            return Err(ArchiveError::Aborted);
        }
        let entered = st.generation;
        st.values[self.rank] = value;
        st.arrived += 1;
        if st.arrived == self.shared.workers {
            // Last one in closes the round; peers read the snapshot, so the
            // deposit slots are free for the next round immediately.
            st.snapshot = st.values.clone();
            st.arrived = 0;
            st.generation += 1;
            self.shared.cv.notify_all();
        }
        while st.generation == entered && !st.poisoned {
            st = self.shared.cv.wait(st).expect("collective state lock");
        }
        if st.generation == entered {
            return Err(ArchiveError::Aborted);
        }
        Ok(st.snapshot.clone())
    }
}
