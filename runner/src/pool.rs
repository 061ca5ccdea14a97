//! Parallel workers built from cloned runners.
//!
//! There are no threads here: each worker owns one process, and concurrency
//! comes from starting a batch of processes without blocking and only then
//! waiting on each of them in turn.

use tracing::{debug, info};

use crate::error::Result;
use crate::runner::Runner;
use crate::tools::{Allstar, Daophot};

/// Anything driving exactly one [`Runner`] that can be cloned into an independent worker.
pub trait Worker: Sized {
    fn runner(&self) -> &Runner;

    fn runner_mut(&mut self) -> &mut Runner;

    fn try_clone(&self) -> Result<Self>;
}

impl Worker for Runner {
    fn runner(&self) -> &Runner {
        self
    }

    fn runner_mut(&mut self) -> &mut Runner {
        self
    }

    fn try_clone(&self) -> Result<Self> {
        Runner::try_clone(self)
    }
}

impl Worker for Daophot {
    fn runner(&self) -> &Runner {
        Daophot::runner(self)
    }

    fn runner_mut(&mut self) -> &mut Runner {
        Daophot::runner_mut(self)
    }

    fn try_clone(&self) -> Result<Self> {
        Daophot::try_clone(self)
    }
}

impl Worker for Allstar {
    fn runner(&self) -> &Runner {
        Allstar::runner(self)
    }

    fn runner_mut(&mut self) -> &mut Runner {
        Allstar::runner_mut(self)
    }

    fn try_clone(&self) -> Result<Self> {
        Allstar::try_clone(self)
    }
}

/// `count` independent clones of a quiescent `template`.
pub fn clone_many<W: Worker>(template: &W, count: usize) -> Result<Vec<W>> {
    let workers = (0..count)
        .map(|_| template.try_clone())
        .collect::<Result<Vec<_>>>()?;
    info!(count, "cloned workers");
    Ok(workers)
}

/// Run every worker's queued script, at most `parallel` processes at a time.
///
/// Each group is started without blocking and then joined in order, so the
/// outcomes line up with `workers`. One worker failing never stops the others.
pub fn run_all<W: Worker>(workers: &mut [W], parallel: usize) -> Vec<Result<()>> {
    let parallel = parallel.max(1);
    let mut outcomes = Vec::with_capacity(workers.len());
    for group in workers.chunks_mut(parallel) {
        let started: Vec<Result<()>> = group
            .iter_mut()
            .map(|worker| worker.runner_mut().run(false))
            .collect();
        debug!(size = group.len(), "started worker group");
        for (worker, start) in group.iter_mut().zip(started) {
            outcomes.push(start.and_then(|()| worker.runner_mut().wait_for_results()));
        }
    }
    outcomes
}
