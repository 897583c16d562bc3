//! Rendezvous primitive for a fixed-size team of workers.
//!
//! Cooperative kernels only synchronize through [`TeamBarrier::wait`]. An implementation must
//! release every waiter only once all the members of the team have arrived, and must behave as a
//! full memory fence: writes performed by any member before it enters the barrier are visible to
//! every member after it leaves.

/// Reusable barrier shared by the members of a team.
pub trait TeamBarrier: Sync {
    /// Blocks until every member of the team has called `wait` for the current generation.
    fn wait(&self);
}

impl TeamBarrier for std::sync::Barrier {
    #[inline]
    fn wait(&self) {
        std::sync::Barrier::wait(self);
    }
}
