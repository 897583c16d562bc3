//! `tile-lu` computes the LU decomposition with partial pivoting of a tiled panel, cooperatively,
//! with a team of workers that synchronize through a shared barrier.
//!
//! The per-worker entry point is [`partial_pivoting::compute::getrf`], which can run under any
//! thread scheduler. [`partial_pivoting::compute::lu_in_place`] launches a team on a rayon pool.

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

pub mod partial_pivoting;

/// Errors raised while launching a worker team.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TeamError {
    /// The thread pool hosting the team could not be created.
    #[error("failed to build the worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
