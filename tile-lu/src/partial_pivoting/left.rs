use super::scratch::PivotsMut;
use tile_core::{tile::TileColMut, ComplexField};

/// Applies the interchanges of later panels to the columns of earlier panels.
///
/// Column block `b` (columns `b·ib..(b + 1)·ib`) receives the interchanges `ipiv[(b + 1)·ib..]`,
/// and is handled by worker `b % size`. Blocks are disjoint, so no synchronization is needed
/// between workers.
///
/// # Safety
///
/// `ipiv` must be final. The columns of the blocks handled by `rank` must not be accessed by any
/// other worker.
pub(super) unsafe fn apply<T: ComplexField>(
    a: TileColMut<'_, T>,
    ipiv: PivotsMut<'_>,
    ib: usize,
    rank: usize,
    size: usize,
) {
    let size_mn = Ord::min(a.nrows(), a.ncols());

    for (block, k) in (ib..size_mn).step_by(ib).enumerate() {
        if block % size != rank {
            continue;
        }
        for i in k..size_mn {
            a.swap_rows(i, ipiv.read(i) - 1, k - ib..k);
        }
    }
}
