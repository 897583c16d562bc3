use super::{
    owned_tiles, rows_below,
    scratch::{Candidate, PivotsMut, RankRegisters, SingularityFlag},
};
use tile_core::{tile::TileColMut, ComplexField};

/// Scans column `j` over the tile-rows owned by `rank`, and returns the entry of largest
/// magnitude.
///
/// Every worker starts from the diagonal entry, so a worker owning no candidate row reports it
/// back with offset `0`. Ties keep the first entry found.
///
/// # Safety
///
/// Column `j` of the owned tile-rows, and the diagonal entry, must not be written concurrently.
pub(super) unsafe fn local_search<T: ComplexField>(
    a: TileColMut<'_, T>,
    j: usize,
    rank: usize,
    size: usize,
) -> Candidate<T> {
    let mut best = Candidate {
        offset: 0,
        value: a.tile(0).read_unchecked(j, j),
    };
    let mut best_abs = best.value.abs1();

    for l in owned_tiles(rank, size, a.tile_rows()) {
        let span = rows_below(a, l, j);
        let tile = a.tile(l);
        for i in 0..span.len {
            let value = tile.read_unchecked(span.local_start + i, j);
            let abs = value.abs1();
            if abs > best_abs {
                best = Candidate {
                    offset: span.global_start + i - j,
                    value,
                };
                best_abs = abs;
            }
        }
    }

    best
}

/// Picks the pivot of column `j` among the candidates of the team, records it, and moves the
/// pivot row into place over the panel columns `k..k + kb`.
///
/// Ties go to the candidate closest to the diagonal, which is the row a single worker scanning
/// the whole column would have kept.
///
/// # Safety
///
/// Must only be called by the leader, between the two barriers surrounding the reduction.
pub(super) unsafe fn reduce_and_swap<T: ComplexField>(
    a: TileColMut<'_, T>,
    ipiv: PivotsMut<'_>,
    registers: &RankRegisters<T>,
    info: &SingularityFlag,
    j: usize,
    k: usize,
    kb: usize,
) {
    let mut best = registers.load(0);
    let mut best_abs = best.value.abs1();
    for rank in 1..registers.len() {
        let candidate = registers.load(rank);
        let abs = candidate.value.abs1();
        if abs > best_abs || (abs == best_abs && candidate.offset < best.offset) {
            best = candidate;
            best_abs = abs;
        }
    }

    let jp = j + best.offset;
    ipiv.write(j, jp - k + 1);

    if best.value == T::zero() {
        if info.record(j + 1) {
            log::debug!(target: "tile_lu", "exact zero pivot in column {}", j + 1);
        }
    } else if jp != j {
        a.swap_rows(j, jp, k..k + kb);
    }
}
