//! The partial pivoting LU decomposition is such that:
//! $$PA = LU,$$
//! where $P$ is a permutation matrix, $L$ is a unit lower triangular matrix, and $U$ is
//! an upper triangular matrix.
//!
//! The factorization runs on a single tile-column of a [`tile_core::tile::TiledMat`], and is
//! computed cooperatively by a team of workers. Tile-rows are dealt to the workers in round robin
//! order: worker `rank` out of `size` owns tile-rows `rank, rank + size, rank + 2·size, ...`.
//! The diagonal block is required to fit inside tile-row 0, which is always owned by worker 0,
//! the leader of the team.

use tile_core::tile::TileColMut;

pub mod compute;
pub mod reconstruct;

mod left;
mod scratch;
mod search;
mod trailing;

pub use scratch::{Candidate, PivotsMut, RankRegisters, SingularityFlag};

/// Tile-rows owned by worker `rank` in a team of `size`.
#[inline]
fn owned_tiles(rank: usize, size: usize, tile_rows: usize) -> impl Iterator<Item = usize> {
    (rank..tile_rows).step_by(size)
}

/// Rows of one tile-row lying strictly below a given row of the diagonal block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct RowSpan {
    /// First row, relative to the tile.
    local_start: usize,
    /// First row, relative to the whole matrix.
    global_start: usize,
    len: usize,
}

/// Returns the rows of tile-row `l` that are strictly below row `pos`.
///
/// `pos` must lie in tile-row 0.
#[inline]
fn rows_below<T>(a: TileColMut<'_, T>, l: usize, pos: usize) -> RowSpan {
    if l == 0 {
        RowSpan {
            local_start: pos + 1,
            global_start: pos + 1,
            len: a.tile_nrows(0) - pos - 1,
        }
    } else {
        RowSpan {
            local_start: 0,
            global_start: l * a.mb(),
            len: a.tile_nrows(l),
        }
    }
}
