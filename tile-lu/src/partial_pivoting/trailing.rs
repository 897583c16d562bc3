use super::{owned_tiles, rows_below};
use tile_core::{mul::matmul, tile::TileColMut, ComplexField, Parallelism};

/// Applies the Schur complement update of the panel `k..k + kb` to the trailing rows owned by
/// `rank`: `A22 -= L21 × U12`.
///
/// # Safety
///
/// The panel and `U12` must be final, and must not be written concurrently. The owned rows below
/// the panel must not be accessed by any other worker.
pub(super) unsafe fn update<T: ComplexField>(
    a: TileColMut<'_, T>,
    k: usize,
    kb: usize,
    rank: usize,
    size: usize,
) {
    let n = a.ncols();
    let trailing_cols = n - k - kb;
    if trailing_cols == 0 {
        return;
    }

    let u12 = a.tile(0).submatrix_unchecked(k, k + kb, kb, trailing_cols);

    for l in owned_tiles(rank, size, a.tile_rows()) {
        let span = rows_below(a, l, k + kb - 1);
        if span.len == 0 {
            continue;
        }
        let l21 = a.tile(l).submatrix_unchecked(span.local_start, k, span.len, kb);
        let a22 = a
            .tile_mut(l)
            .submatrix_unchecked(span.local_start, k + kb, span.len, trailing_cols);
        matmul(a22, l21, u12, Some(T::one()), -T::one(), Parallelism::None);
    }
}
