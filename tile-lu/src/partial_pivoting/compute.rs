use super::{
    left, owned_tiles, rows_below,
    scratch::{PivotsMut, RankRegisters, SingularityFlag},
    search, trailing,
};
use crate::TeamError;
use equator::assert;
use std::sync::Barrier;
use tile_core::{
    barrier::TeamBarrier,
    mul::matmul,
    parallelism_degree,
    solve::solve_unit_lower_triangular_in_place,
    tile::{TileColMut, TiledMat},
    ComplexField, MatMut, Parallelism, RealField,
};

/// LU factorization tuning parameters.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct PartialPivLuParams {
    /// Number of columns factored per panel before the trailing update.
    pub panel_width: usize,
}

impl Default for PartialPivLuParams {
    #[inline]
    fn default() -> Self {
        Self { panel_width: 32 }
    }
}

/// Information about the resulting LU factorization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartialPivLuInfo {
    /// 1-based index of the first column whose pivot was exactly zero. The factorization is
    /// still complete, but $U$ is singular.
    pub first_zero_pivot: Option<usize>,
    /// Number of transpositions that were performed, can be used to compute the determinant of
    /// $P$.
    pub transposition_count: usize,
}

/// Multiplies by the reciprocal of the pivot, unless that reciprocal would overflow, in which case
/// every entry is divided by the pivot.
#[inline]
fn scale_below_pivot<T: ComplexField>(col: MatMut<'_, T>, pivot: T, sfmin: T::Real) {
    if pivot.abs() >= sfmin {
        let inv = pivot.inv();
        col.for_each(|x| *x = *x * inv);
    } else {
        col.for_each(|x| *x = *x / pivot);
    }
}

/// Divides the owned rows of column `j` below the diagonal by the pivot, then applies the rank-1
/// update to the remaining panel columns `j + 1..k + kb`.
unsafe fn scale_and_update<T: ComplexField>(
    a: TileColMut<'_, T>,
    j: usize,
    k: usize,
    kb: usize,
    rank: usize,
    size: usize,
    sfmin: T::Real,
) {
    let pivot = a.tile(0).read_unchecked(j, j);
    let rest = k + kb - j - 1;
    let u = a.tile(0).submatrix_unchecked(j, j + 1, 1, rest);

    for l in owned_tiles(rank, size, a.tile_rows()) {
        let span = rows_below(a, l, j);
        if span.len == 0 {
            continue;
        }

        if pivot != T::zero() {
            scale_below_pivot(
                a.tile_mut(l).submatrix_unchecked(span.local_start, j, span.len, 1),
                pivot,
                sfmin,
            );
        }

        let l21 = a.tile(l).submatrix_unchecked(span.local_start, j, span.len, 1);
        let a22 = a
            .tile_mut(l)
            .submatrix_unchecked(span.local_start, j + 1, span.len, rest);
        matmul(a22, l21, u, Some(T::one()), -T::one(), Parallelism::None);
    }
}

/// Leader step closing the panel `k..k + kb`: makes the panel pivots absolute, applies them to
/// the columns right of the panel, and computes `U12`.
unsafe fn finish_panel<T: ComplexField>(
    a: TileColMut<'_, T>,
    ipiv: PivotsMut<'_>,
    k: usize,
    kb: usize,
) {
    let n = a.ncols();

    for i in k..k + kb {
        ipiv.write(i, ipiv.read(i) + k);
    }
    for i in k..k + kb {
        a.swap_rows(i, ipiv.read(i) - 1, k + kb..n);
    }

    solve_unit_lower_triangular_in_place(
        a.tile(0).submatrix_unchecked(k, k, kb, kb),
        a.tile_mut(0).submatrix_unchecked(k, k + kb, kb, n - k - kb),
        Parallelism::None,
    );
}

/// Computes the LU factorization with partial pivoting of the tile-column `a`, as the member
/// `rank` of a team of `size` workers.
///
/// On exit, the strictly lower part of the first `min(m, n)` columns holds the multipliers of
/// $L$ (its unit diagonal is implicit), the upper part holds $U$, and `ipiv[i]` holds the 1-based
/// row interchanged with row `i` at step `i`. If a pivot is exactly zero, `info` receives the
/// 1-based index of its column (first occurrence only) and the factorization carries on.
///
/// Panels of `ib` columns are factored column by column, then the trailing matrix is updated
/// with a single matrix product per owned tile-row. The interchanges of later panels are applied
/// to the columns of earlier panels at the end.
///
/// The kernel does not spawn threads: the caller runs it once per rank, and all the members of
/// the team rendezvous on `barrier`.
///
/// # Safety
///
/// - `getrf` must be called exactly once for every rank in `0..size`, concurrently, with the same
///   `a`, `ipiv`, `ib`, `registers`, `info` and `barrier`.
/// - `barrier` must release its waiters once exactly `size` of them are waiting, and must
///   synchronize memory between them.
/// - Nothing else may access `a` or `ipiv` until every member has returned.
///
/// # Panics
///
/// Panics if `ib` is zero, if `rank >= size`, if `registers` was not allocated for `size`
/// workers, if `ipiv.len() < min(m, n)`, or if the diagonal block does not fit in tile-row 0.
#[track_caller]
pub unsafe fn getrf<T: ComplexField>(
    a: TileColMut<'_, T>,
    ipiv: PivotsMut<'_>,
    ib: usize,
    rank: usize,
    size: usize,
    registers: &RankRegisters<T>,
    info: &SingularityFlag,
    barrier: &(impl TeamBarrier + ?Sized),
) {
    let size_mn = Ord::min(a.nrows(), a.ncols());
    assert!(all(
        ib > 0,
        rank < size,
        registers.len() == size,
        ipiv.len() >= size_mn,
        size_mn <= a.tile_nrows(0)
    ));

    #[cfg(feature = "perf-warn")]
    if rank == 0 && size > a.tile_rows() && tile_core::__perf_warn!(IDLE_WORKERS_WARN) {
        log::warn!(
            target: "tile_perf",
            "LU team has {} workers for {} tile-rows, some workers will stay idle.",
            size,
            a.tile_rows()
        );
    }

    let sfmin = T::Real::sfmin();

    for k in (0..size_mn).step_by(ib) {
        let kb = Ord::min(ib, size_mn - k);

        for j in k..k + kb {
            registers.store(rank, search::local_search(a, j, rank, size));
            barrier.wait();

            if rank == 0 {
                search::reduce_and_swap(a, ipiv, registers, info, j, k, kb);
            }
            barrier.wait();

            scale_and_update(a, j, k, kb, rank, size, sfmin);
            barrier.wait();
        }

        if rank == 0 {
            finish_panel(a, ipiv, k, kb);
        }
        barrier.wait();

        trailing::update(a, k, kb, rank, size);
        barrier.wait();
    }

    left::apply(a, ipiv, ib, rank, size);
}

/// Computes the LU factorization with partial pivoting of `matrix` in place, using a team of
/// workers sized after `parallelism`.
///
/// `matrix` must consist of a single tile-column, and its diagonal block must fit in tile-row 0.
/// The team runs on a dedicated rayon thread pool, or on the calling thread when the team has a
/// single member.
///
/// # Panics
///
/// Panics if `matrix` has more than one tile-column, if `ipiv.len() < min(m, n)`, or if the
/// diagonal block does not fit in tile-row 0.
#[track_caller]
pub fn lu_in_place<T: ComplexField>(
    matrix: &mut TiledMat<T>,
    ipiv: &mut [usize],
    parallelism: Parallelism,
    params: PartialPivLuParams,
) -> Result<PartialPivLuInfo, TeamError> {
    let size_mn = Ord::min(matrix.nrows(), matrix.ncols());
    assert!(all(
        matrix.tile_cols() <= 1,
        ipiv.len() >= size_mn,
        size_mn <= matrix.tile_nrows(0)
    ));

    let size = Ord::max(parallelism_degree(parallelism), 1);
    let ib = Ord::max(params.panel_width, 1);

    let registers = RankRegisters::new(size);
    let info = SingularityFlag::new();
    let barrier = Barrier::new(size);
    let a = matrix.tile_col_mut(0);
    let pivots = PivotsMut::new(ipiv);

    if size == 1 {
        // SAFETY: single member team on the calling thread.
        unsafe { getrf(a, pivots, ib, 0, 1, &registers, &info, &barrier) };
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|idx| format!("tile-lu-{idx}"))
            .build()?;
        // SAFETY: `broadcast` runs the closure once on each of the `size` threads of the pool,
        // with distinct indices, and only returns after all of them are done.
        pool.broadcast(|ctx| unsafe {
            getrf(a, pivots, ib, ctx.index(), size, &registers, &info, &barrier)
        });
    }

    let transposition_count = ipiv[..size_mn]
        .iter()
        .enumerate()
        .filter(|&(i, &p)| p != i + 1)
        .count();

    Ok(PartialPivLuInfo {
        first_zero_pivot: info.first_zero_pivot(),
        transposition_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial_pivoting::reconstruct::reconstruct;
    use assert_approx_eq::assert_approx_eq;
    use equator::assert;
    use rand::random;
    use tile_core::{
        c64,
        permutation::{geswp, Axis, Direction},
    };

    fn params(panel_width: usize) -> PartialPivLuParams {
        PartialPivLuParams { panel_width }
    }

    fn random_mat(m: usize, n: usize, mb: usize, nb: usize) -> TiledMat<f64> {
        TiledMat::from_fn(m, n, mb, nb, |_, _| random::<f64>())
    }

    fn max_abs<T: ComplexField>(a: &TiledMat<T>) -> T::Real {
        let mut max = T::Real::zero();
        for j in 0..a.ncols() {
            for i in 0..a.nrows() {
                let abs = a.read(i, j).abs();
                if abs > max {
                    max = abs;
                }
            }
        }
        max
    }

    fn assert_reconstructs(orig: &TiledMat<f64>, lu: &TiledMat<f64>, ipiv: &[usize]) {
        let rec = reconstruct(lu, ipiv);
        for i in 0..orig.nrows() {
            for j in 0..orig.ncols() {
                assert_approx_eq!(rec.read(i, j), orig.read(i, j));
            }
        }
    }

    #[test]
    fn compute_lu() {
        for (m, n, mb, nb) in [
            (1, 1, 1, 1),
            (4, 4, 4, 4),
            (10, 10, 10, 10),
            (40, 8, 8, 8),
            (37, 12, 12, 12),
            (23, 7, 7, 8),
            (5, 9, 5, 9),
            (64, 20, 20, 20),
        ] {
            for size in [1, 2, 3, 4] {
                for ib in [1, 3, 4, 32] {
                    let orig = random_mat(m, n, mb, nb);
                    let mut lu = orig.clone();
                    let mut ipiv = vec![0; Ord::min(m, n)];

                    let info =
                        lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(size), params(ib))
                            .unwrap();

                    assert!(info.first_zero_pivot == None);
                    for (i, &p) in ipiv.iter().enumerate() {
                        assert!(all(p >= i + 1, p <= m));
                    }
                    assert_reconstructs(&orig, &lu, &ipiv);
                }
            }
        }
    }

    #[test]
    fn multipliers_are_bounded() {
        let orig = random_mat(50, 10, 10, 10);
        let mut lu = orig.clone();
        let mut ipiv = vec![0; 10];
        lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(3), params(4)).unwrap();

        for j in 0..10 {
            for i in j + 1..50 {
                assert!(lu.read(i, j).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn team_size_does_not_change_result() {
        for (m, n, mb) in [(30, 6, 6), (50, 10, 10), (17, 5, 5)] {
            let orig = random_mat(m, n, mb, n);

            let mut lu_seq = orig.clone();
            let mut ipiv_seq = vec![0; n];
            lu_in_place(&mut lu_seq, &mut ipiv_seq, Parallelism::None, params(3)).unwrap();

            for size in [2, 3, 4, 7] {
                let mut lu_par = orig.clone();
                let mut ipiv_par = vec![0; n];
                lu_in_place(&mut lu_par, &mut ipiv_par, Parallelism::Rayon(size), params(3))
                    .unwrap();

                assert!(ipiv_par == ipiv_seq);
                for i in 0..m {
                    for j in 0..n {
                        assert_approx_eq!(lu_par.read(i, j), lu_seq.read(i, j));
                    }
                }
            }
        }
    }

    #[test]
    fn tied_pivots_do_not_depend_on_team_size() {
        // rows 5 and 9 hold the same magnitude and live in tile-rows owned by different workers
        let orig = TiledMat::from_fn(12, 4, 4, 4, |i, j| match (i, j) {
            (5, 0) => 3.0,
            (9, 0) => -3.0,
            _ => random::<f64>(),
        });

        let mut lu_seq = orig.clone();
        let mut ipiv_seq = vec![0; 4];
        lu_in_place(&mut lu_seq, &mut ipiv_seq, Parallelism::None, params(2)).unwrap();
        assert!(ipiv_seq[0] == 6);

        for size in [2, 3] {
            let mut lu_par = orig.clone();
            let mut ipiv_par = vec![0; 4];
            lu_in_place(&mut lu_par, &mut ipiv_par, Parallelism::Rayon(size), params(2)).unwrap();

            assert!(ipiv_par == ipiv_seq);
            for i in 0..12 {
                for j in 0..4 {
                    assert_approx_eq!(lu_par.read(i, j), lu_seq.read(i, j));
                }
            }
        }
    }

    #[test]
    fn two_interchange_scenario() {
        let values = [
            [1.0, 2.0, 3.0, 4.0],
            [8.0, 1.0, 2.0, 1.0],
            [2.0, 9.0, 1.0, 3.0],
            [4.0, 3.0, 7.0, 2.0],
        ];
        let orig = TiledMat::from_fn(4, 4, 4, 4, |i, j| values[i][j]);

        for (parallelism, ib) in [(Parallelism::Rayon(2), 2), (Parallelism::None, 4)] {
            let mut lu = orig.clone();
            let mut ipiv = vec![0; 4];
            let info = lu_in_place(&mut lu, &mut ipiv, parallelism, params(ib)).unwrap();

            assert!(ipiv == [2, 3, 4, 4]);
            assert!(all(info.first_zero_pivot == None, info.transposition_count == 3));

            let rec = reconstruct(&lu, &ipiv);
            let mut residual = 0.0f64;
            for i in 0..4 {
                for j in 0..4 {
                    residual = residual.max((rec.read(i, j) - orig.read(i, j)).abs());
                }
            }
            assert!(residual / max_abs(&orig) < 1e-12);
        }
    }

    #[test]
    fn zero_pivot_is_reported_and_factorization_completes() {
        // column 2 stays exactly zero through the elimination
        let orig = TiledMat::from_fn(12, 5, 5, 5, |_, j| {
            if j == 2 {
                0.0
            } else {
                random::<f64>()
            }
        });

        for size in [1, 2, 3] {
            let mut lu = orig.clone();
            let mut ipiv = vec![0; 5];
            let info = lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(size), params(2)).unwrap();

            assert!(info.first_zero_pivot == Some(3));
            assert!(ipiv[2] == 3);
            assert_reconstructs(&orig, &lu, &ipiv);

            // columns after the zero pivot are still scaled
            for j in 3..5 {
                for i in j + 1..12 {
                    assert!(lu.read(i, j).abs() <= 1.0);
                }
            }
        }
    }

    #[test]
    fn first_zero_pivot_wins() {
        let orig = TiledMat::from_fn(6, 6, 6, 6, |i, j| {
            if j == 1 || j == 4 {
                0.0
            } else {
                (1 + i * 7 + j * j) as f64
            }
        });
        let mut lu = orig.clone();
        let mut ipiv = vec![0; 6];
        let info = lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(2), params(2)).unwrap();
        assert!(info.first_zero_pivot == Some(2));
    }

    #[test]
    fn empty_matrices_leave_pivots_untouched() {
        for (m, n) in [(0, 3), (3, 0), (0, 0)] {
            let mut a = TiledMat::<f64>::zeros(m, n, 4, 4);
            let mut ipiv = vec![7; 3];
            let info = lu_in_place(&mut a, &mut ipiv, Parallelism::Rayon(2), params(2)).unwrap();

            assert!(ipiv == [7, 7, 7]);
            assert!(all(info.first_zero_pivot == None, info.transposition_count == 0));
        }
    }

    #[test]
    fn one_by_one_zero() {
        let mut a = TiledMat::<f64>::zeros(1, 1, 1, 1);
        let mut ipiv = vec![0; 1];
        let info = lu_in_place(&mut a, &mut ipiv, Parallelism::None, params(1)).unwrap();

        assert!(info.first_zero_pivot == Some(1));
        assert!(ipiv == [1]);
        assert!(a.read(0, 0) == 0.0);
    }

    #[test]
    fn tiny_pivot_scales_by_reciprocal() {
        let mut a = TiledMat::from_fn(2, 1, 2, 1, |i, _| if i == 0 { 1e-300 } else { 5e-301 });
        let mut ipiv = vec![0; 1];
        lu_in_place(&mut a, &mut ipiv, Parallelism::None, params(1)).unwrap();

        assert!(ipiv == [1]);
        assert_approx_eq!(a.read(1, 0), 0.5);
    }

    #[test]
    fn subnormal_pivot_divides() {
        assert!(1e-310 < f64::sfmin());

        let values = [1e-310, 5e-311, -2.5e-311];
        for (size, mb) in [(1, 3), (2, 1), (3, 1)] {
            let orig = TiledMat::from_fn(3, 1, mb, 1, |i, _| values[i]);
            let mut lu = orig.clone();
            let mut ipiv = vec![0; 1];
            let info = lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(size), params(1)).unwrap();

            assert!(all(ipiv == [1], info.first_zero_pivot == None));
            assert!(lu.read(0, 0) == 1e-310);
            assert_approx_eq!(lu.read(1, 0), 0.5);
            assert_approx_eq!(lu.read(2, 0), -0.25);
        }
    }

    #[test]
    fn partial_tiles_match_single_block() {
        let (m, n) = (11, 5);
        let orig = random_mat(m, n, 6, 6);
        let single = orig.retile(m, n);

        let mut lu_tiled = orig.clone();
        let mut ipiv_tiled = vec![0; n];
        lu_in_place(&mut lu_tiled, &mut ipiv_tiled, Parallelism::Rayon(2), params(2)).unwrap();

        let mut lu_single = single.clone();
        let mut ipiv_single = vec![0; n];
        lu_in_place(&mut lu_single, &mut ipiv_single, Parallelism::None, params(2)).unwrap();

        assert!(ipiv_tiled == ipiv_single);
        for i in 0..m {
            for j in 0..n {
                assert_approx_eq!(lu_tiled.read(i, j), lu_single.read(i, j));
            }
        }
    }

    #[test]
    fn complex_lu() {
        let (m, n) = (24, 6);
        let orig = TiledMat::from_fn(m, n, 6, 6, |_, _| c64 {
            re: random(),
            im: random(),
        });
        let mut lu = orig.clone();
        let mut ipiv = vec![0; n];
        lu_in_place(&mut lu, &mut ipiv, Parallelism::Rayon(3), params(4)).unwrap();

        let rec = reconstruct(&lu, &ipiv);
        for i in 0..m {
            for j in 0..n {
                assert_approx_eq!(rec.read(i, j).re, orig.read(i, j).re);
                assert_approx_eq!(rec.read(i, j).im, orig.read(i, j).im);
            }
        }
    }

    #[test]
    fn kernel_runs_on_scoped_threads() {
        let (m, n, size) = (20, 4, 3);
        let orig = random_mat(m, n, 4, 4);
        let mut lu = orig.clone();
        let mut ipiv = vec![0; n];

        let registers = RankRegisters::new(size);
        let info = SingularityFlag::new();
        let barrier = Barrier::new(size);
        let a = lu.tile_col_mut(0);
        let pivots = PivotsMut::new(&mut ipiv);

        std::thread::scope(|s| {
            for rank in 0..size {
                let (registers, info, barrier) = (&registers, &info, &barrier);
                s.spawn(move || unsafe {
                    getrf(a, pivots, 2, rank, size, registers, info, barrier)
                });
            }
        });

        assert!(info.get() == 0);
        assert_reconstructs(&orig, &lu, &ipiv);

        // matches a factorization applied to the permuted input
        let mut permuted = orig.clone();
        geswp(&mut permuted, Axis::Rows, 1, n, &ipiv, Direction::Forward);
        let mut ipiv_again = vec![0; n];
        lu_in_place(&mut permuted, &mut ipiv_again, Parallelism::None, params(2)).unwrap();
        for (i, &p) in ipiv_again.iter().enumerate() {
            assert!(p == i + 1);
        }
    }
}
