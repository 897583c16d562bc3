//! Matrix multiplication.

use crate::{c32, c64, ComplexField, MatMut, MatRef, Parallelism};
use equator::assert;
use reborrow::*;

#[inline]
fn gemm_parallelism(parallelism: Parallelism) -> gemm::Parallelism {
    match parallelism {
        Parallelism::None => gemm::Parallelism::None,
        Parallelism::Rayon(0) => gemm::Parallelism::Rayon(rayon::current_num_threads()),
        Parallelism::Rayon(n_threads) => gemm::Parallelism::Rayon(n_threads),
    }
}

fn matmul_fallback<T: ComplexField>(
    mut acc: MatMut<'_, T>,
    lhs: MatRef<'_, T>,
    rhs: MatRef<'_, T>,
    alpha: Option<T>,
    beta: T,
) {
    let m = acc.nrows();
    let n = acc.ncols();
    let k = lhs.ncols();

    for j in 0..n {
        for i in 0..m {
            let mut dot = T::zero();
            for depth in 0..k {
                dot = dot
                    + unsafe { lhs.read_unchecked(i, depth) * rhs.read_unchecked(depth, j) };
            }
            let prev = match alpha {
                Some(alpha) => alpha * unsafe { acc.read_unchecked(i, j) },
                None => T::zero(),
            };
            unsafe { acc.write_unchecked(i, j, prev + beta * dot) };
        }
    }
}

macro_rules! dispatch_gemm {
    ($ty: ty, $acc: ident, $lhs: ident, $rhs: ident, $alpha: ident, $beta: ident, $par: ident) => {
        if coe::is_same::<$ty, T>() {
            let m = $acc.nrows();
            let n = $acc.ncols();
            let k = $lhs.ncols();
            let alpha: Option<$ty> = $alpha.map(coe::coerce_static::<T, $ty>);
            let beta: $ty = coe::coerce_static::<T, $ty>($beta);
            // SAFETY: dimensions were checked by the caller, and `T` is the same type as `$ty`.
            unsafe {
                gemm::gemm(
                    m,
                    n,
                    k,
                    $acc.rb_mut().as_ptr() as *mut $ty,
                    $acc.col_stride(),
                    $acc.row_stride(),
                    alpha.is_some(),
                    $lhs.as_ptr() as *const $ty,
                    $lhs.col_stride(),
                    $lhs.row_stride(),
                    $rhs.as_ptr() as *const $ty,
                    $rhs.col_stride(),
                    $rhs.row_stride(),
                    alpha.unwrap_or(<$ty as ComplexField>::zero()),
                    beta,
                    false,
                    false,
                    false,
                    gemm_parallelism($par),
                )
            };
            return;
        }
    };
}

/// Computes the matrix product `[alpha * acc] + beta * lhs * rhs` and stores the result in `acc`.
///
/// Performs the operation:
/// - `acc = beta * lhs * rhs` if `alpha` is `None` (in this case, the preexisting values in `acc`
///   are not read, so it is allowed to be a view over uninitialized values if `T: Copy`),
/// - `acc = alpha * acc + beta * lhs * rhs` if `alpha` is `Some(_)`,
///
/// `f32`, `f64`, [`c32`] and [`c64`] are forwarded to the `gemm` crate, other field types use a
/// naive triple loop.
///
/// # Panics
///
/// Panics if the matrix dimensions are not compatible for matrix multiplication.
/// i.e.
///  - `acc.nrows() == lhs.nrows()`
///  - `acc.ncols() == rhs.ncols()`
///  - `lhs.ncols() == rhs.nrows()`
#[track_caller]
pub fn matmul<T: ComplexField>(
    acc: MatMut<'_, T>,
    lhs: MatRef<'_, T>,
    rhs: MatRef<'_, T>,
    alpha: Option<T>,
    beta: T,
    parallelism: Parallelism,
) {
    assert!(all(
        acc.nrows() == lhs.nrows(),
        acc.ncols() == rhs.ncols(),
        lhs.ncols() == rhs.nrows()
    ));

    let mut acc = acc;
    let m = acc.nrows();
    let n = acc.ncols();
    let k = lhs.ncols();

    if m == 0 || n == 0 {
        return;
    }

    if k == 0 {
        match alpha {
            Some(alpha) => acc.for_each(|x| *x = alpha * *x),
            None => acc.for_each(|x| *x = T::zero()),
        }
        return;
    }

    dispatch_gemm!(f32, acc, lhs, rhs, alpha, beta, parallelism);
    dispatch_gemm!(f64, acc, lhs, rhs, alpha, beta, parallelism);
    dispatch_gemm!(c32, acc, lhs, rhs, alpha, beta, parallelism);
    dispatch_gemm!(c64, acc, lhs, rhs, alpha, beta, parallelism);

    matmul_fallback(acc, lhs, rhs, alpha, beta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TiledMat;
    use assert_approx_eq::assert_approx_eq;
    use std::assert;
    use rand::random;

    fn dense<T: ComplexField>(m: usize, n: usize, f: impl FnMut(usize, usize) -> T) -> TiledMat<T> {
        TiledMat::from_fn(m, n, m.max(1), n.max(1), f)
    }

    #[test]
    fn matmul_matches_naive() {
        for (m, n, k) in [(1, 1, 1), (5, 3, 7), (16, 9, 1), (33, 17, 12)] {
            let lhs = dense(m, k, |_, _| random::<f64>());
            let rhs = dense(k, n, |_, _| random::<f64>());
            let init = dense(m, n, |_, _| random::<f64>());

            let mut acc = init.clone();
            matmul(
                acc.tile_mut(0, 0),
                lhs.tile(0, 0),
                rhs.tile(0, 0),
                Some(1.0),
                -2.0,
                Parallelism::None,
            );

            for i in 0..m {
                for j in 0..n {
                    let mut expected = init.read(i, j);
                    for depth in 0..k {
                        expected -= 2.0 * lhs.read(i, depth) * rhs.read(depth, j);
                    }
                    assert_approx_eq!(acc.read(i, j), expected);
                }
            }
        }
    }

    #[test]
    fn matmul_complex_rank_one() {
        let m = 6;
        let n = 4;
        let lhs = dense(m, 1, |i, _| c64 {
            re: i as f64,
            im: 1.0,
        });
        let rhs = dense(1, n, |_, j| c64 {
            re: 1.0,
            im: -(j as f64),
        });
        let mut acc = dense(m, n, |_, _| c64::zero());

        matmul(
            acc.tile_mut(0, 0),
            lhs.tile(0, 0),
            rhs.tile(0, 0),
            None,
            c64::one(),
            Parallelism::Rayon(2),
        );

        for i in 0..m {
            for j in 0..n {
                let expected = lhs.read(i, 0) * rhs.read(0, j);
                let got = acc.read(i, j);
                assert_approx_eq!(got.re, expected.re);
                assert_approx_eq!(got.im, expected.im);
            }
        }
    }
}
