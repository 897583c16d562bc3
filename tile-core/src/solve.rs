//! Triangular solve module.

use crate::{mul::matmul, ComplexField, MatMut, MatRef, Parallelism};
use equator::assert;
use reborrow::*;

#[inline]
fn recursion_threshold() -> usize {
    16
}

unsafe fn solve_unit_lower_triangular_in_place_base_case<T: ComplexField>(
    tril: MatRef<'_, T>,
    mut rhs: MatMut<'_, T>,
) {
    let n = tril.nrows();
    for j in 0..rhs.ncols() {
        for k in 0..n {
            let xk = rhs.read_unchecked(k, j);
            for i in k + 1..n {
                let xi = rhs.read_unchecked(i, j);
                rhs.write_unchecked(i, j, xi - tril.read_unchecked(i, k) * xk);
            }
        }
    }
}

/// Computes the solution of `Op_lhs(triangular_lower) × X = rhs`, and stores the result in `rhs`.
///
/// `triangular_lower` is interpreted as a lower triangular matrix (diagonal included), with an
/// implicit unit diagonal. Its strictly upper triangular part and its diagonal are not accessed.
///
/// # Panics
///
///  - Panics if `triangular_lower` is not a square matrix.
///  - Panics if `rhs.nrows() != triangular_lower.ncols()`
#[track_caller]
pub fn solve_unit_lower_triangular_in_place<T: ComplexField>(
    triangular_lower: MatRef<'_, T>,
    rhs: MatMut<'_, T>,
    parallelism: Parallelism,
) {
    assert!(all(
        triangular_lower.nrows() == triangular_lower.ncols(),
        rhs.nrows() == triangular_lower.ncols()
    ));

    let mut rhs = rhs;
    let n = triangular_lower.nrows();
    if n == 0 || rhs.ncols() == 0 {
        return;
    }

    if n <= recursion_threshold() {
        // SAFETY: dimensions were checked above.
        unsafe { solve_unit_lower_triangular_in_place_base_case(triangular_lower, rhs) };
        return;
    }

    let bs = n / 2;
    let (tril_top_left, _, tril_bot_left, tril_bot_right) = triangular_lower.split_at(bs, bs);
    let (_, mut rhs_top, _, mut rhs_bot) = rhs.rb_mut().split_at(bs, 0);

    solve_unit_lower_triangular_in_place(tril_top_left, rhs_top.rb_mut(), parallelism);
    matmul(
        rhs_bot.rb_mut(),
        tril_bot_left,
        rhs_top.rb(),
        Some(T::one()),
        -T::one(),
        parallelism,
    );
    solve_unit_lower_triangular_in_place(tril_bot_right, rhs_bot, parallelism);
}
