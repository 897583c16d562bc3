//! Row and column interchanges.

use crate::{tile::TiledMat, ComplexField, MatMut};
use equator::assert;
use reborrow::*;

/// Swaps the contents of two matrix views of the same dimensions, element by element.
///
/// # Panics
///
/// Panics if the dimensions of `a` and `b` differ.
#[track_caller]
#[inline]
pub fn swap<T>(a: MatMut<'_, T>, b: MatMut<'_, T>) {
    assert!(all(a.nrows() == b.nrows(), a.ncols() == b.ncols()));
    let mut a = a;
    let mut b = b;
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            unsafe {
                core::ptr::swap(a.rb_mut().ptr_at(i, j), b.rb_mut().ptr_at(i, j));
            }
        }
    }
}

/// Whether interchanges apply to rows or to columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    /// `ipiv` describes row interchanges.
    Rows,
    /// `ipiv` describes column interchanges.
    Cols,
}

/// Order in which the interchanges are applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// From `k1` up to `k2`.
    Forward,
    /// From `k2` down to `k1`, which undoes a forward application.
    Backward,
}

/// Applies the interchanges `ipiv[k1 - 1..k2]` to the whole tiled matrix.
///
/// `ipiv` uses 1-based indices: for each `i` in the range, row (or column) `i` is swapped with
/// row (or column) `ipiv[i] - 1`. `k1` and `k2` are 1-based and inclusive. An empty range
/// (`k1 > k2`) does nothing.
///
/// # Panics
///
/// Panics if `k1` is zero, if `k2` exceeds `ipiv.len()`, or if a pivot index points outside the
/// matrix.
#[track_caller]
pub fn geswp<T: ComplexField>(
    a: &mut TiledMat<T>,
    axis: Axis,
    k1: usize,
    k2: usize,
    ipiv: &[usize],
    direction: Direction,
) {
    assert!(all(k1 >= 1, k2 <= ipiv.len()));
    if k1 > k2 {
        return;
    }

    let mut apply = |idx: usize| {
        let p = ipiv[idx] - 1;
        if p == idx {
            return;
        }
        match axis {
            Axis::Rows => swap_full_rows(a, idx, p),
            Axis::Cols => swap_full_cols(a, idx, p),
        }
    };

    match direction {
        Direction::Forward => (k1 - 1..k2).for_each(&mut apply),
        Direction::Backward => (k1 - 1..k2).rev().for_each(&mut apply),
    }
}

#[track_caller]
fn swap_full_rows<T: ComplexField>(a: &mut TiledMat<T>, r1: usize, r2: usize) {
    assert!(all(r1 < a.nrows(), r2 < a.nrows()));
    for j in 0..a.tile_cols() {
        let col = a.tile_col_mut(j);
        let ncols = col.ncols();
        // SAFETY: `col` is the only handle over the tile-column, and `r1 != r2`.
        unsafe { col.swap_rows(r1, r2, 0..ncols) };
    }
}

#[track_caller]
fn swap_full_cols<T: ComplexField>(a: &mut TiledMat<T>, c1: usize, c2: usize) {
    assert!(all(c1 < a.ncols(), c2 < a.ncols()));
    let nb = a.nb();
    let (j1, l1) = (c1 / nb, c1 % nb);
    let (j2, l2) = (c2 / nb, c2 % nb);
    for i in 0..a.tile_rows() {
        let m = a.tile_nrows(i);
        let p1 = a.tile_mut(i, j1).submatrix(0, l1, m, 1).as_ptr();
        let p2 = a.tile_mut(i, j2).submatrix(0, l2, m, 1).as_ptr();
        // SAFETY: both columns lie inside `a`, and are distinct since `c1 != c2`.
        unsafe {
            swap(
                MatMut::from_raw_parts(p1, m, 1, 1, m as isize),
                MatMut::from_raw_parts(p2, m, 1, 1, m as isize),
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    fn sample() -> TiledMat<f64> {
        TiledMat::from_fn(7, 6, 3, 4, |i, j| (10 * i + j) as f64)
    }

    #[test]
    fn row_interchanges_forward_then_backward() {
        let mut a = sample();
        let ipiv = [3, 7, 3, 5];

        geswp(&mut a, Axis::Rows, 1, 4, &ipiv, Direction::Forward);

        // rows: 0 <-> 2, 1 <-> 6, 2 stays, 3 <-> 4
        let expected_rows = [2, 6, 0, 4, 3, 5, 1];
        for (i, &src) in expected_rows.iter().enumerate() {
            for j in 0..6 {
                assert!(a.read(i, j) == (10 * src + j) as f64);
            }
        }

        geswp(&mut a, Axis::Rows, 1, 4, &ipiv, Direction::Backward);
        let b = sample();
        for i in 0..7 {
            for j in 0..6 {
                assert!(a.read(i, j) == b.read(i, j));
            }
        }
    }

    #[test]
    fn column_interchanges_cross_tiles() {
        let mut a = sample();
        let ipiv = [6, 2];

        geswp(&mut a, Axis::Cols, 1, 2, &ipiv, Direction::Forward);

        for i in 0..7 {
            assert!(a.read(i, 0) == (10 * i + 5) as f64);
            assert!(a.read(i, 5) == (10 * i) as f64);
            assert!(a.read(i, 1) == (10 * i + 1) as f64);
        }
    }

    #[test]
    fn sub_range_only() {
        let mut a = sample();
        let ipiv = [2, 3, 4];

        geswp(&mut a, Axis::Rows, 2, 2, &ipiv, Direction::Forward);

        assert!(a.read(0, 0) == 0.0);
        assert!(a.read(1, 0) == 20.0);
        assert!(a.read(2, 0) == 10.0);
        assert!(a.read(3, 0) == 30.0);
    }
}
