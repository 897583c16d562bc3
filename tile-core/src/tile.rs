//! Tiled matrix storage and tile addressing.
//!
//! A [`TiledMat`] of dimensions `m × n` is split into tiles of nominal size `mb × nb`. Tile
//! `(i, j)` holds `min(mb, m - i·mb)` rows and `min(nb, n - j·nb)` columns, so the last tile-row
//! and tile-column may be smaller than nominal. Each tile is stored in column-major order with a
//! leading dimension equal to its number of rows, and tiles are laid out one tile-column after
//! the other.
//!
//! [`TileColMut`] is the addressing handle that kernels receive: it covers a single tile-column
//! and may be shared between the members of a worker team.

use crate::{permutation, ComplexField, MatMut, MatRef};
use core::{marker::PhantomData, ops::Range, ptr::NonNull};
use equator::{assert, debug_assert};

#[inline]
fn tile_count(len: usize, block: usize) -> usize {
    (len + block - 1) / block
}

#[inline]
fn tile_len(len: usize, block: usize, idx: usize) -> usize {
    Ord::min(block, len.saturating_sub(idx * block))
}

/// Owned matrix stored as a grid of tiles.
#[derive(Clone, Debug)]
pub struct TiledMat<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
    mb: usize,
    nb: usize,
}

impl<T: ComplexField> TiledMat<T> {
    /// Returns a new matrix filled with zeros.
    ///
    /// # Panics
    ///
    /// Panics if either tile dimension is zero.
    #[track_caller]
    pub fn zeros(nrows: usize, ncols: usize, mb: usize, nb: usize) -> Self {
        Self::from_fn(nrows, ncols, mb, nb, |_, _| T::zero())
    }

    /// Returns a new matrix whose element `(i, j)` is `f(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if either tile dimension is zero.
    #[track_caller]
    pub fn from_fn(
        nrows: usize,
        ncols: usize,
        mb: usize,
        nb: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Self {
        assert!(all(mb > 0, nb > 0));
        let mut mat = Self {
            data: vec![T::zero(); nrows * ncols],
            nrows,
            ncols,
            mb,
            nb,
        };
        for j in 0..ncols {
            for i in 0..nrows {
                mat.write(i, j, f(i, j));
            }
        }
        mat
    }

    /// Reads the element at position `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn read(&self, i: usize, j: usize) -> T {
        assert!(all(i < self.nrows, j < self.ncols));
        self.data[self.offset_of(i, j)]
    }

    /// Writes `value` at position `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn write(&mut self, i: usize, j: usize, value: T) {
        assert!(all(i < self.nrows, j < self.ncols));
        let offset = self.offset_of(i, j);
        self.data[offset] = value;
    }

    /// Returns a copy of the same values laid out with a different tile size.
    pub fn retile(&self, mb: usize, nb: usize) -> Self {
        Self::from_fn(self.nrows, self.ncols, mb, nb, |i, j| self.read(i, j))
    }
}

impl<T> TiledMat<T> {
    /// Number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Nominal number of rows of a tile.
    #[inline]
    pub fn mb(&self) -> usize {
        self.mb
    }

    /// Nominal number of columns of a tile.
    #[inline]
    pub fn nb(&self) -> usize {
        self.nb
    }

    /// Number of tile-rows.
    #[inline]
    pub fn tile_rows(&self) -> usize {
        tile_count(self.nrows, self.mb)
    }

    /// Number of tile-columns.
    #[inline]
    pub fn tile_cols(&self) -> usize {
        tile_count(self.ncols, self.nb)
    }

    /// Number of valid rows of the tiles in tile-row `i`.
    #[inline]
    pub fn tile_nrows(&self, i: usize) -> usize {
        tile_len(self.nrows, self.mb, i)
    }

    /// Number of valid columns of the tiles in tile-column `j`.
    #[inline]
    pub fn tile_ncols(&self, j: usize) -> usize {
        tile_len(self.ncols, self.nb, j)
    }

    #[inline]
    fn tile_offset(&self, i: usize, j: usize) -> usize {
        j * self.nb * self.nrows + i * self.mb * self.tile_ncols(j)
    }

    #[inline]
    fn offset_of(&self, i: usize, j: usize) -> usize {
        let (ti, li) = (i / self.mb, i % self.mb);
        let (tj, lj) = (j / self.nb, j % self.nb);
        self.tile_offset(ti, tj) + li + lj * self.tile_nrows(ti)
    }

    /// Returns a view over tile `(i, j)`.
    #[track_caller]
    pub fn tile(&self, i: usize, j: usize) -> MatRef<'_, T> {
        assert!(all(i < self.tile_rows(), j < self.tile_cols()));
        let m = self.tile_nrows(i);
        let n = self.tile_ncols(j);
        unsafe {
            MatRef::from_raw_parts(
                self.data.as_ptr().add(self.tile_offset(i, j)),
                m,
                n,
                1,
                m as isize,
            )
        }
    }

    /// Returns a mutable view over tile `(i, j)`.
    #[track_caller]
    pub fn tile_mut(&mut self, i: usize, j: usize) -> MatMut<'_, T> {
        assert!(all(i < self.tile_rows(), j < self.tile_cols()));
        let m = self.tile_nrows(i);
        let n = self.tile_ncols(j);
        let offset = self.tile_offset(i, j);
        unsafe {
            MatMut::from_raw_parts(
                self.data.as_mut_ptr().add(offset),
                m,
                n,
                1,
                m as isize,
            )
        }
    }

    /// Returns the addressing handle of tile-column `j`.
    ///
    /// `j` may be equal to the number of tile-columns when the matrix has no columns, in which
    /// case the handle covers an empty tile-column.
    #[track_caller]
    pub fn tile_col_mut(&mut self, j: usize) -> TileColMut<'_, T> {
        assert!(any(j < self.tile_cols(), j == 0));
        let ncols = self.tile_ncols(j);
        let offset = j * self.nb * self.nrows;
        TileColMut {
            ptr: unsafe { NonNull::new_unchecked(self.data.as_mut_ptr().wrapping_add(offset)) },
            nrows: self.nrows,
            ncols,
            mb: self.mb,
            _marker: PhantomData,
        }
    }
}

/// Addressing handle over one tile-column of a [`TiledMat`].
///
/// The handle is `Copy`, `Send` and `Sync` so that every member of a worker team can hold it at
/// the same time. Its accessors hand out possibly aliasing views, and are therefore `unsafe`:
/// callers must make sure that no element is written by one holder while another one reads or
/// writes it, unless the two accesses are ordered by a synchronization point.
pub struct TileColMut<'a, T> {
    ptr: NonNull<T>,
    nrows: usize,
    ncols: usize,
    mb: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Copy for TileColMut<'a, T> {}
impl<'a, T> Clone for TileColMut<'a, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

unsafe impl<'a, T: Send> Send for TileColMut<'a, T> {}
unsafe impl<'a, T: Send> Sync for TileColMut<'a, T> {}

impl<'a, T> core::fmt::Debug for TileColMut<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileColMut")
            .field("nrows", &self.nrows)
            .field("ncols", &self.ncols)
            .field("mb", &self.mb)
            .finish()
    }
}

impl<'a, T> TileColMut<'a, T> {
    /// Total number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of valid columns of the tile-column.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Nominal number of rows of a tile.
    #[inline]
    pub fn mb(&self) -> usize {
        self.mb
    }

    /// Number of tile-rows.
    #[inline]
    pub fn tile_rows(&self) -> usize {
        tile_count(self.nrows, self.mb)
    }

    /// Number of valid rows of tile-row `l`.
    #[inline]
    pub fn tile_nrows(&self, l: usize) -> usize {
        tile_len(self.nrows, self.mb, l)
    }

    /// Leading dimension of tile-row `l`.
    #[inline]
    pub fn tile_ld(&self, l: usize) -> usize {
        self.tile_nrows(l)
    }

    /// Base address of tile-row `l`.
    #[inline]
    pub fn tile_ptr(&self, l: usize) -> *mut T {
        self.ptr
            .as_ptr()
            .wrapping_add(l * self.mb * self.ncols)
    }

    /// Returns the tile-row holding global row `row`, and the position of the row inside it.
    #[inline]
    pub fn locate(&self, row: usize) -> (usize, usize) {
        (row / self.mb, row % self.mb)
    }

    /// Returns a mutable view over the whole tile-row `l`.
    ///
    /// # Safety
    ///
    /// `l` must be smaller than [`Self::tile_rows`], and the elements accessed through the view
    /// must not be accessed concurrently by another holder of the handle.
    #[inline]
    pub unsafe fn tile_mut(self, l: usize) -> MatMut<'a, T> {
        debug_assert!(l < self.tile_rows());
        let m = self.tile_nrows(l);
        MatMut::from_raw_parts(self.tile_ptr(l), m, self.ncols, 1, self.tile_ld(l) as isize)
    }

    /// Returns a view over the whole tile-row `l`.
    ///
    /// # Safety
    ///
    /// `l` must be smaller than [`Self::tile_rows`], and the elements read through the view must
    /// not be written concurrently by another holder of the handle.
    #[inline]
    pub unsafe fn tile(self, l: usize) -> MatRef<'a, T> {
        self.tile_mut(l).into_const()
    }

    /// Returns a mutable `1 × cols.len()` view over global row `row`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Self::tile_mut`], for the tile-row containing `row`.
    #[inline]
    pub unsafe fn row_mut(self, row: usize, cols: Range<usize>) -> MatMut<'a, T> {
        let (l, i) = self.locate(row);
        self.tile_mut(l)
            .submatrix_unchecked(i, cols.start, 1, cols.end - cols.start)
    }

    /// Swaps global rows `a` and `b`, restricted to the columns in `cols`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Self::tile_mut`], for the tile-rows containing `a` and `b`.
    #[inline]
    pub unsafe fn swap_rows(self, a: usize, b: usize, cols: Range<usize>) {
        debug_assert!(all(a < self.nrows, b < self.nrows, cols.end <= self.ncols));
        if a == b {
            return;
        }
        permutation::swap(self.row_mut(a, cols.clone()), self.row_mut(b, cols));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    #[test]
    fn boundary_tiles() {
        let a = TiledMat::from_fn(11, 7, 4, 3, |i, j| (i * 100 + j) as f64);
        assert!(all(a.tile_rows() == 3, a.tile_cols() == 3));
        assert!(all(a.tile_nrows(0) == 4, a.tile_nrows(2) == 3));
        assert!(all(a.tile_ncols(1) == 3, a.tile_ncols(2) == 1));

        for i in 0..11 {
            for j in 0..7 {
                assert!(a.read(i, j) == (i * 100 + j) as f64);
            }
        }

        let t = a.tile(2, 1);
        assert!(all(t.nrows() == 3, t.ncols() == 3));
        assert!(t.read(2, 0) == 1003.0);
        assert!(t.col_stride() == 3);
    }

    #[test]
    fn tile_col_addressing() {
        let mut a = TiledMat::from_fn(10, 5, 4, 5, |i, j| (i * 10 + j) as f64);
        let col = a.tile_col_mut(0);
        assert!(all(col.tile_rows() == 3, col.ncols() == 5));
        assert!(all(col.tile_ld(1) == 4, col.tile_ld(2) == 2));
        assert!(col.locate(9) == (2, 1));

        unsafe {
            assert!(col.tile(1).read(3, 2) == 72.0);
            col.swap_rows(1, 9, 1..4);
        }
        assert!(all(a.read(1, 0) == 10.0, a.read(1, 1) == 91.0, a.read(1, 3) == 93.0));
        assert!(all(a.read(9, 4) == 94.0, a.read(9, 2) == 12.0));
    }

    #[test]
    fn empty_matrix() {
        let mut a = TiledMat::<f64>::zeros(0, 0, 4, 4);
        assert!(all(a.tile_rows() == 0, a.tile_cols() == 0));
        let col = a.tile_col_mut(0);
        assert!(all(col.nrows() == 0, col.ncols() == 0, col.tile_rows() == 0));
    }
}
