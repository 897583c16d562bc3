//! `tile-core` module.
//!
//! This crate contains the building blocks used by the tile kernels:
//! - scalar field traits ([`ComplexField`], [`RealField`]) for `f32`, `f64`, [`c32`] and [`c64`],
//! - strided matrix views ([`MatRef`], [`MatMut`]),
//! - tiled matrix storage and addressing ([`tile::TiledMat`], [`tile::TileColMut`]),
//! - matrix multiplication, unit triangular solve and row/column interchange routines,
//! - the rendezvous abstraction shared by a team of cooperating workers ([`barrier`]).

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

use core::{
    fmt::Debug,
    marker::PhantomData,
    ops::{Add, Div, Mul, Neg, Sub},
    ptr::NonNull,
};
use equator::{assert, debug_assert};
use reborrow::*;

/// Complex floating point number type, where the real and imaginary parts each occupy 32 bits.
pub use gemm::c32;
/// Complex floating point number type, where the real and imaginary parts each occupy 64 bits.
pub use gemm::c64;

pub use reborrow;

pub mod barrier;
pub mod mul;
pub mod permutation;
pub mod solve;
pub mod tile;

/// Parallelism strategy that can be passed to most of the routines in the library.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// No parallelism.
    ///
    /// The code is executed sequentially on the same thread that calls a function
    /// and passes this argument.
    None,
    /// Rayon parallelism.
    ///
    /// The contained value represents a hint about the number of threads an implementation should
    /// use.
    ///
    /// A value of `0` treated as equivalent to `rayon::current_num_threads()`.
    Rayon(usize),
}

#[inline]
#[doc(hidden)]
pub fn parallelism_degree(parallelism: Parallelism) -> usize {
    match parallelism {
        Parallelism::None => 1,
        Parallelism::Rayon(0) => rayon::current_num_threads(),
        Parallelism::Rayon(n_threads) => n_threads,
    }
}

/// Trait that describes a complex number field.
///
/// Real numbers can also be seen as complex numbers, where the imaginary part is always zero.
pub trait ComplexField:
    Copy
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + Debug
    + 'static
{
    type Real: RealField;

    /// Returns the real and imaginary part.
    fn into_real_imag(self) -> (Self::Real, Self::Real);

    /// Returns the value representing `0.0`.
    fn zero() -> Self;
    /// Returns the value representing `1.0`.
    fn one() -> Self;

    /// Returns the inverse of the number.
    fn inv(self) -> Self;

    /// Returns `|re| + |im|`, the magnitude used for pivot selection.
    #[inline(always)]
    fn abs1(self) -> Self::Real {
        let (re, im) = self.into_real_imag();
        re.abs() + im.abs()
    }

    /// Returns the modulus of the number.
    fn abs(self) -> Self::Real;
}

/// Trait that describes a real number field.
pub trait RealField: ComplexField<Real = Self> + PartialOrd {
    /// Safe minimum: the smallest value such that its reciprocal does not overflow.
    fn sfmin() -> Self;
}

macro_rules! impl_real {
    ($real: ty) => {
        impl RealField for $real {
            #[inline]
            fn sfmin() -> Self {
                let sfmin = <$real>::MIN_POSITIVE;
                let small = 1.0 / <$real>::MAX;
                if small >= sfmin {
                    // rounding may turn 1/small into an overflow otherwise
                    small * (1.0 + <$real>::EPSILON)
                } else {
                    sfmin
                }
            }
        }

        impl ComplexField for $real {
            type Real = $real;

            #[inline(always)]
            fn into_real_imag(self) -> (Self::Real, Self::Real) {
                (self, 0.0)
            }

            #[inline(always)]
            fn zero() -> Self {
                0.0
            }

            #[inline(always)]
            fn one() -> Self {
                1.0
            }

            #[inline(always)]
            fn inv(self) -> Self {
                1.0 / self
            }

            #[inline(always)]
            fn abs1(self) -> Self::Real {
                <$real>::abs(self)
            }

            #[inline(always)]
            fn abs(self) -> Self::Real {
                <$real>::abs(self)
            }
        }
    };
}

macro_rules! impl_complex {
    ($cplx: ty, $real: ty) => {
        impl ComplexField for $cplx {
            type Real = $real;

            #[inline(always)]
            fn into_real_imag(self) -> (Self::Real, Self::Real) {
                (self.re, self.im)
            }

            #[inline(always)]
            fn zero() -> Self {
                Self { re: 0.0, im: 0.0 }
            }

            #[inline(always)]
            fn one() -> Self {
                Self { re: 1.0, im: 0.0 }
            }

            #[inline(always)]
            fn inv(self) -> Self {
                1.0 / self
            }

            #[inline(always)]
            fn abs(self) -> Self::Real {
                self.re.hypot(self.im)
            }
        }
    };
}

impl_real!(f32);
impl_real!(f64);
impl_complex!(c32, f32);
impl_complex!(c64, f64);

#[cfg(feature = "perf-warn")]
#[macro_export]
#[doc(hidden)]
macro_rules! __perf_warn {
    ($name: ident) => {{
        #[inline(always)]
        #[allow(non_snake_case)]
        fn $name() -> &'static ::core::sync::atomic::AtomicBool {
            static $name: ::core::sync::atomic::AtomicBool =
                ::core::sync::atomic::AtomicBool::new(false);
            &$name
        }
        ::core::matches!(
            $name().compare_exchange(
                false,
                true,
                ::core::sync::atomic::Ordering::Relaxed,
                ::core::sync::atomic::Ordering::Relaxed,
            ),
            Ok(_)
        )
    }};
}

struct MatrixSliceBase<T> {
    ptr: NonNull<T>,
    nrows: usize,
    ncols: usize,
    row_stride: isize,
    col_stride: isize,
}

impl<T> Copy for MatrixSliceBase<T> {}
impl<T> Clone for MatrixSliceBase<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

/// Matrix view with general row and column strides.
pub struct MatRef<'a, T> {
    base: MatrixSliceBase<T>,
    _marker: PhantomData<&'a T>,
}

/// Mutable matrix view with general row and column strides.
///
/// For usage examples, see [`MatRef`].
pub struct MatMut<'a, T> {
    base: MatrixSliceBase<T>,
    _marker: PhantomData<&'a mut T>,
}

unsafe impl<'a, T: Sync> Sync for MatRef<'a, T> {}
unsafe impl<'a, T: Sync> Send for MatRef<'a, T> {}
unsafe impl<'a, T: Sync> Sync for MatMut<'a, T> {}
unsafe impl<'a, T: Send> Send for MatMut<'a, T> {}

impl<'a, T> Copy for MatRef<'a, T> {}
impl<'a, T> Clone for MatRef<'a, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for MatRef<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        *self
    }
}
impl<'b, 'a, T> ReborrowMut<'b> for MatRef<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for MatMut<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        Self::Target {
            base: self.base,
            _marker: PhantomData,
        }
    }
}
impl<'b, 'a, T> ReborrowMut<'b> for MatMut<'a, T> {
    type Target = MatMut<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        Self::Target {
            base: self.base,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> MatRef<'a, T> {
    /// Returns a matrix slice from the given arguments.
    /// `ptr`: pointer to the first element of the matrix.
    /// `nrows`: number of rows of the matrix.
    /// `ncols`: number of columns of the matrix.
    /// `row_stride`: offset between the first elements of two successive rows in the matrix.
    /// `col_stride`: offset between the first elements of two successive columns in the matrix.
    ///
    /// # Safety
    ///
    /// `ptr` must be non null and properly aligned for type `T`.
    /// For each `i < nrows` and `j < ncols`,
    /// `ptr.offset(i as isize * row_stride + j as isize * col_stride)` must point to a valid
    /// initialized object of type `T`, unless memory pointing to that address is never accessed.
    /// The referenced memory must not be mutated during the lifetime `'a`.
    ///
    /// # Example
    ///
    /// ```
    /// use tile_core::MatRef;
    ///
    /// let nan = f64::NAN;
    /// let data = vec![0.0, 1.0, nan, 2.0, 3.0, nan, 4.0, 5.0];
    ///
    /// let m = unsafe { MatRef::from_raw_parts(data.as_ptr(), 2, 3, 1, 3) };
    ///
    /// assert_eq!(m.nrows(), 2);
    /// assert_eq!(m.ncols(), 3);
    /// assert_eq!(m.read(1, 0), 1.0);
    /// assert_eq!(m.read(0, 2), 4.0);
    /// ```
    #[inline]
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            base: MatrixSliceBase::<T> {
                ptr: NonNull::new_unchecked(ptr as *mut T),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            _marker: PhantomData,
        }
    }

    /// Returns a pointer to the first (top left) element of the matrix.
    #[inline]
    pub fn as_ptr(self) -> *const T {
        self.base.ptr.as_ptr()
    }

    /// Returns the number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.base.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.base.ncols
    }

    /// Returns the offset between the first elements of two successive rows in the matrix.
    #[inline]
    pub fn row_stride(&self) -> isize {
        self.base.row_stride
    }

    /// Returns the offset between the first elements of two successive columns in the matrix.
    #[inline]
    pub fn col_stride(&self) -> isize {
        self.base.col_stride
    }

    /// Returns a pointer to the element at position (i, j) in the matrix.
    #[inline]
    pub fn ptr_at(self, i: usize, j: usize) -> *const T {
        self.base
            .ptr
            .as_ptr()
            .wrapping_offset(i as isize * self.row_stride())
            .wrapping_offset(j as isize * self.col_stride())
    }

    /// Reads the value of the element at position (i, j), with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i < self.nrows()` and `j < self.ncols()`.
    #[inline(always)]
    pub unsafe fn read_unchecked(self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        debug_assert!(all(i < self.nrows(), j < self.ncols()));
        *self.ptr_at(i, j)
    }

    /// Reads the value of the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of bounds.
    #[track_caller]
    #[inline]
    pub fn read(self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        assert!(all(i < self.nrows(), j < self.ncols()));
        unsafe { self.read_unchecked(i, j) }
    }

    /// Returns a view over a submatrix starting at position (i, j), with dimensions
    /// `(nrows, ncols)`, with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i + nrows <= self.nrows()` and `j + ncols <= self.ncols()`.
    #[inline]
    pub unsafe fn submatrix_unchecked(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        debug_assert!(all(i <= self.nrows(), j <= self.ncols()));
        debug_assert!(all(nrows <= self.nrows() - i, ncols <= self.ncols() - j));
        Self::from_raw_parts(
            self.ptr_at(i, j),
            nrows,
            ncols,
            self.row_stride(),
            self.col_stride(),
        )
    }

    /// Returns a view over a submatrix starting at position (i, j), with dimensions
    /// `(nrows, ncols)`.
    ///
    /// # Panics
    ///
    /// Panics if the submatrix does not fit inside the matrix.
    #[track_caller]
    #[inline]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        assert!(all(i <= self.nrows(), j <= self.ncols()));
        assert!(all(nrows <= self.nrows() - i, ncols <= self.ncols() - j));
        unsafe { self.submatrix_unchecked(i, j, nrows, ncols) }
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    ///
    /// # Panics
    ///
    /// Requires that `i <= self.nrows()` and `j <= self.ncols()`.
    #[track_caller]
    #[inline]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        assert!(all(i <= self.nrows(), j <= self.ncols()));
        let m = self.nrows();
        let n = self.ncols();
        unsafe {
            (
                self.submatrix_unchecked(0, 0, i, j),
                self.submatrix_unchecked(0, j, i, n - j),
                self.submatrix_unchecked(i, 0, m - i, j),
                self.submatrix_unchecked(i, j, m - i, n - j),
            )
        }
    }
}

impl<'a, T> MatMut<'a, T> {
    /// Returns a mutable matrix slice from the given arguments.
    /// `ptr`: pointer to the first element of the matrix.
    /// `nrows`: number of rows of the matrix.
    /// `ncols`: number of columns of the matrix.
    /// `row_stride`: offset between the first elements of two successive rows in the matrix.
    /// `col_stride`: offset between the first elements of two successive columns in the matrix.
    ///
    /// # Safety
    ///
    /// `ptr` must be non null and properly aligned for type `T`.
    /// For each `i < nrows` and `j < ncols`,
    /// `ptr.offset(i as isize * row_stride + j as isize * col_stride)` must point to a valid
    /// initialized object of type `T`, unless memory pointing to that address is never read.
    /// Additionally, when `(i, j) != (0, 0)`, this pointer is never equal to `ptr` (no self
    /// aliasing).
    /// The elements accessed through the view must not be accessed concurrently through another
    /// pointer during the lifetime `'a`.
    #[inline]
    pub unsafe fn from_raw_parts(
        ptr: *mut T,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            base: MatrixSliceBase::<T> {
                ptr: NonNull::new_unchecked(ptr),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            _marker: PhantomData,
        }
    }

    /// Returns a mutable pointer to the first (top left) element of the matrix.
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        self.base.ptr.as_ptr()
    }

    /// Returns the number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.base.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.base.ncols
    }

    /// Returns the offset between the first elements of two successive rows in the matrix.
    #[inline]
    pub fn row_stride(&self) -> isize {
        self.base.row_stride
    }

    /// Returns the offset between the first elements of two successive columns in the matrix.
    #[inline]
    pub fn col_stride(&self) -> isize {
        self.base.col_stride
    }

    /// Returns a mutable pointer to the element at position (i, j) in the matrix.
    #[inline]
    pub fn ptr_at(self, i: usize, j: usize) -> *mut T {
        self.base
            .ptr
            .as_ptr()
            .wrapping_offset(i as isize * self.row_stride())
            .wrapping_offset(j as isize * self.col_stride())
    }

    /// Converts the view into an immutable one.
    #[inline]
    pub fn into_const(self) -> MatRef<'a, T> {
        MatRef {
            base: self.base,
            _marker: PhantomData,
        }
    }

    /// Reads the value of the element at position (i, j), with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i < self.nrows()` and `j < self.ncols()`.
    #[inline(always)]
    pub unsafe fn read_unchecked(&self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        self.rb().read_unchecked(i, j)
    }

    /// Reads the value of the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of bounds.
    #[track_caller]
    #[inline]
    pub fn read(&self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        self.rb().read(i, j)
    }

    /// Writes `value` to the element at position (i, j), with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i < self.nrows()` and `j < self.ncols()`.
    #[inline(always)]
    pub unsafe fn write_unchecked(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(all(i < self.nrows(), j < self.ncols()));
        *self.rb_mut().ptr_at(i, j) = value;
    }

    /// Writes `value` to the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of bounds.
    #[track_caller]
    #[inline]
    pub fn write(&mut self, i: usize, j: usize, value: T) {
        assert!(all(i < self.nrows(), j < self.ncols()));
        unsafe { self.write_unchecked(i, j, value) }
    }

    /// Returns a view over a submatrix starting at position (i, j), with dimensions
    /// `(nrows, ncols)`, with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i + nrows <= self.nrows()` and `j + ncols <= self.ncols()`.
    #[inline]
    pub unsafe fn submatrix_unchecked(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        debug_assert!(all(i <= self.nrows(), j <= self.ncols()));
        debug_assert!(all(nrows <= self.nrows() - i, ncols <= self.ncols() - j));
        let rs = self.row_stride();
        let cs = self.col_stride();
        Self::from_raw_parts(self.ptr_at(i, j), nrows, ncols, rs, cs)
    }

    /// Returns a view over a submatrix starting at position (i, j), with dimensions
    /// `(nrows, ncols)`.
    ///
    /// # Panics
    ///
    /// Panics if the submatrix does not fit inside the matrix.
    #[track_caller]
    #[inline]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        assert!(all(i <= self.nrows(), j <= self.ncols()));
        assert!(all(nrows <= self.nrows() - i, ncols <= self.ncols() - j));
        unsafe { self.submatrix_unchecked(i, j, nrows, ncols) }
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    ///
    /// # Panics
    ///
    /// Requires that `i <= self.nrows()` and `j <= self.ncols()`.
    #[track_caller]
    #[inline]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        assert!(all(i <= self.nrows(), j <= self.ncols()));
        let m = self.nrows();
        let n = self.ncols();
        // SAFETY: the four parts are disjoint
        unsafe {
            let rs = self.row_stride();
            let cs = self.col_stride();
            let ptr = self.as_ptr();
            let at = |i: usize, j: usize| {
                ptr.wrapping_offset(i as isize * rs)
                    .wrapping_offset(j as isize * cs)
            };
            (
                Self::from_raw_parts(at(0, 0), i, j, rs, cs),
                Self::from_raw_parts(at(0, j), i, n - j, rs, cs),
                Self::from_raw_parts(at(i, 0), m - i, j, rs, cs),
                Self::from_raw_parts(at(i, j), m - i, n - j, rs, cs),
            )
        }
    }

    /// Calls `f` on every element of the matrix, column by column.
    #[inline]
    pub fn for_each(mut self, mut f: impl FnMut(&mut T)) {
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                unsafe { f(&mut *self.rb_mut().ptr_at(i, j)) };
            }
        }
    }
}
