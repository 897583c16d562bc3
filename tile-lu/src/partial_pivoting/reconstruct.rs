use tile_core::{
    mul::matmul,
    permutation::{geswp, Axis, Direction},
    tile::TiledMat,
    ComplexField, Parallelism,
};

/// Computes the reconstructed matrix $P^\top L U$, given the LU factors and the interchanges
/// produced by [`super::compute::lu_in_place`], and returns it with the same tile size as
/// `lu_factors`.
///
/// # Panics
///
/// Panics if `ipiv.len() < min(m, n)`.
#[track_caller]
pub fn reconstruct<T: ComplexField>(lu_factors: &TiledMat<T>, ipiv: &[usize]) -> TiledMat<T> {
    let m = lu_factors.nrows();
    let n = lu_factors.ncols();
    let size = Ord::min(m, n);

    let l = TiledMat::from_fn(m, size, m.max(1), size.max(1), |i, j| {
        if i == j {
            T::one()
        } else if i > j {
            lu_factors.read(i, j)
        } else {
            T::zero()
        }
    });
    let u = TiledMat::from_fn(size, n, size.max(1), n.max(1), |i, j| {
        if i <= j {
            lu_factors.read(i, j)
        } else {
            T::zero()
        }
    });

    let mut dst = TiledMat::zeros(m, n, m.max(1), n.max(1));
    if size > 0 {
        matmul(
            dst.tile_mut(0, 0),
            l.tile(0, 0),
            u.tile(0, 0),
            None,
            T::one(),
            Parallelism::None,
        );
    }

    geswp(&mut dst, Axis::Rows, 1, size, ipiv, Direction::Backward);
    dst.retile(lu_factors.mb(), lu_factors.nb())
}
