use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::random;

use tile_core::{
    mul::matmul, solve::solve_unit_lower_triangular_in_place, tile::TiledMat, Parallelism,
};

pub fn solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(2))
        .warm_up_time(Duration::from_secs(1));

    for n in [32, 64, 128, 256] {
        group.bench_function(&format!("st-solve-{n}"), |b| {
            let tri = TiledMat::from_fn(n, n, n, n, |i, j| if i == j { 1.0 } else { 0.0 });
            let mut rhs = TiledMat::<f64>::zeros(n, n, n, n);

            b.iter(|| {
                solve_unit_lower_triangular_in_place(
                    tri.tile(0, 0),
                    rhs.tile_mut(0, 0),
                    Parallelism::None,
                );
            })
        });
    }

    group.finish();
}

pub fn tile_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile-update");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(2))
        .warm_up_time(Duration::from_secs(1));

    for (mb, nb, kb) in [(64, 64, 8), (256, 128, 32), (512, 256, 64)] {
        group.bench_function(&format!("st-update-{mb}x{nb}x{kb}"), |b| {
            let lhs = TiledMat::from_fn(mb, kb, mb, kb, |_, _| random::<f64>());
            let rhs = TiledMat::from_fn(kb, nb, kb, nb, |_, _| random::<f64>());
            let mut dst = TiledMat::<f64>::zeros(mb, nb, mb, nb);

            b.iter(|| {
                matmul(
                    dst.tile_mut(0, 0),
                    lhs.tile(0, 0),
                    rhs.tile(0, 0),
                    Some(1.0),
                    -1.0,
                    Parallelism::None,
                );
            })
        });
    }

    group.finish();
}

criterion_group!(benches, solve, tile_update);
criterion_main!(benches);
