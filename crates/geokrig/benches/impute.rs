//! Benchmarks for the imputation pipeline

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::{Coord, Geometry, LineString, Polygon};
use geokrig::{ImputeParams, VariogramParams, impute};
use geokrig_core::{AttributeValue, Feature, GeoFrame};

fn square(x: f64, y: f64) -> Geometry<f64> {
    Geometry::Polygon(Polygon::new(
        LineString::from(vec![
            Coord { x, y },
            Coord { x: x + 3.0, y },
            Coord { x: x + 3.0, y: y + 3.0 },
            Coord { x, y: y + 3.0 },
            Coord { x, y },
        ]),
        vec![],
    ))
}

fn create_frame(n: usize) -> GeoFrame {
    let mut frame = GeoFrame::new();
    for i in 0..n {
        let x = (i as f64 * 37.7) % 500.0;
        let y = (i as f64 * 61.3) % 450.0;
        let drift = 1.0 + x / 40.0;
        let mut f = Feature::new(square(x, y)).with_property("drift", drift);
        if i % 7 == 3 {
            f.set_property("rate", AttributeValue::Null);
        } else {
            f.set_property("rate", 2.0 + 1.2 * drift + (y / 50.0).sin().abs());
        }
        frame.push(f);
    }
    frame
}

fn bench_impute(c: &mut Criterion) {
    let mut group = c.benchmark_group("impute");
    group.sample_size(10);

    for n in [25, 50, 100].iter() {
        let frame = create_frame(*n);
        let params = ImputeParams {
            iterations: 20,
            variogram: VariogramParams {
                n_lags: 8,
                ..Default::default()
            },
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| impute(black_box(&frame), "rate", "drift", None, &params).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_impute);
criterion_main!(benches);
