use criterion::{black_box, criterion_group, criterion_main, Criterion};
use epw_comfort::{utci, ComfortEngine, ThermalInput, Units};

/// One input per hour of a year, with a daily and a seasonal temperature swing.
fn year_of_inputs() -> Vec<ThermalInput> {
    (0..8760)
        .map(|hour| {
            let day = (hour / 24) as f64;
            let seasonal = 15.0 * (day / 365.0 * std::f64::consts::TAU).sin();
            let daily = 5.0 * ((hour % 24) as f64 / 24.0 * std::f64::consts::TAU).sin();
            let tdb = 8.0 + seasonal + daily;
            ThermalInput::new(tdb, tdb - 3.0, 0.5 + (hour % 12) as f64, 40.0 + (hour % 50) as f64, Units::Si)
        })
        .collect()
}

fn bench_utci(c: &mut Criterion) {
    let inputs = year_of_inputs();
    let engine = ComfortEngine::default();
    c.bench_function("utci_year", |b| {
        b.iter(|| inputs.iter().map(|i| utci(black_box(i))).sum::<f64>())
    });
    c.bench_function("evaluate_year", |b| {
        b.iter(|| {
            inputs
                .iter()
                .map(|i| engine.evaluate(black_box(i)))
                .collect::<Vec<_>>()
        })
    });
}

criterion_group!(benches, bench_utci);
criterion_main!(benches);
