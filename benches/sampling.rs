use criterion::*;
use ndarray::Array3;
use thermal_probe::{
    band::select_best_band, raster::BandStack, EngineConfig, InMemoryRaster, SamplingMode,
    ThermalEngine,
};

pub struct Samples<T>(Vec<T>);
impl<T> Samples<T> {
    pub fn sampler<'a>(&'a self) -> impl FnMut() -> &'a T {
        let mut curr = 0;
        move || {
            let ret = curr;
            curr += 1;
            curr %= self.0.len();
            &self.0[ret]
        }
    }
    pub fn from_fn<F: FnMut() -> T>(size: usize, mut proc: F) -> Self {
        Self((0..size).map(|_| proc()).collect())
    }
}

/// Warm surface with a sprinkle of sentinels and hot spots.
fn synthetic(bands: usize, size: usize) -> Array3<f64> {
    Array3::from_shape_fn((bands, size, size), |(b, r, c)| {
        match (r * 31 + c * 17 + b * 7) % 97 {
            0 => -9999.,
            1 => 85.,
            n => 15. + b as f64 + (n % 20) as f64,
        }
    })
}

/// Deterministic pixel positions spread over the raster.
fn pixels(size: usize) -> Samples<(usize, usize)> {
    let mut state = 1usize;
    Samples::from_fn(64, || {
        state = (state * 1103515245 + 12345) % (1 << 31);
        (state % size, (state / size) % size)
    })
}

fn sampling(c: &mut Criterion) {
    c.bench_function("select_best_band", |b| {
        let raster = InMemoryRaster::new(synthetic(8, 512)).with_nodata(Some(-9999.));
        let stack = BandStack::from_source(&raster).unwrap();
        b.iter(|| select_best_band(black_box(&stack)))
    });

    for &mode in &[SamplingMode::Neighborhood, SamplingMode::Pixel] {
        c.bench_function(&format!("sample_{}", mode), |b| {
            let raster = InMemoryRaster::new(synthetic(1, 2048)).with_nodata(Some(-9999.));
            let config = EngineConfig {
                sampling_mode: mode,
                ..Default::default()
            };
            let mut engine = ThermalEngine::open(raster, config).unwrap();
            let pixels = pixels(2048);
            let mut next = pixels.sampler();
            b.iter(|| {
                let &(row, col) = next();
                engine.sample(row, col)
            })
        });
    }

    c.bench_function("precompute", |b| {
        let raster = InMemoryRaster::new(synthetic(2, 2048)).with_nodata(Some(-9999.));
        let config = EngineConfig {
            auto_select_band: false,
            ..Default::default()
        };
        let mut engine = ThermalEngine::open(raster, config).unwrap();
        b.iter(|| {
            // alternate bands so every iteration starts cold
            engine.load_band(1 - engine.active_band());
            engine.precompute();
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = sampling
}

criterion_main!(benches);
