use criterion::{black_box, criterion_group, criterion_main, Criterion};
use markova_hmm::kmeans::{initial_hmm, KMeansConfig, ScalarCentroid};
use markova_hmm::{BaumWelch, Computation, ForwardBackward, Hmm, OpdfDiscrete, OpdfGaussian};

fn random_symbols(n: usize, n_symbols: usize, seed: u64) -> Vec<usize> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) % n_symbols as u64) as usize
        })
        .collect()
}

fn random_reals(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            10.0 * (state >> 11) as f64 / (1u64 << 53) as f64
        })
        .collect()
}

fn discrete_hmm(n_states: usize, n_symbols: usize) -> Hmm<OpdfDiscrete> {
    let opdfs = (0..n_states)
        .map(|i| {
            let raw: Vec<f64> = (0..n_symbols).map(|k| 1.0 + ((i + k) % 3) as f64).collect();
            let s: f64 = raw.iter().sum();
            OpdfDiscrete::new(raw.into_iter().map(|p| p / s).collect()).unwrap()
        })
        .collect();
    Hmm::uniform(opdfs).unwrap()
}

fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_backward");

    let hmm = discrete_hmm(4, 6);
    let obs = random_symbols(1_000, 6, 42);

    for (name, computation) in [("scaled", Computation::Scaled), ("log", Computation::Log)] {
        group.bench_function(format!("1k_obs_4_states_{name}"), |b| {
            b.iter(|| ForwardBackward::compute(&hmm, black_box(&obs), computation))
        });
    }

    group.finish();
}

fn bench_baum_welch(c: &mut Criterion) {
    let mut group = c.benchmark_group("baum_welch");

    let hmm = discrete_hmm(4, 6);
    let corpus: Vec<Vec<usize>> = (0..20).map(|s| random_symbols(200, 6, s + 1)).collect();
    let learner = BaumWelch::with_iterations(1);

    group.bench_function("iterate_20x200_4_states", |b| {
        b.iter(|| learner.iterate(&hmm, black_box(&corpus)))
    });

    group.finish();
}

fn bench_kmeans_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_init");

    let corpus: Vec<Vec<f64>> = (0..10).map(|s| random_reals(500, s + 7)).collect();

    group.bench_function("5k_obs_3_states", |b| {
        b.iter(|| {
            initial_hmm::<_, ScalarCentroid, _>(
                3,
                black_box(&corpus),
                &OpdfGaussian::standard(),
                &KMeansConfig::default(),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_forward_backward, bench_baum_welch, bench_kmeans_init);
criterion_main!(benches);
