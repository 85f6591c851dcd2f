use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rankmf::algorithms::initializer::normal_matrix;
use rankmf::utils::metrics::mean_ndcg;
use rankmf::utils::train_test_split;
use rankmf::{init_tracing, Config, Gain, RankFixedMf, TrainingHistory};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    n_iter: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write the training history and scores as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ExperimentReport {
    config: Config,
    rating_shape: (usize, usize),
    history: TrainingHistory,
    train_ndcg: f64,
    test_ndcg: f64,
    random_baselines: Vec<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting rank-fixed factorization experiment");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    if let Some(n_iter) = args.n_iter {
        config.training.n_iter = n_iter;
    }
    if let Some(learning_rate) = args.learning_rate {
        config.training.learning_rate = learning_rate;
    }
    if let Some(seed) = args.seed {
        config.model.seed = Some(seed);
    }

    info!("Experiment configuration loaded: {:?}", config);

    let report = run_experiment(&config)?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

fn run_experiment(config: &Config) -> Result<ExperimentReport> {
    let experiment = &config.experiment;
    let mut rng = StdRng::seed_from_u64(experiment.data_seed);

    let ratings = Array2::from_shape_simple_fn((experiment.n_users, experiment.n_items), || {
        rng.gen_range(0..100) as f64 / 100.0
    });
    let meta = Array2::from_shape_simple_fn(
        (experiment.n_users, experiment.n_meta_features),
        || rng.gen_range(0..100) as f64,
    );

    let (ratings_train, ratings_test, meta_train, meta_test) =
        train_test_split(ratings.view(), meta.view(), experiment.test_size, &mut rng)?;
    let (train_ratings, valid_ratings, train_meta, valid_meta) = train_test_split(
        ratings_train.view(),
        meta_train.view(),
        experiment.valid_size,
        &mut rng,
    )?;

    let mut model = RankFixedMf::new(train_ratings, Some(valid_ratings), config.model.clone())?;
    model.train(
        train_meta.view(),
        Some(valid_meta.view()),
        config.training.n_iter,
        config.training.learning_rate,
    )?;

    let user_vecs = model.user_vecs()?;
    let item_vecs = model.item_vecs()?;
    let scores = user_vecs.dot(&item_vecs.t());
    let train_ndcg = mean_ndcg(model.ratings().view(), scores.view(), Gain::Exponential)?;

    info!("Rating matrix size: {:?}", model.ratings().dim());
    info!("Ranking loss and gradient result in NDCG: {:.6}", train_ndcg);

    let mut random_baselines = Vec::with_capacity(experiment.random_baselines);
    for trial in 0..experiment.random_baselines {
        let u = normal_matrix(user_vecs.nrows(), user_vecs.ncols(), 1.0, &mut rng)?;
        let v = normal_matrix(item_vecs.nrows(), item_vecs.ncols(), 1.0, &mut rng)?;
        let random_scores = u.dot(&v.t());
        let ndcg = mean_ndcg(model.ratings().view(), random_scores.view(), Gain::Exponential)?;
        info!("Trial {}: random U, V result in NDCG: {:.6}", trial, ndcg);
        random_baselines.push(ndcg);
    }

    let test_scores = model.predict_new(meta_test.view())?;
    let test_ndcg = mean_ndcg(ratings_test.view(), test_scores.view(), Gain::Exponential)?;
    info!("Held-out users ({}) NDCG: {:.6}", ratings_test.nrows(), test_ndcg);

    if let Some((iteration, score)) = model.history().best_valid() {
        info!("Best validation NDCG {:.6} at iteration {}", score, iteration);
    }

    Ok(ExperimentReport {
        config: config.clone(),
        rating_shape: model.ratings().dim(),
        history: model.history().clone(),
        train_ndcg,
        test_ndcg,
        random_baselines,
    })
}
