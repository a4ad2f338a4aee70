use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
// For generating synthetic data when no csv files are given
use rand::{rngs::SmallRng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use knn_classify::dataset::{load_labeled_csv, make_centers, sample_clusters, CsvOptions};
use knn_classify::{Error, Knn, Matrix, Result};

/// Brute-force nearest-neighbour classification of a labeled test set
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Training csv: class label, then features. Synthetic data is used when omitted
    #[arg(long, requires = "test")]
    train: Option<PathBuf>,

    /// Test csv, same layout as the training file
    #[arg(long, requires = "train")]
    test: Option<PathBuf>,

    /// Number of neighbours consulted with --vote
    #[arg(short, default_value_t = 1)]
    k: usize,

    /// Take the plurality label of the k nearest neighbours instead of the single nearest
    #[arg(long)]
    vote: bool,

    /// Load at most this many training examples
    #[arg(long)]
    max_train: Option<usize>,

    /// Load at most this many test examples
    #[arg(long)]
    max_test: Option<usize>,

    /// Divide every feature by this value (255 for MNIST)
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// The csv files start with a header line
    #[arg(long)]
    has_headers: bool,

    /// Queries per distance matrix; bounds memory at (training examples x batch size) floats
    #[arg(long, default_value_t = 1024)]
    batch_size: usize,

    /// Synthetic data: number of classes
    #[arg(long, default_value_t = 10)]
    classes: usize,

    /// Synthetic data: dimensionality
    #[arg(long, default_value_t = 32)]
    dim: usize,

    /// Synthetic data: training examples per class
    #[arg(long, default_value_t = 500)]
    per_class: usize,

    /// Synthetic data: test examples per class
    #[arg(long, default_value_t = 100)]
    test_per_class: usize,

    /// Synthetic data: maximum offset of each component from its class center
    #[arg(long, default_value_t = 8.0)]
    spread: f32,

    /// Synthetic data: RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence when set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

type Split = (Matrix, Vec<usize>);

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Load or generate the dataset
    let now = Instant::now();
    let ((train_x, train_y), (test_x, test_y)) = load_data(&args)?;
    info!(
        "Loaded {} training and {} test examples of dimension {} [{}ms]",
        train_x.rows(),
        test_x.rows(),
        train_x.cols(),
        now.elapsed().as_millis()
    );
    if test_x.rows() == 0 {
        return Err(Error::EmptyInput("test set has no examples"));
    }

    // Set up the model, which precomputes the reference norms
    let now = Instant::now();
    let model = Knn::new(train_x, train_y, args.k)?;
    info!("Initialized model with k = {} [{}ms]", model.k(), now.elapsed().as_millis());

    // Classify the test data batch by batch and compute accuracy
    let now = Instant::now();
    let batch_size = args.batch_size.max(1);
    let mut correct = 0;
    for start in (0..test_x.rows()).step_by(batch_size) {
        let queries = test_x.row_range(start, start.saturating_add(batch_size));
        let predicted = if args.vote {
            model.classify_voting(&queries)?
        } else {
            model.classify(&queries)?
        };
        correct += predicted
            .iter()
            .zip(&test_y[start..])
            .filter(|(guess, actual)| guess == actual)
            .count();
        debug!(start, queries = queries.rows(), correct, "classified batch");
    }
    let acc = correct as f64 / test_x.rows() as f64;
    info!(
        "Done - Accuracy = {} ({}/{}) [{}ms]",
        acc,
        correct,
        test_x.rows(),
        now.elapsed().as_millis()
    );
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_data(args: &Args) -> Result<(Split, Split)> {
    match (&args.train, &args.test) {
        (Some(train_path), Some(test_path)) => {
            let mut options = CsvOptions {
                has_headers: args.has_headers,
                max_examples: args.max_train.unwrap_or(usize::MAX),
                scale: args.scale,
            };
            let train = load_labeled_csv(train_path, &options)?;
            options.max_examples = args.max_test.unwrap_or(usize::MAX);
            let test = load_labeled_csv(test_path, &options)?;
            if test.0.cols() != train.0.cols() {
                return Err(Error::ShapeMismatch {
                    what: "test file feature count",
                    expected: train.0.cols(),
                    got: test.0.cols(),
                });
            }
            Ok((train, test))
        }
        _ => {
            // Train and test share the same class centers
            let mut rng = SmallRng::seed_from_u64(args.seed);
            let centers = make_centers(args.classes, args.dim, &mut rng);
            let train = sample_clusters(&centers, args.per_class, args.spread, &mut rng);
            let test = sample_clusters(&centers, args.test_per_class, args.spread, &mut rng);
            Ok((train, test))
        }
    }
}
