use std::io::Read;
use std::path::Path;

use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

// Half-width of the cube that synthetic class centers are drawn from
const CENTER_RANGE: f32 = 10.0;

#[derive(Clone, Debug)]
pub struct CsvOptions {
    // Skip the first line of the file
    pub has_headers: bool,
    // Stop after this many records
    pub max_examples: usize,
    // Every feature is divided by this value (255 for MNIST pixels)
    pub scale: f32,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            has_headers: false,
            max_examples: usize::MAX,
            scale: 1.0,
        }
    }
}

// Load labeled examples from a csv file.
// Returns a tuple of (features, labels)
// The expected format is:
// - One example per row
// - Each row starts with an integer class label
// - The rest of the row holds the numeric features, the same number in every row
pub fn load_labeled_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<(Matrix, Vec<usize>)> {
    let path = path.as_ref();
    let reader = builder(options).from_path(path)?;
    let (features, labels) = read_records(reader, options)?;
    debug!(
        path = %path.display(),
        examples = labels.len(),
        dimension = features.cols(),
        "loaded labeled csv"
    );
    Ok((features, labels))
}

// Same as load_labeled_csv, for any reader
pub fn read_labeled_csv(input: impl Read, options: &CsvOptions) -> Result<(Matrix, Vec<usize>)> {
    read_records(builder(options).from_reader(input), options)
}

fn builder(options: &CsvOptions) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(options.has_headers)
        // Row lengths are checked below so the error names the offending record
        .flexible(true);
    builder
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    options: &CsvOptions,
) -> Result<(Matrix, Vec<usize>)> {
    // Features are accumulated row-major, straight into the matrix storage
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut width = None;

    for (row, result) in reader.records().take(options.max_examples).enumerate() {
        let record = result?;
        let parse_error = |message: String| Error::Parse {
            record: row + 1,
            message,
        };

        let label = record
            .get(0)
            .unwrap_or_default()
            .trim()
            .parse::<usize>()
            .map_err(|e| parse_error(format!("bad label: {}", e)))?;

        let start = features.len();
        for field in record.iter().skip(1) {
            let value = field
                .trim()
                .parse::<f32>()
                .map_err(|e| parse_error(format!("bad feature {:?}: {}", field, e)))?;
            features.push(value / options.scale);
        }

        let got = features.len() - start;
        match width {
            None => width = Some(got),
            Some(expected) if expected != got => {
                return Err(Error::RaggedRows { row, expected, got })
            }
            Some(_) => {}
        }
        labels.push(label);
    }

    let width = width.ok_or(Error::EmptyInput("no records in csv input"))?;
    let features = Matrix::from_vec(labels.len(), width, features)?;
    Ok((features, labels))
}

// Random class centers, one row per class, uniform in [-CENTER_RANGE, CENTER_RANGE)
pub fn make_centers(n_classes: usize, dimension: usize, rng: &mut impl Rng) -> Matrix {
    Matrix::from_fn(n_classes, dimension, |_, _| {
        rng.gen_range(-CENTER_RANGE..CENTER_RANGE)
    })
}

// Sample per_class points around each center, each component offset by up to +/- spread.
// Classes are interleaved: example i belongs to class i % n_classes.
pub fn sample_clusters(
    centers: &Matrix,
    per_class: usize,
    spread: f32,
    rng: &mut impl Rng,
) -> (Matrix, Vec<usize>) {
    let n_classes = centers.rows();
    let n_examples = n_classes * per_class;
    let features = Matrix::from_fn(n_examples, centers.cols(), |i, j| {
        let noise = if spread > 0.0 {
            rng.gen_range(-spread..spread)
        } else {
            0.0
        };
        centers.get(i % n_classes, j) + noise
    });
    let labels = (0..n_examples).map(|i| i % n_classes).collect();
    (features, labels)
}
