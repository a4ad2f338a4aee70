use rayon::prelude::*;
use wide::f32x8;

use crate::error::{Error, Result};

// Width of the SIMD type used for inner products
const LANES: usize = 8;

// Reductions applied along each row, producing one value per row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Add,
    AddSquared,
    Max,
    Min,
}

// A dense, row-major matrix of f32 values.
// data.len() == rows * cols at all times.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::ShapeMismatch {
                what: "matrix data length",
                expected: rows * cols,
                got: data.len(),
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    // Fill a matrix entry by entry, in row-major order
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            data.extend((0..cols).map(|j| f(i, j)));
        }
        Matrix { data, rows, cols }
    }

    // Build a matrix from a list of equally long rows.
    // An empty list gives a 0x0 matrix.
    pub fn from_rows(rows: &[impl AsRef<[f32]>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(Error::RaggedRows {
                    row: i,
                    expected: cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            data,
            rows: rows.len(),
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    // Copy rows [start, end) into a new matrix, clamping end to the row count
    pub fn row_range(&self, start: usize, end: usize) -> Matrix {
        let end = end.min(self.rows);
        let start = start.min(end);
        Matrix {
            data: self.data[start * self.cols..end * self.cols].to_vec(),
            rows: end - start,
            cols: self.cols,
        }
    }

    // One value per row
    pub fn reduce_rows(&self, reduction: Reduction) -> Vec<f32> {
        (0..self.rows)
            .into_par_iter()
            .map(|i| {
                let row = self.row(i);
                match reduction {
                    Reduction::Add => row.iter().sum(),
                    Reduction::AddSquared => dot(row, row),
                    Reduction::Max => row.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                    Reduction::Min => row.iter().copied().fold(f32::INFINITY, f32::min),
                }
            })
            .collect()
    }

    // Computes factor * a * b^T, giving an (a.rows x b.rows) matrix.
    // Both operands are row-major, so every entry is a dot product of two contiguous rows.
    pub fn prod_transposed(a: &Matrix, b: &Matrix, factor: f32) -> Result<Matrix> {
        if a.cols != b.cols {
            return Err(Error::ShapeMismatch {
                what: "inner dimension of product",
                expected: a.cols,
                got: b.cols,
            });
        }
        let mut output = Matrix::zeros(a.rows, b.rows);
        if output.is_empty() {
            return Ok(output);
        }
        output
            .data
            // One output row per row of a
            .par_chunks_mut(b.rows)
            .enumerate()
            .for_each(|(i, output_row)| {
                let a_row = a.row(i);
                for (j, value) in output_row.iter_mut().enumerate() {
                    *value = factor * dot(a_row, b.row(j));
                }
            });
        Ok(output)
    }

    // Add v[i] to every entry of row i (broadcast a column vector)
    pub fn add_to_columns(&mut self, v: &[f32]) -> Result<()> {
        if v.len() != self.rows {
            return Err(Error::ShapeMismatch {
                what: "column vector length",
                expected: self.rows,
                got: v.len(),
            });
        }
        if self.is_empty() {
            return Ok(());
        }
        self.data
            .par_chunks_mut(self.cols)
            .zip(v.par_iter())
            .for_each(|(row, &offset)| row.iter_mut().for_each(|x| *x += offset));
        Ok(())
    }

    // Add v[j] to every entry of column j (broadcast a row vector)
    pub fn add_to_rows(&mut self, v: &[f32]) -> Result<()> {
        if v.len() != self.cols {
            return Err(Error::ShapeMismatch {
                what: "row vector length",
                expected: self.cols,
                got: v.len(),
            });
        }
        if self.is_empty() {
            return Ok(());
        }
        self.data.par_chunks_mut(self.cols).for_each(|row| {
            row.iter_mut().zip(v).for_each(|(x, offset)| *x += offset);
        });
        Ok(())
    }

    pub fn scale(&mut self, factor: f32) {
        self.data.par_iter_mut().for_each(|x| *x *= factor);
    }

    // For each column, the row index of the smallest entry.
    // Ties go to the lowest row index.
    pub fn argmin_columns(&self) -> Result<Vec<usize>> {
        self.arg_columns(|candidate, best| candidate < best)
    }

    // For each column, the row index of the largest entry.
    // Ties go to the lowest row index.
    pub fn argmax_columns(&self) -> Result<Vec<usize>> {
        self.arg_columns(|candidate, best| candidate > best)
    }

    // Sweep the rows in order, only replacing the running best on a strict improvement.
    // This keeps the first occurrence on ties and reads memory sequentially.
    fn arg_columns(&self, better: impl Fn(f32, f32) -> bool) -> Result<Vec<usize>> {
        if self.cols == 0 {
            return Ok(Vec::new());
        }
        if self.rows == 0 {
            return Err(Error::EmptyInput("column reduction over a matrix with no rows"));
        }
        let mut best_index = vec![0_usize; self.cols];
        let mut best_value = self.row(0).to_vec();
        for i in 1..self.rows {
            for (j, &value) in self.row(i).iter().enumerate() {
                if better(value, best_value[j]) {
                    best_value[j] = value;
                    best_index[j] = i;
                }
            }
        }
        Ok(best_index)
    }
}

// Inner product of two equally long slices, LANES values at a time
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();
    let acc = a_chunks
        .zip(b_chunks)
        .fold(f32x8::default(), |acc, (x, y)| acc + load(x) * load(y));
    acc.to_array().iter().sum::<f32>() + tail
}

#[inline]
fn load(chunk: &[f32]) -> f32x8 {
    let lanes: [f32; LANES] = array_init::array_init(|i| chunk[i]);
    f32x8::from(lanes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn test_dot_with_remainder() {
        let a: Vec<f32> = (1..=11).map(|x| x as f32).collect();
        let b = vec![1.0_f32; 11];
        assert_eq!(dot(&a, &b), 66.0);
        assert_eq!(dot(&[], &[]), 0.0);
    }

    #[test]
    fn test_dot_matches_scalar() {
        let mut rng = SmallRng::seed_from_u64(7);
        for len in [1, 7, 8, 9, 31, 64] {
            let a: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let b: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let expected: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
            assert!((dot(&a, &b) - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(&[[1.0_f32, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert_eq!(m.get(2, 0), 5.0);

        let empty = Matrix::from_rows(&Vec::<Vec<f32>>::new()).unwrap();
        assert_eq!(empty.shape(), (0, 0));
    }

    #[test]
    fn test_from_rows_ragged() {
        let rows = vec![vec![1.0_f32, 2.0], vec![3.0]];
        match Matrix::from_rows(&rows) {
            Err(Error::RaggedRows { row, expected, got }) => {
                assert_eq!((row, expected, got), (1, 2, 1));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_from_vec_length_checked() {
        assert!(Matrix::from_vec(2, 2, vec![0.0; 4]).is_ok());
        assert!(matches!(
            Matrix::from_vec(2, 2, vec![0.0; 3]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_reduce_rows() {
        let m = Matrix::from_rows(&[[1.0_f32, -2.0, 3.0], [0.5, 0.5, -4.0]]).unwrap();
        assert_eq!(m.reduce_rows(Reduction::Add), vec![2.0, -3.0]);
        assert_eq!(m.reduce_rows(Reduction::AddSquared), vec![14.0, 16.5]);
        assert_eq!(m.reduce_rows(Reduction::Max), vec![3.0, 0.5]);
        assert_eq!(m.reduce_rows(Reduction::Min), vec![-2.0, -4.0]);
    }

    #[test]
    fn test_prod_transposed() {
        let a = Matrix::from_rows(&[[1.0_f32, 2.0], [3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(&[[1.0_f32, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        let p = Matrix::prod_transposed(&a, &b, -2.0).unwrap();
        assert_eq!(p.shape(), (2, 3));
        assert_eq!(p.row(0), &[-2.0, -4.0, -6.0]);
        assert_eq!(p.row(1), &[-6.0, -8.0, -14.0]);
    }

    #[test]
    fn test_prod_transposed_shape_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 4);
        assert!(matches!(
            Matrix::prod_transposed(&a, &b, 1.0),
            Err(Error::ShapeMismatch {
                expected: 3,
                got: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_broadcast_additions() {
        let mut m = Matrix::zeros(2, 3);
        m.add_to_columns(&[1.0, 2.0]).unwrap();
        m.add_to_rows(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(m.row(0), &[11.0, 21.0, 31.0]);
        assert_eq!(m.row(1), &[12.0, 22.0, 32.0]);
        assert!(m.add_to_columns(&[1.0]).is_err());
        assert!(m.add_to_rows(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_scale() {
        let mut m = Matrix::from_rows(&[[1.0_f32, -2.0]]).unwrap();
        m.scale(-1.0);
        assert_eq!(m.row(0), &[-1.0, 2.0]);
    }

    #[test]
    fn test_arg_columns_first_occurrence() {
        let m = Matrix::from_rows(&[[3.0_f32, 1.0, 5.0], [1.0, 1.0, 5.0], [1.0, 0.0, 7.0]]).unwrap();
        assert_eq!(m.argmin_columns().unwrap(), vec![1, 2, 0]);
        assert_eq!(m.argmax_columns().unwrap(), vec![0, 0, 2]);
    }

    #[test]
    fn test_arg_columns_no_rows() {
        assert!(Matrix::zeros(0, 0).argmin_columns().unwrap().is_empty());
        assert!(matches!(
            Matrix::from_vec(0, 3, Vec::new()).unwrap().argmin_columns(),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn test_from_fn() {
        let m = Matrix::from_fn(2, 3, |i, j| (i * 10 + j) as f32);
        assert_eq!(m.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_row_range() {
        let m = Matrix::from_rows(&[[1.0_f32], [2.0], [3.0]]).unwrap();
        assert_eq!(m.row_range(1, 10).as_slice(), &[2.0, 3.0]);
        assert_eq!(m.row_range(5, 10).rows(), 0);
    }
}
