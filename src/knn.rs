use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::matrix::{Matrix, Reduction};
use crate::vote::plurality;

// Brute-force nearest-neighbour classifier.
//
// Squared euclidean distances are computed for every (reference, query) pair at once using
// |r - q|^2 = |r|^2 + |q|^2 - 2 r.q, so a whole batch of queries costs one matrix product.
// The reference set and its squared norms are fixed at construction.
pub struct Knn<L> {
    // N x D reference vectors
    reference: Matrix,
    // One label per reference vector
    labels: Vec<L>,
    // |r_i|^2 for each reference vector, computed once
    reference_norms: Vec<f32>,
    // Neighbours consulted by classify_voting; classify always uses the single nearest
    k: usize,
}

impl<L: Clone> Knn<L> {
    pub fn new(reference: Matrix, labels: Vec<L>, k: usize) -> Result<Self> {
        if reference.rows() == 0 {
            return Err(Error::EmptyInput("reference set has no vectors"));
        }
        if reference.cols() == 0 {
            return Err(Error::EmptyInput("reference vectors have no components"));
        }
        if labels.len() != reference.rows() {
            return Err(Error::LabelCountMismatch {
                vectors: reference.rows(),
                labels: labels.len(),
            });
        }
        if k == 0 {
            return Err(Error::InvalidK(k));
        }

        let reference_norms = reference.reduce_rows(Reduction::AddSquared);
        debug!(
            references = reference.rows(),
            dimension = reference.cols(),
            k,
            "built nearest-neighbour classifier"
        );

        Ok(Knn {
            reference,
            labels,
            reference_norms,
            k,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    // Number of reference vectors
    pub fn len(&self) -> usize {
        self.reference.rows()
    }

    // Never true, construction rejects an empty reference set
    pub fn is_empty(&self) -> bool {
        self.reference.rows() == 0
    }

    pub fn dimension(&self) -> usize {
        self.reference.cols()
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    pub fn reference_norms(&self) -> &[f32] {
        &self.reference_norms
    }

    // N x M matrix of squared distances, entry (i, j) between reference i and query j.
    // Entries are not clamped, so an exact match can come out slightly below zero.
    pub fn distance_matrix(&self, queries: &Matrix) -> Result<Matrix> {
        self.check_queries(queries)?;
        debug!(queries = queries.rows(), "computing distance matrix");

        let query_norms = queries.reduce_rows(Reduction::AddSquared);
        let mut distances = Matrix::prod_transposed(&self.reference, queries, -2.0)?;
        distances.add_to_columns(&self.reference_norms)?;
        distances.add_to_rows(&query_norms)?;
        Ok(distances)
    }

    // Label of the single nearest reference vector for each query.
    // Equidistant references resolve to the lowest index.
    pub fn classify(&self, queries: &Matrix) -> Result<Vec<L>> {
        let nearest = self.distance_matrix(queries)?.argmin_columns()?;
        trace!(?nearest, "nearest reference rows");
        Ok(nearest
            .into_iter()
            .map(|i| self.labels[i].clone())
            .collect())
    }

    // Indices of the `count` closest reference vectors for each query, nearest first.
    // Equal distances are ordered by index; count is clamped to the reference set size.
    pub fn nearest(&self, queries: &Matrix, count: usize) -> Result<Vec<Vec<usize>>> {
        let distances = self.distance_matrix(queries)?;
        let count = count.min(self.len());

        Ok((0..distances.cols())
            .into_par_iter()
            .map(|j| {
                let compare = |a: &usize, b: &usize| {
                    distances
                        .get(*a, j)
                        .total_cmp(&distances.get(*b, j))
                        .then(a.cmp(b))
                };
                let mut order: Vec<usize> = (0..distances.rows()).collect();
                if count < order.len() {
                    // Partition out the closest few before sorting them
                    order.select_nth_unstable_by(count, compare);
                    order.truncate(count);
                }
                order.sort_unstable_by(compare);
                order
            })
            .collect())
    }

    // Plurality label among the k nearest reference vectors for each query.
    // A tie between labels goes to the one with the nearer best-ranked neighbour,
    // so with k = 1 this agrees with classify.
    pub fn classify_voting(&self, queries: &Matrix) -> Result<Vec<L>>
    where
        L: PartialEq,
    {
        self.nearest(queries, self.k)?
            .iter()
            .map(|neighbours| {
                plurality(neighbours.iter().map(|&i| &self.labels[i]))
                    .cloned()
                    .ok_or(Error::EmptyInput("no neighbours to vote on"))
            })
            .collect()
    }

    // Nothing is computed unless the queries match the reference dimension
    fn check_queries(&self, queries: &Matrix) -> Result<()> {
        if queries.cols() != self.dimension() {
            return Err(Error::ShapeMismatch {
                what: "query dimension",
                expected: self.dimension(),
                got: queries.cols(),
            });
        }
        if queries.rows() == 0 {
            return Err(Error::EmptyInput("query set has no vectors"));
        }
        Ok(())
    }
}
