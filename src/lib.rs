pub mod dataset;
pub mod error;
pub mod knn;
pub mod matrix;
pub mod vote;

pub use error::{Error, Result};
pub use knn::Knn;
pub use matrix::{Matrix, Reduction};
