pub mod differ;
pub mod runner;

pub use differ::{DiffOutcome, diff};
pub use runner::QueryRunner;
