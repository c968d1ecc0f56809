//! Shared library for the two binaries: a landscape-scale stochastic
//! epidemic simulator (`landscape-sim`) and a simulated-annealing
//! sampling-pattern optimiser (`sampling-anneal`) that consumes the
//! simulator's output ensemble.

pub mod anneal;
pub mod bulkup;
pub mod config;
pub mod detection;
pub mod dispersal;
pub mod ensemble;
pub mod epidemic;
pub mod error;
pub mod heap;
pub mod landscape;
pub mod objective;
pub mod output;
pub mod primary;
pub mod rng;
